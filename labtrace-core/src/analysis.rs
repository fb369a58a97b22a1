use crate::{
    error::LabtraceError,
    lineage::LineageEdge,
    replay::{ordering::sort_events_stable, state::ReplayState},
};
use labtrace_schemas::{
    event::{EventType, PlateEvent, SampleOperationDetails, TransferDetails, WashDetails},
    labware::LabwareRef,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize)]
pub struct LogEntry {
    pub sequence: usize,
    pub event_id: String,
    pub event_type: String,
    pub timestamp: String,
    pub total_volume_l: f64,
    pub state_json: String,
    pub edges_json: String,
}

impl LogEntry {
    pub fn state(&self) -> Result<ReplayState, LabtraceError> {
        Ok(serde_json::from_str(&self.state_json)?)
    }

    pub fn edges(&self) -> Result<Vec<LineageEdge>, LabtraceError> {
        Ok(serde_json::from_str(&self.edges_json)?)
    }
}

/// Reads back a CSV state log written by `StateLogger`.
pub fn read_state_log(log_path: &str) -> Result<Vec<LogEntry>, LabtraceError> {
    let mut reader = csv::Reader::from_path(log_path)
        .map_err(|e| LabtraceError::CsvError(log_path.to_string(), e))?;
    let mut entries = Vec::new();
    for result in reader.deserialize() {
        let record: LogEntry =
            result.map_err(|e| LabtraceError::CsvError(log_path.to_string(), e))?;
        entries.push(record);
    }
    Ok(entries)
}

/// Volume of every well of `labware_id` after each logged event.
///
/// Wells that did not exist yet at a given row are reported as empty.
pub fn well_volume_series(
    entries: &[LogEntry],
    labware_id: &str,
) -> Result<BTreeMap<String, Vec<(usize, f64)>>, LabtraceError> {
    let mut series: BTreeMap<String, Vec<(usize, f64)>> = BTreeMap::new();
    for entry in entries {
        let state = entry.state()?;
        let Some(labware) = state.get(labware_id) else {
            continue;
        };
        for well_id in labware.keys() {
            series.entry(well_id.clone()).or_default();
        }
        for (well_id, points) in series.iter_mut() {
            let volume = labware.get(well_id).map_or(0.0, |w| w.total_volume_l);
            points.push((entry.sequence, volume));
        }
    }
    Ok(series)
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct MaterialTotals {
    pub moles: f64,
    pub volume_l: f64,
}

#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct MaterialLedger {
    pub materials: BTreeMap<String, MaterialTotals>,
    pub labware_volume_l: BTreeMap<String, f64>,
    pub well_count: usize,
}

pub fn ledger_from_state(state: &ReplayState) -> MaterialLedger {
    let mut ledger = MaterialLedger::default();
    for (labware_id, wells) in state {
        let mut labware_total = 0.0;
        for well in wells.values() {
            ledger.well_count += 1;
            labware_total += well.total_volume_l;
            for component in &well.components {
                let totals = ledger
                    .materials
                    .entry(component.material_id.clone())
                    .or_default();
                totals.moles += component.moles;
                totals.volume_l += component.volume_l;
            }
        }
        ledger.labware_volume_l.insert(labware_id.clone(), labware_total);
    }
    ledger
}

/// Moles moved per material, summed over edges that carry an amount.
pub fn transferred_by_material(edges: &[LineageEdge]) -> BTreeMap<String, f64> {
    let mut moved = BTreeMap::new();
    for edge in edges {
        if let (Some(material_id), Some(moles)) = (&edge.material_id, edge.moles) {
            *moved.entry(material_id.clone()).or_insert(0.0) += moles;
        }
    }
    moved
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolStep {
    pub step: usize,
    pub event_id: String,
    pub timestamp: Option<String>,
    pub kind: String,
    pub description: String,
}

fn display_name(labware: &LabwareRef) -> String {
    labware.label.clone().unwrap_or_else(|| labware.id.clone())
}

fn labware_name(event: &PlateEvent, preferred: Option<&LabwareRef>) -> String {
    preferred
        .or_else(|| event.labware.first())
        .map(display_name)
        .unwrap_or_else(|| "unknown labware".to_string())
}

fn describe_transfer(event: &PlateEvent) -> String {
    let Ok(details) = event.details_as::<TransferDetails>() else {
        return "Transfer (unreadable details)".to_string();
    };
    let endpoint_name = |labware: Option<&LabwareRef>| {
        labware.map(display_name).unwrap_or_else(|| "?".to_string())
    };
    let source = endpoint_name(details.source.as_ref().and_then(|s| s.labware.as_ref()));
    let target = endpoint_name(details.target.as_ref().and_then(|t| t.labware.as_ref()));
    let wells = match &details.mapping {
        Some(mapping) if !mapping.is_empty() => mapping.len(),
        _ => details.target.as_ref().map_or(0, |t| t.wells.len()),
    };
    let mut text = format!("Transfer from {} to {} ({} well(s))", source, target, wells);
    if let Some(volume) = details.volume.as_ref().and_then(|v| v.components()) {
        text.push_str(&format!(", {} {} each", volume.0, volume.1));
    }
    if let Some(material) = &details.material {
        text.push_str(&format!(", material {}", material.label.as_deref().unwrap_or(&material.id)));
    }
    text
}

fn describe_wash(event: &PlateEvent) -> String {
    let details = event.details_as::<WashDetails>().unwrap_or_default();
    let labware = labware_name(event, details.labware.as_ref());
    match details.wells {
        Some(wells) if !wells.is_empty() => format!("Wash {} wells {}", labware, wells.join(", ")),
        _ => format!("Wash all wells of {}", labware),
    }
}

fn describe_sample_operation(event: &PlateEvent, verb: &str) -> String {
    let details = event.details_as::<SampleOperationDetails>().unwrap_or_default();
    format!(
        "{} {} input(s) into {} output(s)",
        verb,
        details.inputs.len(),
        details.outputs.len()
    )
}

fn describe_simple(event: &PlateEvent, verb: &str) -> String {
    let mut text = format!("{} {}", verb, labware_name(event, None));
    if let Some(duration) = event.details.get("duration").and_then(|d| d.as_str()) {
        text.push_str(&format!(" for {}", duration));
    }
    text
}

/// Turns a log into numbered, human-readable steps in replay order.
pub fn generate_step_report(events: &[PlateEvent]) -> Vec<ProtocolStep> {
    sort_events_stable(events)
        .into_iter()
        .enumerate()
        .map(|(i, event)| {
            let kind = event.kind();
            let description = match kind {
                Some(EventType::Transfer) => describe_transfer(event),
                Some(EventType::Wash) => describe_wash(event),
                Some(EventType::Harvest) => describe_sample_operation(event, "Harvest"),
                Some(EventType::SampleOperation) => describe_sample_operation(event, "Process"),
                Some(EventType::Read) => describe_simple(event, "Read"),
                Some(EventType::Incubate) => describe_simple(event, "Incubate"),
                Some(EventType::Other) => format!(
                    "Unrecognised '{}' event",
                    event.event_type.as_deref().unwrap_or_default()
                ),
                None => "Event without a type".to_string(),
            };
            ProtocolStep {
                step: i + 1,
                event_id: event.id.clone(),
                timestamp: event.timestamp.clone(),
                kind: kind.map_or("unknown", |k| k.as_str()).to_string(),
                description,
            }
        })
        .collect()
}
