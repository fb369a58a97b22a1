use super::{
    estimate_moles, ordering, resolve_depletion,
    state::{ensure_labware_well, MaterialComponent},
    ReplayOptions, ReplayOutcome,
};
use crate::{
    diagnostics::Diagnostics,
    error::LabtraceError,
    lineage::{LineageEdge, LineageEndpoint},
    logger::StateLogger,
    units,
};
use labtrace_schemas::{
    event::{
        EventType, PlateEvent, SampleOperationDetails, TransferDetails, TransferEndpoint,
        WashDetails,
    },
    labware::LabwareRef,
    material::MaterialRef,
    quantity::Quantity,
};
use std::convert::Infallible;

pub struct ReplayEngine {
    pub(super) options: ReplayOptions,
    pub(super) diagnostics: Box<dyn Diagnostics>,
    pub(super) logger: Option<StateLogger>,
}

impl ReplayEngine {
    /// Replays `events` from an empty state, writing one log row per applied event
    /// when a state log is configured.
    pub fn replay(&mut self, events: &[PlateEvent]) -> Result<ReplayOutcome, LabtraceError> {
        let sorted = ordering::sort_events_stable(events);
        let logger = &mut self.logger;
        replay_sorted(
            &sorted,
            &self.options,
            self.diagnostics.as_mut(),
            |sequence, event, outcome, new_edges| match logger.as_mut() {
                Some(logger) => logger
                    .log_event(sequence, event, &outcome.state, new_edges)
                    .map_err(LabtraceError::from),
                None => Ok(()),
            },
        )
    }

    pub fn options(&self) -> &ReplayOptions {
        &self.options
    }
}

/// The decoded payload of one event, one variant per kind.
enum Operation {
    Transfer(TransferDetails),
    Wash(WashDetails),
    Harvest(SampleOperationDetails),
    SampleOperation(SampleOperationDetails),
    Read,
    Incubate,
    Other,
}

impl Operation {
    fn decode(event: &PlateEvent) -> Result<Self, String> {
        let kind = event
            .kind()
            .ok_or_else(|| "event has no event_type".to_string())?;
        let decoded = match kind {
            EventType::Transfer => event.details_as().map(Operation::Transfer),
            EventType::Wash => event.details_as().map(Operation::Wash),
            EventType::Harvest => event.details_as().map(Operation::Harvest),
            EventType::SampleOperation => event.details_as().map(Operation::SampleOperation),
            EventType::Read => Ok(Operation::Read),
            EventType::Incubate => Ok(Operation::Incubate),
            EventType::Other => Ok(Operation::Other),
        };
        decoded.map_err(|e| format!("{} details could not be read: {}", kind.as_str(), e))
    }

    /// Labware named inside the payload, in addition to the event's own list.
    fn touches(&self, labware_id: &str) -> bool {
        let is = |labware: &Option<LabwareRef>| {
            labware.as_ref().is_some_and(|l| l.id == labware_id)
        };
        match self {
            Operation::Transfer(details) => [&details.source, &details.target]
                .into_iter()
                .flatten()
                .any(|endpoint| is(&endpoint.labware)),
            Operation::Wash(details) => is(&details.labware),
            Operation::Harvest(details) | Operation::SampleOperation(details) => {
                details.inputs.iter().any(|input| is(&input.labware))
            }
            Operation::Read | Operation::Incubate | Operation::Other => false,
        }
    }
}

pub(crate) fn replay_sorted_infallible(
    sorted: &[&PlateEvent],
    options: &ReplayOptions,
    diagnostics: &mut dyn Diagnostics,
) -> ReplayOutcome {
    let result = replay_sorted::<Infallible, _>(sorted, options, diagnostics, |_, _, _, _| Ok(()));
    match result {
        Ok(outcome) => outcome,
        Err(never) => match never {},
    }
}

/// Applies already ordered events. `on_applied` sees each applied event together
/// with the state after it and the edges it produced.
pub(crate) fn replay_sorted<E, F>(
    sorted: &[&PlateEvent],
    options: &ReplayOptions,
    diagnostics: &mut dyn Diagnostics,
    mut on_applied: F,
) -> Result<ReplayOutcome, E>
where
    F: FnMut(usize, &PlateEvent, &ReplayOutcome, &[LineageEdge]) -> Result<(), E>,
{
    let mut outcome = ReplayOutcome::default();

    for (sequence, &event) in sorted.iter().enumerate() {
        let operation = match Operation::decode(event) {
            Ok(operation) => operation,
            Err(reason) => {
                diagnostics.warn_once(
                    &format!("malformed:{}", event.id),
                    &format!("Skipping event '{}': {}", event.id, reason),
                );
                continue;
            }
        };

        if let Some(focus) = &options.focus_labware_id {
            if !event.references_labware(focus) && !operation.touches(focus) {
                continue;
            }
        }

        let edges_before = outcome.edges.len();
        let applied = match &operation {
            Operation::Transfer(details) => {
                apply_transfer(&mut outcome, event, details, options, diagnostics)
            }
            Operation::Wash(details) => apply_wash(&mut outcome, event, details, diagnostics),
            Operation::Harvest(details) | Operation::SampleOperation(details) => {
                apply_sample_operation(&mut outcome, event, details, diagnostics)
            }
            Operation::Read | Operation::Incubate | Operation::Other => true,
        };

        if applied {
            tracing::debug!(
                event_id = %event.id,
                event_type = event.event_type.as_deref().unwrap_or_default(),
                edges = outcome.edges.len() - edges_before,
                "applied plate event"
            );
            on_applied(sequence, event, &outcome, &outcome.edges[edges_before..])?;
        }
    }

    Ok(outcome)
}

struct WellPair<'a> {
    source_well: String,
    target_well: String,
    volume: Option<&'a Quantity>,
}

/// Explicit `mapping` wins; otherwise each target well is paired with the source well
/// it declares, or the source well of the same name.
fn resolve_pairs<'a>(
    event: &PlateEvent,
    details: &'a TransferDetails,
    target: &'a TransferEndpoint,
    diagnostics: &mut dyn Diagnostics,
) -> Vec<WellPair<'a>> {
    if let Some(mapping) = details.mapping.as_ref().filter(|m| !m.is_empty()) {
        return mapping
            .iter()
            .map(|pair| WellPair {
                source_well: pair.source_well.clone(),
                target_well: pair.target_well.clone(),
                volume: pair.volume.as_ref(),
            })
            .collect();
    }

    if !target.wells.is_empty() {
        diagnostics.warn_once(
            "transfer_without_mapping",
            &format!(
                "Transfer '{}' has no mapping; pairing wells from target.wells",
                event.id
            ),
        );
    }
    target
        .wells
        .iter()
        .map(|(target_well, spec)| WellPair {
            source_well: spec.source_well.clone().unwrap_or_else(|| target_well.clone()),
            target_well: target_well.clone(),
            volume: spec.volume.as_ref(),
        })
        .collect()
}

fn apply_transfer(
    outcome: &mut ReplayOutcome,
    event: &PlateEvent,
    details: &TransferDetails,
    options: &ReplayOptions,
    diagnostics: &mut dyn Diagnostics,
) -> bool {
    let (Some(source), Some(target)) = (details.source.as_ref(), details.target.as_ref()) else {
        diagnostics.warn_once(
            &format!("malformed:{}", event.id),
            &format!("Skipping transfer '{}': source or target missing", event.id),
        );
        return false;
    };
    let (Some(source_labware), Some(target_labware)) =
        (source.labware.as_ref(), target.labware.as_ref())
    else {
        diagnostics.warn_once(
            &format!("malformed:{}", event.id),
            &format!("Skipping transfer '{}': source or target labware missing", event.id),
        );
        return false;
    };

    let pairs = resolve_pairs(event, details, target, diagnostics);
    if pairs.is_empty() {
        diagnostics.warn_once(
            &format!("malformed:{}", event.id),
            &format!("Skipping transfer '{}': no wells to transfer between", event.id),
        );
        return false;
    }

    let source_kind = source_labware
        .labware_kind()
        .or_else(|| event.labware_ref(&source_labware.id).and_then(|l| l.labware_kind()));
    let depleting = resolve_depletion(options, &source_labware.id, source_kind.as_ref());

    for pair in pairs {
        let volume_l =
            units::normalize_volume(pair.volume.or(details.volume.as_ref()), 0.0).max(0.0);
        let source_spec = source.wells.get(&pair.source_well);
        let target_spec = target.wells.get(&pair.target_well);
        let seed_material = source_spec
            .and_then(|s| s.material.as_ref())
            .or(details.material.as_ref())
            .map(|m| options.resolve_material(m));
        let provenance = |material_id: &str, moles: f64, component_volume_l: f64| {
            MaterialComponent {
                material_id: material_id.to_string(),
                moles,
                volume_l: component_volume_l,
                source_event_id: Some(event.id.clone()),
                source_labware: Some(source_labware.id.clone()),
                source_well: Some(pair.source_well.clone()),
            }
        };

        let moved: Vec<MaterialComponent> = {
            let well =
                ensure_labware_well(&mut outcome.state, &source_labware.id, &pair.source_well);

            // A source never seen before is assumed to hold its declared material at
            // stock concentration.
            if well.components.is_empty() {
                if let Some(material) = &seed_material {
                    let declared_l =
                        units::normalize_volume(source_spec.and_then(|s| s.volume.as_ref()), 0.0);
                    let seed_l = declared_l.max(volume_l);
                    if well.total_volume_l < seed_l {
                        well.add_volume(seed_l - well.total_volume_l);
                    }
                    let held_l = well.total_volume_l;
                    let moles = estimate_moles(material, held_l);
                    well.add_component(provenance(&material.id, moles, held_l));
                }
            }

            let source_volume_l = well.total_volume_l;
            let fraction = if source_volume_l > 0.0 {
                (volume_l / source_volume_l).min(1.0)
            } else {
                0.0
            };

            let moved = if fraction > 0.0 {
                well.components
                    .iter()
                    .map(|c| provenance(&c.material_id, c.moles * fraction, c.volume_l * fraction))
                    .collect()
            } else {
                Vec::new()
            };

            if depleting && volume_l > 0.0 && source_volume_l > 0.0 {
                well.subtract_volume(volume_l);
                well.scale_components(1.0 - fraction);
                well.prune_empty_components();
                if well.is_empty() {
                    well.remove_all_components();
                }
            }
            moved
        };

        let from = LineageEndpoint::well(&source_labware.id, &pair.source_well);
        let to = LineageEndpoint::well(&target_labware.id, &pair.target_well);
        let destination =
            ensure_labware_well(&mut outcome.state, &target_labware.id, &pair.target_well);

        if moved.is_empty() {
            let fallback: Option<MaterialRef> = target_spec
                .and_then(|s| s.material.as_ref())
                .or(details.material.as_ref())
                .map(|m| options.resolve_material(m));
            let moles = fallback.as_ref().map(|m| estimate_moles(m, volume_l));
            if let (Some(material), Some(moles), true) = (&fallback, moles, volume_l > 0.0) {
                destination.add_component(provenance(&material.id, moles, volume_l));
            }
            outcome.edges.push(LineageEdge {
                event_id: event.id.clone(),
                from,
                to,
                material_id: fallback.map(|m| m.id),
                moles,
            });
        } else {
            for component in moved {
                outcome.edges.push(LineageEdge {
                    event_id: event.id.clone(),
                    from: from.clone(),
                    to: to.clone(),
                    material_id: Some(component.material_id.clone()),
                    moles: Some(component.moles),
                });
                destination.add_component(component);
            }
        }
        destination.add_volume(volume_l);
    }
    true
}

fn apply_wash(
    outcome: &mut ReplayOutcome,
    event: &PlateEvent,
    details: &WashDetails,
    diagnostics: &mut dyn Diagnostics,
) -> bool {
    let Some(labware_id) = details
        .labware
        .as_ref()
        .or_else(|| event.labware.first())
        .map(|l| l.id.clone())
    else {
        diagnostics.warn_once(
            &format!("malformed:{}", event.id),
            &format!("Skipping wash '{}': no labware", event.id),
        );
        return false;
    };

    match details.wells.as_ref().filter(|wells| !wells.is_empty()) {
        Some(wells) => {
            for well_id in wells {
                ensure_labware_well(&mut outcome.state, &labware_id, well_id)
                    .remove_all_components();
            }
        }
        None => {
            if let Some(labware) = outcome.state.get_mut(&labware_id) {
                labware.values_mut().for_each(|well| well.remove_all_components());
            }
        }
    }
    true
}

/// Harvests and sample operations only record provenance; material leaving the
/// wells is not subtracted.
fn apply_sample_operation(
    outcome: &mut ReplayOutcome,
    event: &PlateEvent,
    details: &SampleOperationDetails,
    diagnostics: &mut dyn Diagnostics,
) -> bool {
    if details.inputs.is_empty() || details.outputs.is_empty() {
        diagnostics.warn_once(
            &format!("malformed:{}", event.id),
            &format!("Skipping '{}': inputs or outputs missing", event.id),
        );
        return false;
    }

    let mut sources = Vec::new();
    for input in &details.inputs {
        let before = sources.len();
        sources.extend(
            input
                .samples
                .iter()
                .map(|sample_id| LineageEndpoint::sample(sample_id, None)),
        );
        if let Some(labware) = input.labware.as_ref().or_else(|| event.labware.first()) {
            sources.extend(
                input
                    .wells
                    .iter()
                    .map(|well_id| LineageEndpoint::well(&labware.id, well_id)),
            );
        }
        if sources.len() == before {
            diagnostics.warn_once(
                &format!("input_without_wells:{}", event.id),
                &format!("'{}' has an input with no wells or samples to link", event.id),
            );
        }
    }

    for output in &details.outputs {
        let to = LineageEndpoint::sample(&output.id, output.label.as_deref());
        for from in &sources {
            outcome.edges.push(LineageEdge {
                event_id: event.id.clone(),
                from: from.clone(),
                to: to.clone(),
                material_id: output.material.as_ref().map(|m| m.id.clone()),
                moles: None,
            });
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{diagnostics::CollectingDiagnostics, replay::builder::ReplayBuilder};
    use serde_json::json;

    fn event(value: serde_json::Value) -> PlateEvent {
        serde_json::from_value(value).unwrap()
    }

    fn ts(second: u32) -> String {
        format!("2024-01-01T00:00:{:02}Z", second)
    }

    fn res(id: &str) -> serde_json::Value {
        json!({ "@id": id, "kind": "reservoir" })
    }

    fn plate(id: &str) -> serde_json::Value {
        json!({ "@id": id, "kind": "plate" })
    }

    fn transfer(
        id: &str,
        ts: &str,
        source: serde_json::Value,
        src_well: &str,
        target: &str,
        tgt_well: &str,
        volume: &str,
    ) -> PlateEvent {
        event(json!({
            "id": id,
            "event_type": "transfer",
            "timestamp": ts,
            "labware": [source.clone(), plate(target)],
            "details": {
                "type": "transfer",
                "source": { "labware": source },
                "target": { "labware": plate(target) },
                "mapping": [{ "source_well": src_well, "target_well": tgt_well }],
                "volume": volume,
                "material": { "id": "a", "stock_concentration": "10 mM" }
            }
        }))
    }

    fn run(events: &[PlateEvent]) -> (ReplayOutcome, Vec<String>) {
        let sorted: Vec<&PlateEvent> = events.iter().collect();
        let mut diagnostics = CollectingDiagnostics::default();
        let outcome =
            replay_sorted_infallible(&sorted, &ReplayOptions::default(), &mut diagnostics);
        let keys = diagnostics.keys().into_iter().map(str::to_string).collect();
        (outcome, keys)
    }

    #[test]
    fn test_transfer_from_fresh_reservoir_seeds_source() {
        let events = vec![transfer("t1", &ts(0), res("res1"), "SRC1", "plate1", "A01", "10 uL")];
        let (outcome, _) = run(&events);
        let well = &outcome.state["plate1"]["A01"];
        assert!((well.total_volume_l - 1e-5).abs() < 1e-15);
        assert!((well.moles_of("a") - 1e-7).abs() < 1e-15);
        assert_eq!(well.components[0].source_event_id.as_deref(), Some("t1"));
        assert_eq!(well.components[0].source_well.as_deref(), Some("SRC1"));

        // Reservoirs keep their contents.
        let source = &outcome.state["res1"]["SRC1"];
        assert!((source.total_volume_l - 1e-5).abs() < 1e-15);
        assert_eq!(outcome.edges.len(), 1);
        assert_eq!(outcome.edges[0].moles, Some(well.moles_of("a")));
    }

    #[test]
    fn test_plate_source_depletes_proportionally() {
        let events = vec![
            transfer("t1", &ts(0), res("res1"), "SRC1", "plate1", "A01", "20 uL"),
            transfer("t2", &ts(1), plate("plate1"), "A01", "plate2", "B01", "5 uL"),
        ];
        let (outcome, _) = run(&events);
        let source = &outcome.state["plate1"]["A01"];
        assert!((source.total_volume_l - 1.5e-5).abs() < 1e-15);
        assert!((source.moles_of("a") - 1.5e-7).abs() < 1e-15);
        let destination = &outcome.state["plate2"]["B01"];
        assert!((destination.moles_of("a") - 5e-8).abs() < 1e-15);
    }

    #[test]
    fn test_full_depletion_clears_well() {
        let events = vec![
            transfer("t1", &ts(0), res("res1"), "SRC1", "plate1", "A01", "10 uL"),
            transfer("t2", &ts(1), plate("plate1"), "A01", "plate2", "B01", "50 uL"),
        ];
        let (outcome, _) = run(&events);
        let source = &outcome.state["plate1"]["A01"];
        assert_eq!(source.total_volume_l, 0.0);
        assert!(source.components.is_empty());
        let destination = &outcome.state["plate2"]["B01"];
        assert!((destination.total_volume_l - 5e-5).abs() < 1e-15);
        assert!((destination.moles_of("a") - 1e-7).abs() < 1e-15);
    }

    #[test]
    fn test_overdrawn_non_depleting_source_is_left_unchanged() {
        let events = vec![
            transfer("t1", &ts(0), res("res1"), "SRC1", "plate1", "A01", "10 uL"),
            transfer("t2", &ts(1), res("res1"), "SRC1", "plate1", "A02", "40 uL"),
        ];
        let (outcome, _) = run(&events);

        let source = &outcome.state["res1"]["SRC1"];
        assert!((source.total_volume_l - 1e-5).abs() < 1e-15);
        assert!((source.moles_of("a") - 1e-7).abs() < 1e-15);

        // The fraction is capped at 1, so the pull carries everything the source holds.
        let second = &outcome.state["plate1"]["A02"];
        assert!((second.total_volume_l - 4e-5).abs() < 1e-15);
        assert!((second.moles_of("a") - 1e-7).abs() < 1e-15);
        assert_eq!(outcome.edges[1].moles, Some(second.moles_of("a")));
    }

    #[test]
    fn test_transfer_derives_pairs_from_target_wells() {
        let events = vec![event(json!({
            "id": "t1",
            "event_type": "transfer",
            "timestamp": ts(0),
            "labware": [res("res1"), { "@id": "plate1" }],
            "details": {
                "source": {
                    "labware": { "@id": "res1" },
                    "wells": {
                        "SRC1": { "material": { "id": "buffer", "stock_concentration": "1 M" } }
                    }
                },
                "target": {
                    "labware": "plate1",
                    "wells": {
                        "A01": { "source_well": "SRC1" },
                        "A02": { "source_well": "SRC1", "volume": "20 uL" }
                    }
                },
                "volume": "10 uL"
            }
        }))];
        let (outcome, keys) = run(&events);
        let plate = &outcome.state["plate1"];
        assert!((plate["A01"].total_volume_l - 1e-5).abs() < 1e-15);
        assert!((plate["A02"].total_volume_l - 2e-5).abs() < 1e-15);
        assert!(plate["A02"].moles_of("buffer") > 0.0);
        assert!(keys.contains(&"transfer_without_mapping".to_string()));
    }

    #[test]
    fn test_unknown_source_material_falls_back_to_target_material() {
        let events = vec![event(json!({
            "id": "t1",
            "event_type": "transfer",
            "timestamp": ts(0),
            "details": {
                "source": { "labware": "res9" },
                "target": {
                    "labware": "plate1",
                    "wells": {
                        "A01": { "material": { "id": "dye", "stock_concentration": "1 mM" } }
                    }
                },
                "mapping": [{ "source_well": "X", "target_well": "A01", "volume": "10 uL" }]
            }
        }))];
        let (outcome, _) = run(&events);
        let well = &outcome.state["plate1"]["A01"];
        assert!((well.moles_of("dye") - 1e-8).abs() < 1e-18);
        assert_eq!(outcome.edges[0].material_id.as_deref(), Some("dye"));
    }

    #[test]
    fn test_malformed_events_are_skipped() {
        let events = vec![
            event(json!({ "id": "no-type", "timestamp": ts(0) })),
            event(json!({
                "id": "no-target",
                "event_type": "transfer",
                "details": { "source": { "labware": "res1" } }
            })),
            event(json!({ "id": "bad-details", "event_type": "wash", "details": { "wells": 7 } })),
            event(json!({
                "id": "harvest-no-outputs",
                "event_type": "harvest",
                "details": { "inputs": [{ "labware": "p", "wells": ["A01"] }] }
            })),
        ];
        let (outcome, keys) = run(&events);
        assert!(outcome.state.is_empty());
        assert!(outcome.edges.is_empty());
        assert_eq!(
            keys,
            vec![
                "malformed:no-type",
                "malformed:no-target",
                "malformed:bad-details",
                "malformed:harvest-no-outputs"
            ]
        );
    }

    #[test]
    fn test_wash_all_wells_of_labware() {
        let events = vec![
            transfer("t1", &ts(0), res("res1"), "SRC1", "plate1", "A01", "10 uL"),
            transfer("t2", &ts(1), res("res1"), "SRC1", "plate1", "A02", "10 uL"),
            event(json!({
                "id": "w1",
                "event_type": "wash",
                "timestamp": ts(2),
                "labware": [{ "@id": "plate1" }],
                "details": {}
            })),
        ];
        let (outcome, _) = run(&events);
        for well in outcome.state["plate1"].values() {
            assert!(well.components.is_empty());
            assert_eq!(well.total_volume_l, 0.0);
        }
        assert!(!outcome.state["res1"]["SRC1"].components.is_empty());
    }

    #[test]
    fn test_harvest_links_wells_to_outputs_without_removing_material() {
        let events = vec![
            transfer("t1", &ts(0), res("res1"), "SRC1", "p1", "A01", "10 uL"),
            event(json!({
                "id": "h1",
                "event_type": "harvest",
                "timestamp": ts(1),
                "labware": [plate("p1")],
                "details": {
                    "inputs": { "labware": "p1", "wells": ["A01", "A02"] },
                    "outputs": [{ "@id": "sample:1", "material": { "id": "cells" } }]
                }
            })),
        ];
        let (outcome, keys) = run(&events);
        assert!(keys.is_empty());

        let harvest: Vec<&LineageEdge> =
            outcome.edges.iter().filter(|e| e.event_id == "h1").collect();
        let links: Vec<(String, String)> =
            harvest.iter().map(|e| (e.from.key(), e.to.key())).collect();
        assert_eq!(
            links,
            vec![
                ("p1:A01".to_string(), "sample:1".to_string()),
                ("p1:A02".to_string(), "sample:1".to_string())
            ]
        );
        assert!(harvest.iter().all(|e| e.material_id.as_deref() == Some("cells")));
        assert!(harvest.iter().all(|e| e.moles.is_none()));

        let well = &outcome.state["p1"]["A01"];
        assert!((well.total_volume_l - 1e-5).abs() < 1e-15);
        assert!((well.moles_of("a") - 1e-7).abs() < 1e-15);
        assert_eq!(well.components.len(), 1);
        assert!(!outcome.state["p1"].contains_key("A02"));
    }

    #[test]
    fn test_input_without_wells_or_samples_is_reported() {
        let events = vec![event(json!({
            "id": "h2",
            "event_type": "harvest",
            "timestamp": ts(0),
            "details": {
                "inputs": [{ "labware": "p1" }, { "labware": "p1", "wells": ["B01"] }],
                "outputs": [{ "@id": "sample:2" }]
            }
        }))];
        let (outcome, keys) = run(&events);
        assert_eq!(keys, vec!["input_without_wells:h2"]);
        assert_eq!(outcome.edges.len(), 1);
        assert_eq!(outcome.edges[0].from.key(), "p1:B01");
    }

    #[test]
    fn test_sample_operation_links_samples_and_wells() {
        let events = vec![event(json!({
            "id": "pool",
            "event_type": "sample_operation",
            "timestamp": ts(0),
            "labware": [{ "@id": "plate1" }],
            "details": {
                "inputs": [
                    { "samples": ["sample:1", "sample:2"] },
                    { "wells": ["A01"] }
                ],
                "outputs": [{ "@id": "sample:pool", "label": "pool", "material": { "id": "dna" } }]
            }
        }))];
        let (outcome, _) = run(&events);
        let from: Vec<String> = outcome.edges.iter().map(|e| e.from.key()).collect();
        assert_eq!(from, vec!["sample:1", "sample:2", "plate1:A01"]);
        assert!(outcome.edges.iter().all(|e| e.material_id.as_deref() == Some("dna")));
        assert!(outcome.state.is_empty());
    }

    #[test]
    fn test_focus_restricts_to_touching_events() {
        let events = vec![
            transfer("t1", &ts(0), res("res1"), "SRC1", "plate1", "A01", "10 uL"),
            transfer("t2", &ts(1), res("res2"), "SRC1", "plate3", "A01", "10 uL"),
        ];
        let mut engine = ReplayBuilder::new()
            .with_focus_labware("plate3")
            .with_diagnostics(Box::new(CollectingDiagnostics::default()))
            .build()
            .unwrap();
        let outcome = engine.replay(&events).unwrap();
        assert!(outcome.state.contains_key("plate3"));
        assert!(!outcome.state.contains_key("plate1"));
    }
}
