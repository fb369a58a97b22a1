//! Reconstruction of well contents from an ordered log of plate events.

pub mod builder;
pub mod engine;
pub mod ordering;
pub mod state;

use crate::{
    diagnostics::{Diagnostics, TracingDiagnostics},
    lineage::LineageEdge,
    units,
};
use labtrace_schemas::{event::PlateEvent, labware::LabwareKind, material::MaterialRef};
use serde::Serialize;
use state::ReplayState;
use std::collections::HashMap;

/// Settings for one replay call.
#[derive(Debug, Clone, Default)]
pub struct ReplayOptions {
    /// Only replay events that touch this labware.
    pub focus_labware_id: Option<String>,
    /// Per-labware override of the kind-based depletion default.
    pub depletion_by_labware_id: HashMap<String, bool>,
    /// Stock concentration and molar mass for materials that events name only by id.
    pub material_catalog: HashMap<String, MaterialRef>,
}

impl ReplayOptions {
    pub fn focused_on(labware_id: &str) -> Self {
        Self {
            focus_labware_id: Some(labware_id.to_string()),
            ..Self::default()
        }
    }

    pub(crate) fn resolve_material(&self, material: &MaterialRef) -> MaterialRef {
        match self.material_catalog.get(&material.id) {
            Some(entry) => material.filled_from(entry),
            None => material.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ReplayOutcome {
    pub state: ReplayState,
    pub edges: Vec<LineageEdge>,
}

/// Whether pulling from `labware_id` reduces its recorded contents.
///
/// An explicit override wins. Otherwise plates deplete and reservoirs and tube racks
/// do not; labware of unknown kind is assumed to be a finite source.
pub fn resolve_depletion(
    options: &ReplayOptions,
    labware_id: &str,
    kind: Option<&LabwareKind>,
) -> bool {
    if let Some(depletes) = options.depletion_by_labware_id.get(labware_id) {
        return *depletes;
    }
    match kind {
        Some(LabwareKind::Reservoir) | Some(LabwareKind::TubeRack) => false,
        Some(LabwareKind::Plate) | Some(LabwareKind::Unknown) | None => true,
    }
}

/// Moles of `material` in `volume_l` of its stock solution; 0 when the stock
/// concentration cannot be read.
pub fn estimate_moles(material: &MaterialRef, volume_l: f64) -> f64 {
    let molar = units::normalize_concentration(
        material.stock_concentration.as_ref(),
        material.molar_mass,
        0.0,
    );
    let moles = molar * volume_l;
    if moles.is_finite() && moles > 0.0 {
        moles
    } else {
        0.0
    }
}

/// Replays `events` from scratch and returns the derived well state and lineage edges.
///
/// Events are applied in timestamp order (ties keep list order). Malformed events are
/// skipped and reported through `tracing`.
pub fn replay_plate_events(events: &[PlateEvent], options: &ReplayOptions) -> ReplayOutcome {
    replay_with_diagnostics(events, options, &mut TracingDiagnostics::new())
}

/// Like `replay_plate_events`, reporting skipped events to a caller-owned sink.
pub fn replay_with_diagnostics(
    events: &[PlateEvent],
    options: &ReplayOptions,
    diagnostics: &mut dyn Diagnostics,
) -> ReplayOutcome {
    let sorted = ordering::sort_events_stable(events);
    engine::replay_sorted_infallible(&sorted, options, diagnostics)
}
