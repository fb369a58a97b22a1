use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Amounts below this are treated as gone.
const EMPTY_EPSILON: f64 = 1e-15;

/// One material's contribution to a well, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialComponent {
    pub material_id: String,
    pub moles: f64,
    pub volume_l: f64,
    pub source_event_id: Option<String>,
    pub source_labware: Option<String>,
    pub source_well: Option<String>,
}

impl MaterialComponent {
    fn same_origin(&self, other: &MaterialComponent) -> bool {
        self.material_id == other.material_id
            && self.source_event_id == other.source_event_id
            && self.source_well == other.source_well
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WellState {
    pub total_volume_l: f64,
    pub components: Vec<MaterialComponent>,
}

impl WellState {
    /// Merges into a component of the same material, event and source well, or appends.
    pub fn add_component(&mut self, component: MaterialComponent) {
        if let Some(existing) = self.components.iter_mut().find(|c| c.same_origin(&component)) {
            existing.moles += component.moles;
            existing.volume_l += component.volume_l;
        } else {
            self.components.push(component);
        }
    }

    pub fn add_volume(&mut self, delta_l: f64) {
        if !delta_l.is_finite() {
            return;
        }
        self.total_volume_l = (self.total_volume_l + delta_l).max(0.0);
    }

    pub fn subtract_volume(&mut self, delta_l: f64) {
        if !delta_l.is_finite() {
            return;
        }
        self.total_volume_l = (self.total_volume_l - delta_l).max(0.0);
    }

    pub fn remove_all_components(&mut self) {
        self.components.clear();
        self.total_volume_l = 0.0;
    }

    /// Multiplies every component's moles and volume by `factor`.
    pub fn scale_components(&mut self, factor: f64) {
        if !factor.is_finite() {
            return;
        }
        let factor = factor.max(0.0);
        for component in &mut self.components {
            component.moles *= factor;
            component.volume_l *= factor;
        }
    }

    pub fn prune_empty_components(&mut self) {
        self.components
            .retain(|c| c.moles > EMPTY_EPSILON || c.volume_l > EMPTY_EPSILON);
    }

    pub fn is_empty(&self) -> bool {
        self.total_volume_l <= EMPTY_EPSILON
    }

    pub fn moles_of(&self, material_id: &str) -> f64 {
        self.components
            .iter()
            .filter(|c| c.material_id == material_id)
            .map(|c| c.moles)
            .sum()
    }

    /// Molar concentration of one material, `None` for an empty well.
    pub fn concentration_molar(&self, material_id: &str) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.moles_of(material_id) / self.total_volume_l)
    }
}

pub type LabwareState = BTreeMap<String, WellState>;

/// Every well touched by a replay, keyed by labware id then well id.
pub type ReplayState = BTreeMap<String, LabwareState>;

pub fn ensure_well_state<'a>(labware: &'a mut LabwareState, well_id: &str) -> &'a mut WellState {
    labware.entry(well_id.to_string()).or_default()
}

pub fn ensure_labware_well<'a>(
    state: &'a mut ReplayState,
    labware_id: &str,
    well_id: &str,
) -> &'a mut WellState {
    ensure_well_state(state.entry(labware_id.to_string()).or_default(), well_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn component(
        material: &str,
        event: &str,
        well: &str,
        moles: f64,
        volume_l: f64,
    ) -> MaterialComponent {
        MaterialComponent {
            material_id: material.to_string(),
            moles,
            volume_l,
            source_event_id: Some(event.to_string()),
            source_labware: Some("labware:res1".to_string()),
            source_well: Some(well.to_string()),
        }
    }

    #[test]
    fn test_ensure_well_state_is_idempotent() {
        let mut labware = LabwareState::new();
        ensure_well_state(&mut labware, "A01").add_volume(1e-5);
        let well = ensure_well_state(&mut labware, "A01");
        assert_eq!(well.total_volume_l, 1e-5);
        assert_eq!(labware.len(), 1);
    }

    #[test]
    fn test_add_component_merges_same_origin() {
        let mut well = WellState::default();
        well.add_component(component("a", "evt-1", "SRC1", 1e-7, 1e-5));
        well.add_component(component("a", "evt-1", "SRC1", 1e-7, 1e-5));
        well.add_component(component("a", "evt-2", "SRC1", 1e-7, 1e-5));
        assert_eq!(well.components.len(), 2);
        assert!((well.components[0].moles - 2e-7).abs() < 1e-20);
        assert!((well.components[0].volume_l - 2e-5).abs() < 1e-18);
    }

    #[test]
    fn test_volume_is_clamped_and_ignores_non_finite() {
        let mut well = WellState::default();
        well.add_volume(1e-5);
        well.subtract_volume(5e-5);
        assert_eq!(well.total_volume_l, 0.0);
        well.add_volume(f64::NAN);
        well.add_volume(f64::INFINITY);
        assert_eq!(well.total_volume_l, 0.0);
    }

    #[test]
    fn test_remove_all_components() {
        let mut well = WellState::default();
        well.add_volume(1e-5);
        well.add_component(component("a", "evt-1", "SRC1", 1e-7, 1e-5));
        well.remove_all_components();
        assert!(well.components.is_empty());
        assert_eq!(well.total_volume_l, 0.0);
    }

    #[test]
    fn test_scale_and_prune() {
        let mut well = WellState::default();
        well.add_component(component("a", "evt-1", "SRC1", 1e-6, 1e-5));
        well.scale_components(0.5);
        assert!((well.moles_of("a") - 5e-7).abs() < 1e-20);
        well.scale_components(0.0);
        well.prune_empty_components();
        assert!(well.components.is_empty());
    }
}
