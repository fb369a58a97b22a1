use crate::{
    event::PlateEvent,
    material::MaterialRef,
    protocol::{ProtocolBinding, ProtocolTemplate},
};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Deserialize)]
pub struct EventLogFile {
    #[serde(default)]
    pub schema_version: String,
    pub events: Vec<PlateEvent>,
}

/// Templates are stored as-is, with `metadata` and `data` at the top level.
pub type ProtocolFile = ProtocolTemplate;

#[derive(Debug, Deserialize)]
pub struct BindingFile {
    #[serde(default)]
    pub schema_version: String,
    pub binding: ProtocolBinding,
}

#[derive(Debug, Deserialize)]
pub struct MaterialFile {
    pub schema_version: String,
    pub materials: Vec<MaterialRef>,
}

/// Per-lab replay settings.
#[derive(Debug, Deserialize)]
pub struct LabConfigFile {
    pub schema_version: String,
    /// Labware id to whether transfers out of it deplete its wells.
    #[serde(default)]
    pub depletion: BTreeMap<String, bool>,
}
