use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProtocolMetadata {
    #[serde(rename = "@id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LabwareRole {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_labware_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// One step of a protocol template. Labware is referenced by role name
/// (`source_role`, `target_role`, `labware_role`) and string fields may hold
/// `${name}` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbstractEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub event_type: String,
    #[serde(default)]
    pub details: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProtocolData {
    /// Absent (as opposed to empty) means the template is not a protocol at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<AbstractEvent>>,
    #[serde(rename = "labwareRoles", alias = "labware_roles", default)]
    pub labware_roles: BTreeMap<String, LabwareRole>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProtocolTemplate {
    #[serde(default)]
    pub metadata: ProtocolMetadata,
    #[serde(default)]
    pub data: ProtocolData,
}

/// Concrete labware and parameter values for one run of a template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolBinding {
    #[serde(default)]
    pub labware: BTreeMap<String, String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, serde_json::Value>,
    pub run_id: String,
    /// ISO-8601 instant of the first instantiated event.
    pub base_timestamp: String,
}
