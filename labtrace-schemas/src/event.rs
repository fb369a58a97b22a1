use crate::{labware::LabwareRef, material::MaterialRef, quantity::Quantity};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Transfer,
    Wash,
    Harvest,
    SampleOperation,
    Read,
    Incubate,
    Other,
}

impl EventType {
    /// Maps a recorded `event_type` tag onto the closed set of kinds.
    /// Unknown and legacy tags become `Other`.
    pub fn parse(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "transfer" => EventType::Transfer,
            "wash" => EventType::Wash,
            "harvest" => EventType::Harvest,
            "sample_operation" | "sample-operation" | "sampleoperation" => {
                EventType::SampleOperation
            }
            "read" => EventType::Read,
            "incubate" => EventType::Incubate,
            _ => EventType::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Transfer => "transfer",
            EventType::Wash => "wash",
            EventType::Harvest => "harvest",
            EventType::SampleOperation => "sample_operation",
            EventType::Read => "read",
            EventType::Incubate => "incubate",
            EventType::Other => "other",
        }
    }
}

/// One recorded laboratory operation.
///
/// `details` stays an untyped JSON value here; it is decoded into the payload for
/// the event's kind when the event is replayed, so a single malformed payload does
/// not make the whole log unreadable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlateEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,
    #[serde(default)]
    pub labware: Vec<LabwareRef>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl PlateEvent {
    /// `None` when the event carries no type tag at all.
    pub fn kind(&self) -> Option<EventType> {
        self.event_type.as_deref().map(EventType::parse)
    }

    pub fn references_labware(&self, labware_id: &str) -> bool {
        self.labware.iter().any(|l| l.id == labware_id)
    }

    pub fn labware_ref(&self, labware_id: &str) -> Option<&LabwareRef> {
        self.labware.iter().find(|l| l.id == labware_id)
    }

    /// Decodes `details` into a typed payload.
    pub fn details_as<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.details.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellMapping {
    pub source_well: String,
    pub target_well: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Quantity>,
}

/// Per-well annotations on either side of a transfer.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WellSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_well: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<MaterialRef>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransferEndpoint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labware: Option<LabwareRef>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub wells: BTreeMap<String, WellSpec>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransferDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<TransferEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TransferEndpoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping: Option<Vec<WellMapping>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<Quantity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<MaterialRef>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct WashDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labware: Option<LabwareRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wells: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SampleInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labware: Option<LabwareRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub wells: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub samples: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleOutput {
    #[serde(rename = "@id", alias = "id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub material: Option<MaterialRef>,
}

/// Payload shared by `harvest` and `sample_operation` events.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SampleOperationDetails {
    #[serde(default, deserialize_with = "one_or_many")]
    pub inputs: Vec<SampleInput>,
    #[serde(default)]
    pub outputs: Vec<SampleOutput>,
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }

    Ok(match OneOrMany::<T>::deserialize(deserializer)? {
        OneOrMany::Many(items) => items,
        OneOrMany::One(item) => vec![item],
    })
}
