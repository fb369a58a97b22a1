use serde::{Deserialize, Serialize};

/// The physical form of a piece of labware.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabwareKind {
    Plate,
    Reservoir,
    TubeRack,
    Unknown,
}

impl LabwareKind {
    /// Reads a free-text kind. Anything unrecognised is `Unknown`.
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().replace(['-', ' '], "_").as_str() {
            "plate" | "microplate" | "well_plate" => LabwareKind::Plate,
            "reservoir" | "trough" => LabwareKind::Reservoir,
            "tube_rack" | "tuberack" | "rack" => LabwareKind::TubeRack,
            _ => LabwareKind::Unknown,
        }
    }
}

/// A reference to a piece of labware, `{ "@id": ..., kind?, label? }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "LabwareRefRepr")]
pub struct LabwareRef {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl LabwareRef {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: None,
            label: None,
        }
    }

    pub fn with_kind(mut self, kind: &str) -> Self {
        self.kind = Some(kind.to_string());
        self
    }

    pub fn labware_kind(&self) -> Option<LabwareKind> {
        self.kind.as_deref().map(LabwareKind::parse)
    }
}

#[derive(Deserialize)]
struct LabwareRefFields {
    #[serde(rename = "@id", alias = "id")]
    id: String,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

/// Older logs write labware as a bare id string.
#[derive(Deserialize)]
#[serde(untagged)]
enum LabwareRefRepr {
    Id(String),
    Full(LabwareRefFields),
}

impl From<LabwareRefRepr> for LabwareRef {
    fn from(repr: LabwareRefRepr) -> Self {
        match repr {
            LabwareRefRepr::Id(id) => LabwareRef::new(&id),
            LabwareRefRepr::Full(fields) => LabwareRef {
                id: fields.id,
                kind: fields.kind,
                label: fields.label,
            },
        }
    }
}
