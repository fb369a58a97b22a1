use crate::quantity::Quantity;
use serde::{Deserialize, Serialize};

/// A reference to a material as carried inside event details.
///
/// Events often name a material only by id; the stock concentration and molar mass
/// are then filled in from a catalog at replay time.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "MaterialRefRepr")]
pub struct MaterialRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stock_concentration: Option<Quantity>,
    /// Grams per mole.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub molar_mass: Option<f64>,
}

#[derive(Deserialize)]
struct MaterialRefFields {
    #[serde(alias = "@id")]
    id: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    stock_concentration: Option<Quantity>,
    #[serde(default)]
    molar_mass: Option<f64>,
}

/// Materials may be written as a bare id string or as a full object.
#[derive(Deserialize)]
#[serde(untagged)]
enum MaterialRefRepr {
    Id(String),
    Full(MaterialRefFields),
}

impl From<MaterialRefRepr> for MaterialRef {
    fn from(repr: MaterialRefRepr) -> Self {
        match repr {
            MaterialRefRepr::Id(id) => MaterialRef::new(&id),
            MaterialRefRepr::Full(f) => MaterialRef {
                id: f.id,
                label: f.label,
                stock_concentration: f.stock_concentration,
                molar_mass: f.molar_mass,
            },
        }
    }
}

impl MaterialRef {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            ..Self::default()
        }
    }

    pub fn with_stock_concentration(mut self, concentration: Quantity) -> Self {
        self.stock_concentration = Some(concentration);
        self
    }

    /// Fills whatever this reference leaves unspecified from a catalog entry.
    pub fn filled_from(&self, catalog_entry: &MaterialRef) -> MaterialRef {
        MaterialRef {
            id: self.id.clone(),
            label: self.label.clone().or_else(|| catalog_entry.label.clone()),
            stock_concentration: self
                .stock_concentration
                .clone()
                .or_else(|| catalog_entry.stock_concentration.clone()),
            molar_mass: self.molar_mass.or(catalog_entry.molar_mass),
        }
    }
}
