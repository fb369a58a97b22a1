use anyhow::{Context, Result};
use labtrace_core::ReplayOptions;
use labtrace_schemas::{
    file_formats::{LabConfigFile, MaterialFile},
    material::MaterialRef,
};
use std::{collections::HashMap, fs, path::Path};

/// Lab-wide settings loaded from YAML files: which labware depletes and what the
/// stock materials are.
#[derive(Debug, Default)]
pub struct LabConfig {
    pub depletion: HashMap<String, bool>,
    pub materials: HashMap<String, MaterialRef>,
}

impl LabConfig {
    /// Loads `labware/` and `materials/` under `base_path`. Either directory may be absent.
    pub fn load(base_path: &str) -> Result<Self> {
        println!("Loading lab configuration from '{}'...", base_path);

        let depletion: HashMap<String, bool> = load_yaml_files_into_map(
            Path::new(base_path).join("labware"),
            |file: LabConfigFile| file.depletion.into_iter().collect(),
            |(labware_id, _): &(String, bool)| labware_id.clone(),
        )?
        .into_values()
        .collect();
        let materials = load_yaml_files_into_map(
            Path::new(base_path).join("materials"),
            |file: MaterialFile| file.materials,
            |item: &MaterialRef| item.id.clone(),
        )?;

        println!(
            "Lab configuration loaded: {} depletion override(s), {} material(s).",
            depletion.len(),
            materials.len()
        );
        Ok(Self { depletion, materials })
    }

    /// Replay options seeded from this configuration.
    pub fn replay_options(&self, focus_labware_id: Option<&str>) -> ReplayOptions {
        ReplayOptions {
            focus_labware_id: focus_labware_id.map(str::to_string),
            depletion_by_labware_id: self.depletion.clone(),
            material_catalog: self.materials.clone(),
        }
    }
}

/// Generic helper to load all YAML files in a directory into a HashMap.
fn load_yaml_files_into_map<P, F, E, T, K>(
    dir_path: P,
    extract_vec: E,
    get_key: K,
) -> Result<HashMap<String, T>>
where
    P: AsRef<Path>,
    F: for<'de> serde::Deserialize<'de>, // The file wrapper struct (e.g., MaterialFile)
    E: Fn(F) -> Vec<T>,                  // A closure to extract the Vec<T> from the wrapper
    K: Fn(&T) -> String,                 // A closure to get the key for the map from an item T
{
    let mut map = HashMap::new();
    if !dir_path.as_ref().is_dir() {
        tracing::debug!(dir = ?dir_path.as_ref(), "configuration directory not present");
        return Ok(map);
    }
    for entry in fs::read_dir(dir_path.as_ref())
        .with_context(|| format!("Failed to read directory: {:?}", dir_path.as_ref()))?
    {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().map_or(false, |s| s == "yaml" || s == "yml") {
            let content = fs::read_to_string(&path)?;
            let file_wrapper: F = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse YAML from {:?}", path))?;

            for item in extract_vec(file_wrapper) {
                map.insert(get_key(&item), item);
            }
        }
    }
    Ok(map)
}
