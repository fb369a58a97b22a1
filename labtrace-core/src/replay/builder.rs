use super::{engine::ReplayEngine, ReplayOptions};
use crate::{
    diagnostics::{Diagnostics, TracingDiagnostics},
    error::LabtraceError,
    logger::StateLogger,
};
use labtrace_schemas::material::MaterialRef;
use std::collections::HashMap;

/// A fluent builder for constructing a `ReplayEngine`.
///
/// Collects the replay options, the sink for skipped-event notices and an optional
/// CSV file that receives a state snapshot after every applied event.
#[derive(Default)]
pub struct ReplayBuilder {
    options: ReplayOptions,
    diagnostics: Option<Box<dyn Diagnostics>>,
    log_path: Option<String>,
}

impl ReplayBuilder {
    /// Creates a new `ReplayBuilder` with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing set of options.
    pub fn with_options(mut self, options: ReplayOptions) -> Self {
        self.options = options;
        self
    }

    /// Restricts replay to events that touch the given labware.
    pub fn with_focus_labware(mut self, labware_id: &str) -> Self {
        self.options.focus_labware_id = Some(labware_id.to_string());
        self
    }

    /// Overrides whether transfers out of `labware_id` deplete its wells.
    pub fn with_depletion_override(mut self, labware_id: &str, depletes: bool) -> Self {
        self.options
            .depletion_by_labware_id
            .insert(labware_id.to_string(), depletes);
        self
    }

    pub fn with_depletion_overrides(mut self, overrides: HashMap<String, bool>) -> Self {
        self.options.depletion_by_labware_id.extend(overrides);
        self
    }

    /// Supplies stock concentrations and molar masses for materials named only by id.
    pub fn with_material_catalog(mut self, materials: Vec<MaterialRef>) -> Self {
        self.options
            .material_catalog
            .extend(materials.into_iter().map(|m| (m.id.clone(), m)));
        self
    }

    pub fn with_diagnostics(mut self, diagnostics: Box<dyn Diagnostics>) -> Self {
        self.diagnostics = Some(diagnostics);
        self
    }

    /// Configures the replay to write a state snapshot per applied event to a CSV file.
    pub fn with_state_logging_to_file(mut self, path: &str) -> Self {
        self.log_path = Some(path.to_string());
        self
    }

    /// Consumes the builder and returns a configured `ReplayEngine`.
    ///
    /// # Errors
    ///
    /// Returns a `LabtraceError` if the state log file cannot be created, or if a
    /// depletion override names an empty labware id.
    pub fn build(self) -> Result<ReplayEngine, LabtraceError> {
        if self.options.depletion_by_labware_id.keys().any(|id| id.trim().is_empty()) {
            return Err(LabtraceError::InvalidInput(
                "depletion override with an empty labware id".to_string(),
            ));
        }

        let logger = match self.log_path {
            Some(path) => Some(
                StateLogger::new(&path).map_err(|e| LabtraceError::FileIO(path.clone(), e))?,
            ),
            None => None,
        };

        Ok(ReplayEngine {
            options: self.options,
            diagnostics: self
                .diagnostics
                .unwrap_or_else(|| Box::new(TracingDiagnostics::new())),
            logger,
        })
    }
}
