use crate::{lineage::LineageEdge, replay::state::ReplayState};
use csv::Writer;
use labtrace_schemas::event::PlateEvent;
use serde::Serialize;
use std::fs;
use std::io;

#[derive(Debug, Serialize)]
struct LogEntry {
    sequence: usize,
    event_id: String,
    event_type: String,
    timestamp: String,
    total_volume_l: f64,
    state_json: String,
    edges_json: String,
}

/// Writes one CSV row per applied event with the state as it stood afterwards.
pub struct StateLogger {
    writer: Writer<fs::File>,
}

impl StateLogger {
    pub fn new(path: &str) -> Result<Self, io::Error> {
        let writer = Writer::from_path(path)?;
        Ok(Self { writer })
    }

    pub fn log_event(
        &mut self,
        sequence: usize,
        event: &PlateEvent,
        state: &ReplayState,
        edges: &[LineageEdge],
    ) -> Result<(), anyhow::Error> {
        let total_volume_l = state
            .values()
            .flat_map(|labware| labware.values())
            .map(|well| well.total_volume_l)
            .sum();

        let entry = LogEntry {
            sequence,
            event_id: event.id.clone(),
            event_type: event.event_type.clone().unwrap_or_default(),
            timestamp: event.timestamp.clone().unwrap_or_default(),
            total_volume_l,
            state_json: serde_json::to_string(state)?,
            edges_json: serde_json::to_string(edges)?,
        };

        self.writer.serialize(entry)?;
        self.writer.flush()?;
        Ok(())
    }
}
