//! Plate event replay, time-travel queries, lineage and protocol instantiation.

pub mod analysis;
pub mod diagnostics;
pub mod documents;
pub mod error;
pub mod lineage;
pub mod logger;
pub mod protocol;
pub mod replay;
pub mod timeline;
pub mod units;

pub use replay::{replay_plate_events, replay_with_diagnostics, ReplayOptions, ReplayOutcome};
