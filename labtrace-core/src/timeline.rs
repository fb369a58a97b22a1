//! "As of" queries over an event log.

use crate::{
    diagnostics::TracingDiagnostics,
    replay::{
        engine::replay_sorted_infallible,
        ordering::event_instant,
        state::{ReplayState, WellState},
        ReplayOptions, ReplayOutcome,
    },
};
use chrono::{DateTime, Utc};
use labtrace_schemas::event::PlateEvent;

pub use crate::replay::ordering::{parse_timestamp, sort_events_stable};

/// Replays every event at or before `cutoff`; `None` replays the whole log.
///
/// Events without a readable timestamp are always included.
pub fn replay_at_time(
    events: &[PlateEvent],
    cutoff: Option<DateTime<Utc>>,
    options: &ReplayOptions,
) -> ReplayOutcome {
    let included: Vec<&PlateEvent> = sort_events_stable(events)
        .into_iter()
        .filter(|event| match (cutoff, event_instant(event)) {
            (Some(cutoff), Some(at)) => at <= cutoff,
            _ => true,
        })
        .collect();
    replay_sorted_infallible(&included, options, &mut TracingDiagnostics::new())
}

pub fn plate_state_at_time(
    events: &[PlateEvent],
    cutoff: Option<DateTime<Utc>>,
    options: &ReplayOptions,
) -> ReplayState {
    replay_at_time(events, cutoff, options).state
}

pub fn well_composition_at_time(
    events: &[PlateEvent],
    cutoff: Option<DateTime<Utc>>,
    labware_id: &str,
    well_id: &str,
    options: &ReplayOptions,
) -> Option<WellState> {
    plate_state_at_time(events, cutoff, options)
        .remove(labware_id)
        .and_then(|mut labware| labware.remove(well_id))
}

/// Events whose `labware` list names `labware_id`, in replay order.
pub fn event_timeline_for_labware<'a>(
    events: &'a [PlateEvent],
    labware_id: &str,
) -> Vec<&'a PlateEvent> {
    sort_events_stable(events)
        .into_iter()
        .filter(|event| event.references_labware(labware_id))
        .collect()
}
