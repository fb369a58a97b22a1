use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use labtrace_schemas::event::PlateEvent;

/// Reads an event timestamp. Offsets are honoured; timestamps without one are UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

pub fn event_instant(event: &PlateEvent) -> Option<DateTime<Utc>> {
    event.timestamp.as_deref().and_then(parse_timestamp)
}

/// Orders events by timestamp, keeping list order among equal timestamps.
///
/// Events whose timestamp is missing or unreadable come first, in list order.
pub fn sort_events_stable(events: &[PlateEvent]) -> Vec<&PlateEvent> {
    let mut keyed: Vec<(Option<DateTime<Utc>>, usize, &PlateEvent)> = events
        .iter()
        .enumerate()
        .map(|(index, event)| (event_instant(event), index, event))
        .collect();
    keyed.sort_by(|a, b| a.0.cmp(&b.0).then(a.1.cmp(&b.1)));
    keyed.into_iter().map(|(_, _, event)| event).collect()
}
