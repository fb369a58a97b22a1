use labtrace_core::{
    analysis::{ledger_from_state, read_state_log, transferred_by_material, well_volume_series},
    diagnostics::CollectingDiagnostics,
    lineage::build_lineage_graph,
    replay::builder::ReplayBuilder,
    replay_plate_events, replay_with_diagnostics,
    timeline::{parse_timestamp, plate_state_at_time},
    ReplayOptions,
};
use labtrace_schemas::event::PlateEvent;
use serde_json::{json, Value};

fn transfer(
    id: &str,
    ts: &str,
    source: Value,
    target: Value,
    mapping: Value,
    extra: Value,
) -> Value {
    let mut details = json!({
        "source": { "labware": source.clone() },
        "target": { "labware": target.clone() },
        "mapping": mapping
    });
    if let (Some(details), Some(extra)) = (details.as_object_mut(), extra.as_object()) {
        details.extend(extra.clone());
    }
    json!({
        "id": id,
        "event_type": "transfer",
        "timestamp": ts,
        "labware": [source, target],
        "details": details
    })
}

fn two_step_log() -> Vec<PlateEvent> {
    serde_json::from_value(json!([
        transfer(
            "evt-1",
            "2024-03-01T09:00:00Z",
            json!({ "@id": "labware:res1", "kind": "reservoir" }),
            json!({ "@id": "labware:plate1", "kind": "plate" }),
            json!([{ "source_well": "SRC1", "target_well": "A01", "volume": "10 uL" }]),
            json!({ "material": { "id": "a", "stock_concentration": "10 mM" } }),
        ),
        transfer(
            "evt-2",
            "2024-03-01T09:10:00Z",
            json!({ "@id": "labware:plate1", "kind": "plate" }),
            json!({ "@id": "labware:plate2", "kind": "plate" }),
            json!([{ "source_well": "A01", "target_well": "B01", "volume": "5 uL" }]),
            json!({}),
        ),
    ]))
    .unwrap()
}

#[test]
fn two_step_transfer_carries_material_through() {
    let outcome = replay_plate_events(&two_step_log(), &ReplayOptions::default());

    let a01 = &outcome.state["labware:plate1"]["A01"];
    let b01 = &outcome.state["labware:plate2"]["B01"];
    assert!(a01.total_volume_l > 0.0);
    assert!(b01.total_volume_l > 0.0);
    assert!(a01.moles_of("a") > 0.0);
    assert!(b01.moles_of("a") > 0.0);

    // plate1 depletes by default: 10 uL in, 5 uL out
    assert!((a01.total_volume_l - 5e-6).abs() < 1e-12);
    assert!((a01.moles_of("a") - 5e-8).abs() < 1e-15);
    assert!((b01.moles_of("a") - 5e-8).abs() < 1e-15);

    // reservoirs are not depleted
    let src1 = &outcome.state["labware:res1"]["SRC1"];
    assert!(src1.total_volume_l >= 1e-5 - 1e-12);
}

#[test]
fn lineage_links_reservoir_to_second_plate() {
    let outcome = replay_plate_events(&two_step_log(), &ReplayOptions::default());
    assert_eq!(outcome.edges.len(), 2);

    let graph = build_lineage_graph(&outcome.edges);
    let ancestors: Vec<String> = graph
        .ancestors("labware:plate2:B01")
        .into_iter()
        .map(|node| node.key.clone())
        .collect();
    assert_eq!(ancestors, vec!["labware:plate1:A01", "labware:res1:SRC1"]);

    let moved = transferred_by_material(&outcome.edges);
    assert!((moved["a"] - 1.5e-7).abs() < 1e-15);
}

#[test]
fn state_before_second_transfer_has_no_second_plate() {
    let cutoff = parse_timestamp("2024-03-01T09:05:00Z");
    let state = plate_state_at_time(&two_step_log(), cutoff, &ReplayOptions::default());
    assert!(state.contains_key("labware:plate1"));
    assert!(!state.contains_key("labware:plate2"));
}

#[test]
fn wash_clears_well() {
    let mut events = two_step_log();
    events.push(
        serde_json::from_value(json!({
            "id": "evt-3",
            "event_type": "wash",
            "timestamp": "2024-03-01T09:20:00Z",
            "labware": [{ "@id": "labware:plate2", "kind": "plate" }],
            "details": { "labware": { "@id": "labware:plate2" }, "wells": ["B01"] }
        }))
        .unwrap(),
    );
    let outcome = replay_plate_events(&events, &ReplayOptions::default());
    let b01 = &outcome.state["labware:plate2"]["B01"];
    assert_eq!(b01.total_volume_l, 0.0);
    assert!(b01.components.is_empty());
    // the wash touched only plate2
    assert!(outcome.state["labware:plate1"]["A01"].total_volume_l > 0.0);
}

#[test]
fn identical_timestamps_replay_in_list_order() {
    let fill = transfer(
        "fill",
        "2024-03-01T09:00:00Z",
        json!({ "@id": "labware:res1", "kind": "reservoir" }),
        json!({ "@id": "labware:plate1", "kind": "plate" }),
        json!([{ "source_well": "SRC1", "target_well": "A01", "volume": "10 uL" }]),
        json!({ "material": { "id": "a", "stock_concentration": "10 mM" } }),
    );
    let wash = json!({
        "id": "wash",
        "event_type": "wash",
        "timestamp": "2024-03-01T09:00:00Z",
        "labware": [{ "@id": "labware:plate1" }],
        "details": { "wells": ["A01"] }
    });

    let fill_then_wash: Vec<PlateEvent> =
        serde_json::from_value(json!([fill.clone(), wash.clone()])).unwrap();
    let wash_then_fill: Vec<PlateEvent> = serde_json::from_value(json!([wash, fill])).unwrap();

    let washed = replay_plate_events(&fill_then_wash, &ReplayOptions::default());
    assert_eq!(washed.state["labware:plate1"]["A01"].total_volume_l, 0.0);

    let filled = replay_plate_events(&wash_then_fill, &ReplayOptions::default());
    assert!(filled.state["labware:plate1"]["A01"].total_volume_l > 0.0);
}

fn plate_to_plate(source_kind: &str) -> Vec<PlateEvent> {
    serde_json::from_value(json!([transfer(
        "t",
        "2024-03-01T09:00:00Z",
        json!({ "@id": "labware:src", "kind": source_kind }),
        json!({ "@id": "labware:dst", "kind": "plate" }),
        json!([{ "source_well": "A01", "target_well": "A01", "volume": "10 uL" }]),
        json!({ "material": { "id": "a", "stock_concentration": "1 mM" } }),
    )]))
    .unwrap()
}

#[test]
fn depletion_defaults_follow_labware_kind() {
    let plate = replay_plate_events(&plate_to_plate("plate"), &ReplayOptions::default());
    assert!(plate.state["labware:src"]["A01"].total_volume_l.abs() < 1e-15);

    let reservoir = replay_plate_events(&plate_to_plate("reservoir"), &ReplayOptions::default());
    assert!(reservoir.state["labware:src"]["A01"].total_volume_l > 0.0);
}

#[test]
fn depletion_overrides_win() {
    let mut options = ReplayOptions::default();
    options
        .depletion_by_labware_id
        .insert("labware:src".to_string(), false);
    let plate = replay_plate_events(&plate_to_plate("plate"), &options);
    assert!(plate.state["labware:src"]["A01"].total_volume_l > 0.0);

    options
        .depletion_by_labware_id
        .insert("labware:src".to_string(), true);
    let reservoir = replay_plate_events(&plate_to_plate("reservoir"), &options);
    assert!(reservoir.state["labware:src"]["A01"].total_volume_l.abs() < 1e-15);
}

#[test]
fn replay_is_idempotent() {
    let events = two_step_log();
    let first = replay_plate_events(&events, &ReplayOptions::default());
    let second = replay_plate_events(&events, &ReplayOptions::default());
    assert_eq!(first, second);
}

#[test]
fn malformed_events_are_skipped_with_a_notice() {
    let mut events = two_step_log();
    events.insert(
        0,
        serde_json::from_value(json!({
            "id": "broken",
            "event_type": "transfer",
            "timestamp": "2024-03-01T08:00:00Z",
            "details": { "mapping": "not a list" }
        }))
        .unwrap(),
    );
    events.push(serde_json::from_value(json!({ "id": "untyped" })).unwrap());

    let mut diagnostics = CollectingDiagnostics::default();
    let outcome = replay_with_diagnostics(&events, &ReplayOptions::default(), &mut diagnostics);
    assert_eq!(outcome, replay_plate_events(&two_step_log(), &ReplayOptions::default()));

    let keys = diagnostics.keys();
    assert!(keys.contains(&"malformed:broken"));
    assert!(keys.contains(&"malformed:untyped"));
}

#[test]
fn ledger_totals_match_replayed_state() {
    let outcome = replay_plate_events(&two_step_log(), &ReplayOptions::default());
    let ledger = ledger_from_state(&outcome.state);
    assert_eq!(ledger.well_count, 3);
    assert!(ledger.materials["a"].moles > 0.0);
    assert!((ledger.labware_volume_l["labware:plate2"] - 5e-6).abs() < 1e-12);
}

#[test]
fn state_log_round_trips_through_csv() {
    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("state_log.csv");
    let log_path = log_path.to_str().unwrap();

    let mut engine = ReplayBuilder::new()
        .with_state_logging_to_file(log_path)
        .build()
        .unwrap();
    let outcome = engine.replay(&two_step_log()).unwrap();

    let entries = read_state_log(log_path).unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].event_id, "evt-1");
    assert_eq!(entries[1].event_type, "transfer");
    let logged_edges = entries[1].edges().unwrap();
    assert_eq!(logged_edges.len(), 1);
    assert_eq!(logged_edges[0].event_id, outcome.edges[1].event_id);
    assert_eq!(logged_edges[0].to, outcome.edges[1].to);

    let last = entries[1].state().unwrap();
    assert_eq!(
        last.keys().collect::<Vec<_>>(),
        outcome.state.keys().collect::<Vec<_>>()
    );

    let series = well_volume_series(&entries, "labware:plate1").unwrap();
    let a01 = &series["A01"];
    assert_eq!(a01.len(), 2);
    assert!(a01[0].1 > a01[1].1);
}
