use crate::config::LabConfig;
use crate::plotting;
use anyhow::{bail, Context, Result};
use labtrace_core::{
    analysis::{self, MaterialLedger, ProtocolStep},
    documents,
    lineage::build_lineage_graph,
    protocol,
    replay::builder::ReplayBuilder,
    timeline, units, ReplayOutcome,
};
use labtrace_schemas::event::PlateEvent;
use serde::Serialize;
use std::{fs, path::Path};

fn write_json<T: Serialize>(output_dir: &str, file_name: &str, value: &T) -> Result<()> {
    let path = Path::new(output_dir).join(file_name);
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {:?}", path))?;
    Ok(())
}

fn load_events(events_path: &str) -> Result<Vec<PlateEvent>> {
    let events = documents::read_event_log(events_path)
        .with_context(|| format!("Failed to load event log '{}'", events_path))?;
    println!("Loaded {} event(s) from '{}'.", events.len(), events_path);
    Ok(events)
}

/// Replays a whole log, logging each applied event to CSV and saving state, lineage
/// and charts.
pub fn run_replay(
    events_path: &str,
    lab: &LabConfig,
    focus_labware_id: Option<&str>,
    output_dir: &str,
    with_plots: bool,
) -> Result<()> {
    println!("\n--- [Workflow] Replaying plate events ---");
    let events = load_events(events_path)?;

    let log_path = Path::new(output_dir).join("state_log.csv");
    let log_path = log_path
        .to_str()
        .context("Output directory is not valid UTF-8")?
        .to_string();

    let mut engine = ReplayBuilder::new()
        .with_options(lab.replay_options(focus_labware_id))
        .with_state_logging_to_file(&log_path)
        .build()?;
    let outcome = engine.replay(&events)?;

    write_json(output_dir, "state.json", &outcome.state)?;
    write_json(output_dir, "lineage.json", &build_lineage_graph(&outcome.edges))?;
    let ledger = analysis::ledger_from_state(&outcome.state);
    write_json(output_dir, "ledger.json", &ledger)?;

    if with_plots {
        plotting::generate_all_plots(output_dir, &log_path, focus_labware_id)?;
    }

    print_summary_report(&events, &outcome, &ledger);
    Ok(())
}

/// Reconstructs the state as of `at`, or one well of it.
pub fn run_state_at(
    events_path: &str,
    lab: &LabConfig,
    at: Option<&str>,
    well: Option<(&str, &str)>,
    output_dir: &str,
) -> Result<()> {
    println!("\n--- [Workflow] Reconstructing state ---");
    let events = load_events(events_path)?;
    let cutoff = match at {
        Some(text) => match timeline::parse_timestamp(text) {
            Some(instant) => Some(instant),
            None => bail!("'{}' is not an ISO-8601 timestamp", text),
        },
        None => None,
    };
    let options = lab.replay_options(None);

    match well {
        Some((labware_id, well_id)) => {
            let composition =
                timeline::well_composition_at_time(&events, cutoff, labware_id, well_id, &options);
            match &composition {
                Some(state) => {
                    println!(
                        "{}:{} holds {} in {} component(s).",
                        labware_id,
                        well_id,
                        units::format_volume(state.total_volume_l),
                        state.components.len()
                    );
                    for component in &state.components {
                        println!(
                            "  - {}: {:.3e} mol ({:.3e} M)",
                            component.material_id,
                            component.moles,
                            state.concentration_molar(&component.material_id).unwrap_or(0.0)
                        );
                    }
                }
                None => println!(
                    "{}:{} has no recorded contents at that time.",
                    labware_id, well_id
                ),
            }
            write_json(output_dir, "well_state.json", &composition)?;
        }
        None => {
            let state = timeline::plate_state_at_time(&events, cutoff, &options);
            println!("{} labware with recorded contents.", state.len());
            write_json(output_dir, "state.json", &state)?;
        }
    }
    Ok(())
}

/// Lists the events that touch one piece of labware, in replay order.
pub fn run_timeline(events_path: &str, labware_id: &str, output_dir: &str) -> Result<()> {
    println!("\n--- [Workflow] Event timeline for {} ---", labware_id);
    let events = load_events(events_path)?;
    let touching = timeline::event_timeline_for_labware(&events, labware_id);

    for event in &touching {
        println!(
            "  {}  {:<16} {}",
            event.timestamp.as_deref().unwrap_or("(no timestamp)"),
            event.event_type.as_deref().unwrap_or("(untyped)"),
            event.id
        );
    }
    println!("{} event(s) touch {}.", touching.len(), labware_id);
    write_json(output_dir, "timeline.json", &touching)?;
    Ok(())
}

/// Builds the lineage graph and optionally walks the ancestry of one node.
pub fn run_lineage(
    events_path: &str,
    lab: &LabConfig,
    node_key: Option<&str>,
    output_dir: &str,
) -> Result<()> {
    println!("\n--- [Workflow] Building lineage graph ---");
    let events = load_events(events_path)?;
    let outcome = labtrace_core::replay_plate_events(&events, &lab.replay_options(None));
    let graph = build_lineage_graph(&outcome.edges);
    println!("{} node(s), {} edge(s).", graph.nodes.len(), graph.edges.len());

    if let Some(key) = node_key {
        if graph.node(key).is_none() {
            println!("No lineage recorded for '{}'.", key);
        } else {
            println!("Ancestors of {}:", key);
            for ancestor in graph.ancestors(key) {
                println!("  - {}", ancestor.key);
            }
        }
    }
    write_json(output_dir, "lineage.json", &graph)?;
    Ok(())
}

/// Expands a protocol template against a binding and saves the concrete events.
pub fn run_instantiate(template_path: &str, binding_path: &str, output_dir: &str) -> Result<()> {
    println!("\n--- [Workflow] Instantiating protocol ---");
    let template = documents::read_protocol_template(template_path)
        .with_context(|| format!("Failed to load protocol template '{}'", template_path))?;
    let binding = documents::read_protocol_binding(binding_path)
        .with_context(|| format!("Failed to load binding '{}'", binding_path))?;

    let events = protocol::instantiate_protocol(&template, &binding)?;
    let segment = protocol::build_protocol_segment_activity(&template, &binding)?;

    write_json(output_dir, "events.json", &events)?;
    write_json(output_dir, "segment.json", &segment)?;
    println!(
        "Instantiated '{}' for run {}: {} event(s) from {} to {}.",
        segment.label,
        segment.run,
        events.len(),
        segment.started_at,
        segment.ended_at
    );
    Ok(())
}

/// Writes a Markdown table of the log's steps.
pub fn run_report(events_path: &str, output_dir: &str) -> Result<()> {
    println!("\n--- [Workflow] Generating step report ---");
    let events = load_events(events_path)?;
    let steps = analysis::generate_step_report(&events);
    fs::write(
        Path::new(output_dir).join("protocol_steps.md"),
        generate_steps_table(&steps),
    )?;
    write_json(output_dir, "protocol_steps.json", &steps)?;
    println!("Wrote {} step(s).", steps.len());
    Ok(())
}

fn generate_steps_table(steps: &[ProtocolStep]) -> String {
    let mut table = String::from("# Protocol Steps\n\n");
    table.push_str("| Step | Time | Kind | Description |\n");
    table.push_str("|---|---|---|---|\n");
    for step in steps {
        table.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            step.step,
            step.timestamp.as_deref().unwrap_or("-"),
            step.kind,
            step.description.replace('|', "\\|")
        ));
    }
    table
}

fn print_summary_report(events: &[PlateEvent], outcome: &ReplayOutcome, ledger: &MaterialLedger) {
    println!("\n\n--- [Replay Summary Report] ---");
    println!("========================================");
    println!("Events in log: {}", events.len());
    println!("Labware: {}  Wells: {}", outcome.state.len(), ledger.well_count);
    println!("Lineage edges: {}", outcome.edges.len());
    println!("----------------------------------------");

    println!("\nVolume by labware:");
    for (labware_id, volume_l) in &ledger.labware_volume_l {
        println!("  - {}: {}", labware_id, units::format_volume(*volume_l));
    }

    println!("\nMaterials present:");
    for (material_id, totals) in &ledger.materials {
        println!(
            "  - {}: {:.4e} mol in {}",
            material_id,
            totals.moles,
            units::format_volume(totals.volume_l)
        );
    }

    println!("\nMaterial moved along lineage edges:");
    for (material_id, moles) in analysis::transferred_by_material(&outcome.edges) {
        println!("  - {}: {:.4e} mol", material_id, moles);
    }
    println!("========================================");
}
