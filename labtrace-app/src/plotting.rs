//! Charts drawn from a replay's CSV state log.

use anyhow::Result;
use labtrace_core::analysis::{self, LogEntry};
use labtrace_schemas::event::EventType;
use plotters::prelude::*;
use std::collections::BTreeMap;

/// Generates and saves every chart for one replay run.
pub fn generate_all_plots(
    output_dir: &str,
    log_path: &str,
    labware_id: Option<&str>,
) -> Result<()> {
    println!("[Plotting] Generating charts from the state log...");

    let entries = analysis::read_state_log(log_path)?;
    if entries.is_empty() {
        println!("[Plotting] Warning: No applied events to plot.");
        return Ok(());
    }

    let labware_id = match labware_id {
        Some(id) => Some(id.to_string()),
        None => busiest_labware(&entries)?,
    };
    if let Some(labware_id) = labware_id {
        plot_well_volumes(output_dir, &entries, &labware_id)?;
    }
    plot_event_timeline(output_dir, &entries)?;

    println!("[Plotting] Charts have been saved to '{}'.", output_dir);
    Ok(())
}

/// The labware holding the most wells at the end of the log.
fn busiest_labware(entries: &[LogEntry]) -> Result<Option<String>> {
    let Some(last) = entries.last() else {
        return Ok(None);
    };
    let state = last.state()?;
    Ok(state
        .iter()
        .max_by_key(|(_, wells)| wells.len())
        .map(|(labware_id, _)| labware_id.clone()))
}

/// Line chart of every well's volume (µL) after each applied event.
fn plot_well_volumes(output_dir: &str, entries: &[LogEntry], labware_id: &str) -> Result<()> {
    let series = analysis::well_volume_series(entries, labware_id)?;
    if series.is_empty() {
        return Ok(());
    }

    let path = format!("{}/1_well_volumes.png", output_dir);
    let root = BitMapBackend::new(&path, (1024, 768)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_sequence = entries.last().map_or(1, |e| e.sequence + 1);
    let max_volume_ul: f64 = series
        .values()
        .flat_map(|points| points.iter().map(|(_, v)| v * 1e6))
        .fold(0.0, f64::max)
        .max(1.0);

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Well Volumes: {}", labware_id),
            ("sans-serif", 40).into_font(),
        )
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(0usize..max_sequence, 0f64..max_volume_ul * 1.1)?;

    chart
        .configure_mesh()
        .x_desc("Applied event")
        .y_desc("Volume (µL)")
        .draw()?;

    let colors = [RED, GREEN, BLUE, CYAN, MAGENTA, BLACK];
    for (i, (well_id, points)) in series.iter().enumerate() {
        let color = colors[i % colors.len()];
        chart
            .draw_series(LineSeries::new(
                points.iter().map(|(sequence, volume)| (*sequence, volume * 1e6)),
                color.stroke_width(2),
            ))?
            .label(well_id.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], color.filled()));
    }

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}

/// Histogram of applied events per kind.
fn plot_event_timeline(output_dir: &str, entries: &[LogEntry]) -> Result<()> {
    let mut counts: BTreeMap<&'static str, u32> = BTreeMap::new();
    for entry in entries {
        *counts.entry(EventType::parse(&entry.event_type).as_str()).or_insert(0) += 1;
    }
    let kinds: Vec<&str> = counts.keys().copied().collect();
    let max_count = counts.values().copied().max().unwrap_or(1);

    let path = format!("{}/2_event_timeline.png", output_dir);
    let root = BitMapBackend::new(&path, (1024, 512)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Applied Events by Kind", ("sans-serif", 30).into_font())
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d((0u32..kinds.len() as u32).into_segmented(), 0u32..max_count + 1)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(kinds.len())
        .x_label_formatter(&|value| match value {
            SegmentValue::CenterOf(index) => kinds
                .get(*index as usize)
                .map_or_else(String::new, |kind| kind.to_string()),
            _ => String::new(),
        })
        .y_desc("Events")
        .draw()?;

    chart.draw_series(
        Histogram::vertical(&chart)
            .style(BLUE.filled())
            .margin(10)
            .data(counts.values().enumerate().map(|(index, count)| (index as u32, *count))),
    )?;

    root.present()?;
    Ok(())
}
