use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::fs;
use tracing_subscriber::EnvFilter;

mod config;
mod plotting;
mod workflow;

#[derive(Parser)]
#[command(name = "labtrace", version, about = "Replay plate events and instantiate protocols")]
struct Cli {
    /// Lab configuration directory holding `labware/` and `materials/` YAML files.
    #[arg(long, global = true, default_value = "./data/lab")]
    config: String,

    /// Output directory; defaults to ./data/runs/<command>_<timestamp>.
    #[arg(long, global = true)]
    out: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a full event log and save state, lineage, ledger and charts.
    Replay {
        events: String,
        #[arg(long)]
        focus: Option<String>,
        #[arg(long)]
        no_plots: bool,
    },
    /// Reconstruct the state as of a timestamp.
    StateAt {
        events: String,
        #[arg(long)]
        at: Option<String>,
        #[arg(long, requires = "well")]
        labware: Option<String>,
        #[arg(long, requires = "labware")]
        well: Option<String>,
    },
    /// List the events that touch one piece of labware.
    Timeline {
        events: String,
        #[arg(long)]
        labware: String,
    },
    /// Build the lineage graph, optionally tracing one node's ancestry.
    Lineage {
        events: String,
        /// `<labware_id>:<well_id>` or a sample id.
        #[arg(long)]
        node: Option<String>,
    },
    /// Expand a protocol template against a binding into concrete events.
    Instantiate {
        template: String,
        binding: String,
    },
    /// Render the log as a Markdown table of steps.
    Report { events: String },
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Replay { .. } => "replay",
            Command::StateAt { .. } => "state_at",
            Command::Timeline { .. } => "timeline",
            Command::Lineage { .. } => "lineage",
            Command::Instantiate { .. } => "instantiate",
            Command::Report { .. } => "report",
        }
    }
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    println!("--- Labtrace ---");

    let output_dir = cli.out.clone().unwrap_or_else(|| {
        format!(
            "./data/runs/{}_{}",
            cli.command.name(),
            chrono::Utc::now().format("%Y%m%d_%H%M%S")
        )
    });
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create output directory: {}", output_dir))?;

    match &cli.command {
        Command::Replay { events, focus, no_plots } => {
            let lab = config::LabConfig::load(&cli.config)?;
            workflow::run_replay(events, &lab, focus.as_deref(), &output_dir, !no_plots)?;
        }
        Command::StateAt { events, at, labware, well } => {
            let lab = config::LabConfig::load(&cli.config)?;
            let target = labware.as_deref().zip(well.as_deref());
            workflow::run_state_at(events, &lab, at.as_deref(), target, &output_dir)?;
        }
        Command::Timeline { events, labware } => {
            workflow::run_timeline(events, labware, &output_dir)?;
        }
        Command::Lineage { events, node } => {
            let lab = config::LabConfig::load(&cli.config)?;
            workflow::run_lineage(events, &lab, node.as_deref(), &output_dir)?;
        }
        Command::Instantiate { template, binding } => {
            workflow::run_instantiate(template, binding, &output_dir)?;
        }
        Command::Report { events } => {
            workflow::run_report(events, &output_dir)?;
        }
    }

    println!("\nDone. Results are in '{}'", output_dir);
    Ok(())
}
