use std::error::Error;
use std::fs;
use std::path::Path;

use clap::{Parser, Subcommand};
use commands::{
    design::{self, DesignArgs},
    resume::{self, ResumeArgs},
    simulate::{self, SimulateArgs},
};
use psy_ado::{write_rows_csv, ExperimentConfig, Procedure, SessionReport, SessionSnapshot};
use psy_core::AdaptiveProcedure;
use serde::Serialize;
use tracing::Level;

mod commands;
mod logging;

#[derive(Parser, Debug)]
#[command(name = "psy-sim", about = "Adaptive psychophysics session simulator")]
struct Cli {
    /// Default log level; `RUST_LOG` takes precedence.
    #[arg(long, global = true, default_value = "info")]
    log_level: Level,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a simulated session from a YAML configuration.
    Simulate(SimulateArgs),
    /// Continue a session from a snapshot.
    Resume(ResumeArgs),
    /// Print the most informative candidate stimuli.
    Design(DesignArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    logging::init(cli.log_level);
    match cli.command {
        Command::Simulate(args) => simulate::run(&args),
        Command::Resume(args) => resume::run(&args),
        Command::Design(args) => design::run(&args),
    }
}

pub(crate) fn load_config(path: &Path) -> Result<ExperimentConfig, Box<dyn Error>> {
    Ok(ExperimentConfig::load(path)?)
}

pub(crate) fn write_json<P: AsRef<Path>, T: Serialize>(
    path: P,
    value: &T,
) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.as_ref().parent() {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json)?;
    Ok(())
}

/// Writes `trials.csv`, `summary.json`, `snapshot.json` and `config.yaml` into `out`.
pub(crate) fn write_session_artefacts(
    out: &Path,
    config: &ExperimentConfig,
    seed: u64,
    procedure: &Procedure,
    report: &SessionReport,
) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(out)?;
    write_rows_csv(&out.join("trials.csv"), &report.rows)?;
    let mut summary = serde_json::json!({
        "report": report.report,
        "stopped_early": report.stopped_early,
        "seed": seed,
    });
    if let Some(engine) = procedure.engine() {
        summary["summary"] = serde_json::to_value(engine.summary())?;
        summary["threshold_75"] = serde_json::to_value(engine.threshold_at(0.75))?;
        summary["credible_intervals_95"] = serde_json::to_value(engine.credible_intervals(0.95)?)?;
        summary["fallbacks"] = serde_json::to_value(engine.fallback_count())?;
    }
    write_json(out.join("summary.json"), &summary)?;
    SessionSnapshot::capture(config, seed, procedure.history()).store(&out.join("snapshot.json"))?;
    fs::write(out.join("config.yaml"), config.to_yaml_string()?)?;
    Ok(())
}
