use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use psy_ado::{Procedure, SessionSnapshot};
use psy_core::AdaptiveProcedure;
use serde_json::json;

use crate::load_config;

#[derive(Args, Debug)]
pub struct DesignArgs {
    /// YAML experiment configuration.
    #[arg(long)]
    pub config: PathBuf,
    /// Snapshot whose trials are replayed before ranking.
    #[arg(long)]
    pub snapshot: Option<PathBuf>,
    /// Number of candidates to print.
    #[arg(long, default_value_t = 5)]
    pub top: usize,
}

pub fn run(args: &DesignArgs) -> Result<(), Box<dyn Error>> {
    let config = load_config(&args.config)?;
    let procedure = match &args.snapshot {
        Some(path) => {
            let snapshot = SessionSnapshot::load(path)?;
            let mut procedure =
                Procedure::from_config(&config.procedure, snapshot.seed)?;
            procedure.replay(&snapshot.history);
            procedure
        }
        None => Procedure::from_config(&config.procedure, config.seed_policy.master_seed)?,
    };
    let Some(engine) = procedure.engine() else {
        return Err("design ranking requires a bayesian-ado procedure".into());
    };
    let candidates = engine.top_candidates(args.top)?;
    let payload = json!({
        "n_trials": procedure.history().len(),
        "entropy": engine.entropy(),
        "candidates": candidates,
    });
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
