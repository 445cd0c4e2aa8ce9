use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use psy_ado::determinism::observer_seed;
use psy_ado::{run_session, Procedure, SimulatedObserver};
use tracing::info;

use crate::{load_config, write_session_artefacts};

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// YAML experiment configuration.
    #[arg(long)]
    pub config: PathBuf,
    /// Output directory for session artefacts.
    #[arg(long)]
    pub out: PathBuf,
    /// Overrides `seed_policy.master_seed`.
    #[arg(long)]
    pub seed: Option<u64>,
}

pub fn run(args: &SimulateArgs) -> Result<(), Box<dyn Error>> {
    let mut config = load_config(&args.config)?;
    if let Some(seed) = args.seed {
        config.seed_policy.master_seed = seed;
    }
    let seed = config.seed_policy.master_seed;
    let mut procedure = Procedure::from_config(&config.procedure, seed)?;
    let mut observer = SimulatedObserver::new(
        config.observer.model,
        config.observer.truth.clone(),
        observer_seed(seed, 0),
    )?;
    info!(seed, max_trials = config.session.max_trials, "simulation started");
    let report = run_session(&mut procedure, &mut observer, &config.session);
    write_session_artefacts(&args.out, &config, seed, &procedure, &report)?;
    Ok(())
}
