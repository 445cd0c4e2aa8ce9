use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use psy_ado::determinism::observer_seed;
use psy_ado::{run_session, SessionPolicy, SessionSnapshot, SimulatedObserver};
use psy_core::AdaptiveProcedure;
use tracing::info;

use crate::write_session_artefacts;

#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Snapshot written by `psy-sim simulate` or a previous resume.
    #[arg(long)]
    pub snapshot: PathBuf,
    /// Output directory for the continued session.
    #[arg(long)]
    pub out: PathBuf,
    /// Additional trials to run.
    #[arg(long)]
    pub trials: usize,
}

pub fn run(args: &ResumeArgs) -> Result<(), Box<dyn Error>> {
    let snapshot = SessionSnapshot::load(&args.snapshot)?;
    let mut procedure = snapshot.restore()?;
    let offset = procedure.history().len();
    let observer_config = &snapshot.config.observer;
    let mut observer = SimulatedObserver::new(
        observer_config.model,
        observer_config.truth.clone(),
        observer_seed(snapshot.seed, offset),
    )?;
    let policy = SessionPolicy {
        max_trials: args.trials,
        ..snapshot.config.session
    };
    info!(offset, trials = args.trials, "resuming session");
    let report = run_session(&mut procedure, &mut observer, &policy);
    write_session_artefacts(
        &args.out,
        &snapshot.config,
        snapshot.seed,
        &procedure,
        &report,
    )?;
    Ok(())
}
