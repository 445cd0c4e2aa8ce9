use psy_core::{AdaptiveProcedure, PsyError, RngHandle};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::model::{Psychometric, PsychometricModel};
use crate::procedure::{Procedure, ProcedureReport};
use crate::records::TrialRow;

/// Trial budget and stopping rule of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPolicy {
    /// Trials to run in one call of [`run_session`].
    #[serde(default = "default_max_trials")]
    pub max_trials: usize,
    /// Stop as soon as the procedure reports convergence.
    #[serde(default)]
    pub early_stop: bool,
}

fn default_max_trials() -> usize {
    50
}

impl Default for SessionPolicy {
    fn default() -> Self {
        Self {
            max_trials: default_max_trials(),
            early_stop: false,
        }
    }
}

/// One response from an observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Binary response.
    pub response: bool,
    /// Response latency in seconds, when measured.
    pub reaction_time: Option<f64>,
}

/// Source of responses for presented stimuli.
pub trait Observer {
    /// Responds to `stimulus`.
    fn observe(&mut self, stimulus: f64) -> Observation;
}

/// Observer that answers according to a known psychometric function.
#[derive(Debug, Clone)]
pub struct SimulatedObserver {
    model: PsychometricModel,
    truth: Vec<f64>,
    rng: RngHandle,
}

impl SimulatedObserver {
    /// Observer with true parameters `truth` (model parameter order).
    pub fn new(model: PsychometricModel, truth: Vec<f64>, seed: u64) -> Result<Self, PsyError> {
        model.validate()?;
        // rejects a parameter vector of the wrong length up front
        model.probability(0.0, &truth)?;
        Ok(Self {
            model,
            truth,
            rng: RngHandle::from_seed(seed),
        })
    }

    /// True response probability at `stimulus`.
    pub fn probability(&self, stimulus: f64) -> f64 {
        self.model.probability(stimulus, &self.truth).unwrap_or(0.5)
    }

    /// True parameter vector.
    pub fn truth(&self) -> &[f64] {
        &self.truth
    }
}

impl Observer for SimulatedObserver {
    fn observe(&mut self, stimulus: f64) -> Observation {
        let p = self.probability(stimulus);
        Observation {
            response: self.rng.uniform() < p,
            reaction_time: None,
        }
    }
}

/// Outcome of [`run_session`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    /// One row per trial run in this call.
    pub rows: Vec<TrialRow>,
    /// Procedure state after the last trial.
    pub report: ProcedureReport,
    /// Whether the loop ended on convergence rather than the trial budget.
    pub stopped_early: bool,
}

/// Runs select → observe → update until the budget is spent, or until convergence with `early_stop`.
pub fn run_session(
    procedure: &mut Procedure,
    observer: &mut dyn Observer,
    policy: &SessionPolicy,
) -> SessionReport {
    let mut rows = Vec::with_capacity(policy.max_trials);
    let mut stopped_early = policy.early_stop && procedure.is_converged();
    while !stopped_early && rows.len() < policy.max_trials {
        let stimulus = procedure.next_stimulus();
        let observation = observer.observe(stimulus);
        procedure.record_response(stimulus, observation.response);
        let converged = procedure.is_converged();
        rows.push(TrialRow {
            trial_index: procedure.history().len() - 1,
            stimulus,
            response: observation.response,
            reaction_time: observation.reaction_time,
            estimates: procedure.estimates(),
            converged,
        });
        stopped_early = policy.early_stop && converged;
    }
    let report = procedure.report();
    info!(
        kind = ?report.kind,
        n_trials = report.n_trials,
        threshold = report.threshold_estimate,
        converged = report.converged,
        "session finished"
    );
    SessionReport {
        rows,
        report,
        stopped_early,
    }
}
