use std::collections::BTreeMap;

use psy_core::{AdaptiveProcedure, PsyError, TrialHistory};
use serde::{Deserialize, Serialize};

use crate::config::ProcedureConfig;
use crate::engine::Engine;
use crate::staircase::HeuristicStaircase;

/// Which estimator produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProcedureKind {
    /// Grid-based Bayesian design optimization.
    BayesianAdo,
    /// Rolling-accuracy staircase.
    HeuristicStaircase,
}

/// Estimator-independent view of a session's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureReport {
    /// Estimator that produced the report.
    pub kind: ProcedureKind,
    /// Trials observed.
    pub n_trials: usize,
    /// Point estimate of the threshold.
    pub threshold_estimate: f64,
    /// Whether the estimator considers itself converged.
    pub converged: bool,
    /// Estimator-specific numbers (posterior means and SDs, or staircase state).
    pub estimates: BTreeMap<String, f64>,
}

/// An adaptive procedure selected at runtime.
#[derive(Debug)]
pub enum Procedure {
    /// Bayesian ADO engine.
    BayesianAdo(Box<Engine>),
    /// Heuristic staircase.
    HeuristicStaircase(HeuristicStaircase),
}

impl Procedure {
    /// Builds the configured procedure with all randomness derived from `seed`.
    pub fn from_config(config: &ProcedureConfig, seed: u64) -> Result<Self, PsyError> {
        Ok(match config {
            ProcedureConfig::BayesianAdo(engine) => {
                Procedure::BayesianAdo(Box::new(Engine::new(engine.clone(), seed)?))
            }
            ProcedureConfig::HeuristicStaircase(staircase) => {
                Procedure::HeuristicStaircase(HeuristicStaircase::new(staircase.clone(), seed)?)
            }
        })
    }

    /// Estimator kind.
    pub fn kind(&self) -> ProcedureKind {
        match self {
            Procedure::BayesianAdo(_) => ProcedureKind::BayesianAdo,
            Procedure::HeuristicStaircase(_) => ProcedureKind::HeuristicStaircase,
        }
    }

    /// The Bayesian engine, when this is one.
    pub fn engine(&self) -> Option<&Engine> {
        match self {
            Procedure::BayesianAdo(engine) => Some(&**engine),
            Procedure::HeuristicStaircase(_) => None,
        }
    }

    /// Estimator-specific numbers behind the threshold estimate.
    pub fn estimates(&self) -> BTreeMap<String, f64> {
        match self {
            Procedure::BayesianAdo(engine) => engine.estimates(),
            Procedure::HeuristicStaircase(staircase) => {
                let mut estimates = BTreeMap::new();
                estimates.insert("threshold".to_string(), staircase.estimate());
                estimates.insert(
                    "current_difficulty".to_string(),
                    staircase.current_difficulty(),
                );
                if let Some(accuracy) = staircase.recent_accuracy() {
                    estimates.insert("recent_accuracy".to_string(), accuracy);
                }
                estimates
            }
        }
    }

    /// Uniform progress report.
    pub fn report(&self) -> ProcedureReport {
        ProcedureReport {
            kind: self.kind(),
            n_trials: self.history().len(),
            threshold_estimate: self.threshold_estimate(),
            converged: self.is_converged(),
            estimates: self.estimates(),
        }
    }

    /// Re-applies a recorded history to a freshly built procedure.
    ///
    /// Every recorded trial is preceded by a selection so that random
    /// streams (engine fallback draws, staircase jitter) end in the same
    /// state as in the original session.
    pub fn replay(&mut self, history: &TrialHistory) {
        match self {
            Procedure::BayesianAdo(engine) => engine.replay(history),
            Procedure::HeuristicStaircase(staircase) => {
                for record in history.records() {
                    staircase.select();
                    staircase.update(record.stimulus, record.response);
                }
            }
        }
    }

    fn inner(&self) -> &dyn AdaptiveProcedure {
        match self {
            Procedure::BayesianAdo(engine) => &**engine,
            Procedure::HeuristicStaircase(staircase) => staircase,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn AdaptiveProcedure {
        match self {
            Procedure::BayesianAdo(engine) => &mut **engine,
            Procedure::HeuristicStaircase(staircase) => staircase,
        }
    }
}

impl AdaptiveProcedure for Procedure {
    fn next_stimulus(&mut self) -> f64 {
        self.inner_mut().next_stimulus()
    }

    fn record_response(&mut self, stimulus: f64, response: bool) {
        self.inner_mut().record_response(stimulus, response);
    }

    fn history(&self) -> &TrialHistory {
        self.inner().history()
    }

    fn threshold_estimate(&self) -> f64 {
        self.inner().threshold_estimate()
    }

    fn is_converged(&self) -> bool {
        self.inner().is_converged()
    }
}
