use psy_core::trial::rate;
use psy_core::{AdaptiveProcedure, PsyError, RngHandle, TrialHistory};
use rand::Rng;
use tracing::debug;

use crate::config::StaircaseConfig;
use crate::determinism::jitter_seed;

const BAND: f64 = 0.1;
const HARDER: f64 = 0.8;
const EASIER: f64 = 1.3;
const NUDGE_HARDER: f64 = 0.95;
const NUDGE_EASIER: f64 = 1.05;
const JITTER: (f64, f64) = (0.9, 1.1);
const ESTIMATE_MIN_TRIALS: usize = 5;
const ESTIMATE_WINDOW: usize = 10;
const CONVERGENCE_MIN_TRIALS: usize = 10;
const CONVERGENCE_WINDOW: usize = 5;

/// Rolling-accuracy staircase over a single scalar difficulty.
///
/// Smaller stimuli are harder. After the initial sequence the difficulty is
/// scaled towards the target accuracy, jittered, and clamped to the bounds.
#[derive(Debug, Clone)]
pub struct HeuristicStaircase {
    config: StaircaseConfig,
    current: f64,
    history: TrialHistory,
    rng: RngHandle,
}

impl HeuristicStaircase {
    /// Validates the config and seeds the jitter stream from `seed`.
    pub fn new(config: StaircaseConfig, seed: u64) -> Result<Self, PsyError> {
        config.validate()?;
        Ok(Self {
            current: config.initial_difficulty,
            config,
            history: TrialHistory::new(),
            rng: RngHandle::from_seed(jitter_seed(seed)),
        })
    }

    /// Next stimulus. Advances the difficulty once the initial sequence is exhausted.
    pub fn select(&mut self) -> f64 {
        let trial = self.history.len();
        if let Some(&stimulus) = self.config.initial_stimuli.get(trial) {
            return stimulus;
        }
        let Some(accuracy) = self.recent_accuracy() else {
            return self.current;
        };
        let target = self.config.target_accuracy;
        let factor = if accuracy > target + BAND {
            HARDER
        } else if accuracy < target - BAND {
            EASIER
        } else if accuracy > target {
            NUDGE_HARDER
        } else {
            NUDGE_EASIER
        };
        let jitter = self.rng.inner_mut().gen_range(JITTER.0..=JITTER.1);
        let next = self.clamp(self.clamp(self.current * factor) * jitter);
        debug!(trial, accuracy, factor, jitter, difficulty = next, "staircase step");
        self.current = next;
        next
    }

    /// Records the observed response for `stimulus`.
    pub fn update(&mut self, stimulus: f64, response: bool) {
        self.history.append(stimulus, response);
    }

    /// Accuracy over the rolling window, `None` before the first trial.
    pub fn recent_accuracy(&self) -> Option<f64> {
        rate(self.history.last_n(self.config.window))
    }

    /// Difficulty reached by the last adaptive step.
    pub fn current_difficulty(&self) -> f64 {
        self.current
    }

    /// Mean of the last ten stimuli once five trials exist, otherwise the current difficulty.
    pub fn estimate(&self) -> f64 {
        if self.history.len() < ESTIMATE_MIN_TRIALS {
            return self.current;
        }
        let recent = self.history.last_n(ESTIMATE_WINDOW);
        recent.iter().map(|record| record.stimulus).sum::<f64>() / recent.len() as f64
    }

    /// Converged once ten trials exist and the last five stimuli have population SD below the limit.
    pub fn converged(&self) -> bool {
        if self.history.len() < CONVERGENCE_MIN_TRIALS {
            return false;
        }
        let recent = self.history.last_n(CONVERGENCE_WINDOW);
        let n = recent.len() as f64;
        let mean = recent.iter().map(|record| record.stimulus).sum::<f64>() / n;
        let variance = recent
            .iter()
            .map(|record| (record.stimulus - mean).powi(2))
            .sum::<f64>()
            / n;
        variance.sqrt() < self.config.convergence_sd
    }

    /// Configuration the staircase was built from.
    pub fn config(&self) -> &StaircaseConfig {
        &self.config
    }

    fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.config.min_difficulty, self.config.max_difficulty)
    }
}

impl AdaptiveProcedure for HeuristicStaircase {
    fn next_stimulus(&mut self) -> f64 {
        self.select()
    }

    fn record_response(&mut self, stimulus: f64, response: bool) {
        self.update(stimulus, response);
    }

    fn history(&self) -> &TrialHistory {
        &self.history
    }

    fn threshold_estimate(&self) -> f64 {
        self.estimate()
    }

    fn is_converged(&self) -> bool {
        self.converged()
    }
}
