use std::collections::BTreeMap;

use psy_core::errors::ErrorInfo;
use psy_core::PsyError;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Stopping thresholds evaluated after every update.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvergenceCriteria {
    /// Trials required before convergence is considered at all.
    #[serde(default = "default_min_trials")]
    pub min_trials: usize,
    /// Posterior SD of the threshold below which the estimate is converged.
    #[serde(default = "default_threshold_sd_limit")]
    pub threshold_sd_limit: f64,
    /// Optional posterior SD limit on the slope.
    #[serde(default)]
    pub slope_sd_limit: Option<f64>,
}

fn default_min_trials() -> usize {
    15
}

fn default_threshold_sd_limit() -> f64 {
    5.0
}

impl Default for ConvergenceCriteria {
    fn default() -> Self {
        Self {
            min_trials: default_min_trials(),
            threshold_sd_limit: default_threshold_sd_limit(),
            slope_sd_limit: None,
        }
    }
}

impl ConvergenceCriteria {
    /// Criteria with the given minimum trial count and threshold SD limit.
    pub fn new(min_trials: usize, threshold_sd_limit: f64) -> Self {
        Self {
            min_trials,
            threshold_sd_limit,
            slope_sd_limit: None,
        }
    }

    /// Rejects non-positive or non-finite limits.
    pub fn validate(&self) -> Result<(), PsyError> {
        let limit_ok = |limit: f64| limit.is_finite() && limit > 0.0;
        if !limit_ok(self.threshold_sd_limit) || !self.slope_sd_limit.map_or(true, limit_ok) {
            return Err(PsyError::Config(
                ErrorInfo::new("convergence-limit", "SD limits must be finite and positive")
                    .with_context("threshold_sd_limit", self.threshold_sd_limit.to_string())
                    .with_context("slope_sd_limit", format!("{:?}", self.slope_sd_limit)),
            ));
        }
        Ok(())
    }
}

/// Convergence state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConvergenceState {
    /// Still gathering evidence.
    Learning,
    /// Criteria met; never reverts within a session.
    Converged,
}

/// One-way latch from [`ConvergenceState::Learning`] to [`ConvergenceState::Converged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceMonitor {
    state: ConvergenceState,
    converged_at: Option<usize>,
}

impl Default for ConvergenceMonitor {
    fn default() -> Self {
        Self {
            state: ConvergenceState::Learning,
            converged_at: None,
        }
    }
}

impl ConvergenceMonitor {
    /// Fresh monitor in the learning state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-evaluates the criteria and latches the converged state once reached.
    ///
    /// `estimates` uses the `<axis>_sd` keys produced by the engine.
    pub fn check(
        &mut self,
        n_trials: usize,
        estimates: &BTreeMap<String, f64>,
        criteria: &ConvergenceCriteria,
    ) -> ConvergenceState {
        if self.state == ConvergenceState::Learning && Self::evaluate(n_trials, estimates, criteria)
        {
            info!(
                n_trials,
                threshold_sd = estimates.get("threshold_sd").copied().unwrap_or(f64::NAN),
                "posterior converged"
            );
            self.state = ConvergenceState::Converged;
            self.converged_at = Some(n_trials);
        }
        self.state
    }

    /// Pure evaluation of the criteria; does not touch the latch.
    pub fn evaluate(
        n_trials: usize,
        estimates: &BTreeMap<String, f64>,
        criteria: &ConvergenceCriteria,
    ) -> bool {
        if n_trials < criteria.min_trials {
            return false;
        }
        let below = |key: &str, limit: f64| estimates.get(key).map_or(false, |&sd| sd < limit);
        below("threshold_sd", criteria.threshold_sd_limit)
            && criteria
                .slope_sd_limit
                .map_or(true, |limit| below("slope_sd", limit))
    }

    /// Current state.
    pub fn state(&self) -> ConvergenceState {
        self.state
    }

    /// Whether the latch has closed.
    pub fn is_converged(&self) -> bool {
        self.state == ConvergenceState::Converged
    }

    /// Trial count at which convergence was first reached.
    pub fn converged_at(&self) -> Option<usize> {
        self.converged_at
    }

    /// Returns the monitor to the learning state for a new session.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Snapshot of the session state reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    /// Trials observed so far.
    pub n_trials: usize,
    /// Whether the convergence criteria hold.
    pub converged: bool,
    /// Posterior mean of the threshold.
    pub threshold_mean: f64,
    /// Posterior SD of the threshold.
    pub threshold_sd: f64,
    /// Posterior mean of the slope.
    pub slope_mean: f64,
    /// Posterior SD of the slope.
    pub slope_sd: f64,
    /// Posterior entropy in nats.
    pub entropy: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spread(threshold_sd: f64, slope_sd: f64) -> BTreeMap<String, f64> {
        BTreeMap::from([
            ("threshold_sd".to_string(), threshold_sd),
            ("slope_sd".to_string(), slope_sd),
        ])
    }

    #[test]
    fn latch_never_reopens() {
        let criteria = ConvergenceCriteria::default();
        let mut monitor = ConvergenceMonitor::new();
        assert_eq!(
            monitor.check(20, &spread(1.0, 0.1), &criteria),
            ConvergenceState::Converged
        );
        assert_eq!(
            monitor.check(21, &spread(30.0, 0.1), &criteria),
            ConvergenceState::Converged
        );
        assert_eq!(monitor.converged_at(), Some(20));
    }

    #[test]
    fn slope_limit_is_optional() {
        let mut criteria = ConvergenceCriteria::new(5, 5.0);
        assert!(ConvergenceMonitor::evaluate(5, &spread(1.0, 2.0), &criteria));
        criteria.slope_sd_limit = Some(0.3);
        assert!(!ConvergenceMonitor::evaluate(5, &spread(1.0, 2.0), &criteria));
        assert!(ConvergenceMonitor::evaluate(5, &spread(1.0, 0.2), &criteria));
    }

    #[test]
    fn rejects_bad_limits() {
        assert!(ConvergenceCriteria::new(15, 0.0).validate().is_err());
        assert!(ConvergenceCriteria::new(15, f64::NAN).validate().is_err());
        assert!(ConvergenceCriteria::default().validate().is_ok());
    }
}
