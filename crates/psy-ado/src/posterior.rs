use std::sync::Arc;

use ndarray::{ArrayD, Axis, Zip};
use psy_core::errors::ErrorInfo;
use psy_core::PsyError;
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::grid::ParameterGrid;
use crate::model::{evaluate_grid, Psychometric, EPSILON};
use crate::prior::{joint_prior, Prior};

/// Posterior mean and standard deviation of one parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterEstimate {
    /// Posterior mean.
    pub mean: f64,
    /// Posterior standard deviation.
    pub sd: f64,
}

/// Equal-tailed credible interval from a parameter's marginal posterior.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CredibleInterval {
    /// Lower bound (grid value).
    pub lower: f64,
    /// Upper bound (grid value).
    pub upper: f64,
    /// Requested probability mass.
    pub mass: f64,
}

/// What happened to the posterior during an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOutcome {
    /// Likelihood applied and renormalized.
    Applied,
    /// Mass collapsed; the posterior was reset to the prior.
    ResetToPrior,
    /// The model failed; the posterior was left unchanged.
    Skipped,
}

/// Joint probability mass over the parameter grid.
#[derive(Debug, Clone)]
pub struct PosteriorStore {
    grid: Arc<ParameterGrid>,
    prior: ArrayD<f64>,
    posterior: ArrayD<f64>,
    resets: usize,
}

impl PosteriorStore {
    /// Builds the normalized prior from per-axis densities and starts the posterior there.
    pub fn new(grid: Arc<ParameterGrid>, priors: &[Prior]) -> Result<Self, PsyError> {
        let prior = joint_prior(&grid, priors)?;
        let posterior = prior.clone();
        Ok(Self {
            grid,
            prior,
            posterior,
            resets: 0,
        })
    }

    /// Resets the posterior to the prior. Calling it twice is the same as calling it once.
    pub fn initialize(&mut self) {
        self.posterior.assign(&self.prior);
    }

    /// Bayesian update with one binary observation.
    ///
    /// Never fails: a collapsed mass resets to the prior and a model failure
    /// leaves the posterior untouched.
    pub fn update(
        &mut self,
        model: &dyn Psychometric,
        stimulus: f64,
        response: bool,
    ) -> UpdateOutcome {
        let p_positive = match evaluate_grid(model, stimulus, &self.grid) {
            Ok(p) => p,
            Err(err) => {
                error!(%err, stimulus, "likelihood evaluation failed; posterior unchanged");
                return UpdateOutcome::Skipped;
            }
        };
        Zip::from(&mut self.posterior)
            .and(&p_positive)
            .for_each(|cell, &p| *cell *= if response { p } else { 1.0 - p });
        let total = self.posterior.sum();
        if total > 0.0 && total.is_finite() {
            self.posterior.mapv_inplace(|cell| cell / total);
            UpdateOutcome::Applied
        } else {
            warn!(
                total,
                stimulus, response, "posterior mass collapsed; resetting to prior"
            );
            self.resets += 1;
            self.initialize();
            UpdateOutcome::ResetToPrior
        }
    }

    /// The parameter grid the posterior lives on.
    pub fn grid(&self) -> &ParameterGrid {
        &self.grid
    }

    /// Current posterior tensor.
    pub fn probabilities(&self) -> &ArrayD<f64> {
        &self.posterior
    }

    /// Normalized prior tensor.
    pub fn prior(&self) -> &ArrayD<f64> {
        &self.prior
    }

    /// Number of times the posterior collapsed and was reset.
    pub fn reset_count(&self) -> usize {
        self.resets
    }

    /// Sum of the posterior mass (1.0 up to rounding).
    pub fn total_mass(&self) -> f64 {
        self.posterior.sum()
    }

    /// Shannon entropy `-Σ p·ln(p + ε)` in nats.
    pub fn entropy(&self) -> f64 {
        entropy(&self.posterior)
    }

    /// Posterior mean of the named parameter.
    pub fn mean(&self, axis: &str) -> Result<f64, PsyError> {
        Ok(self.estimate(axis)?.mean)
    }

    /// Posterior standard deviation of the named parameter.
    pub fn sd(&self, axis: &str) -> Result<f64, PsyError> {
        Ok(self.estimate(axis)?.sd)
    }

    /// Mean and standard deviation of the named parameter.
    pub fn estimate(&self, axis: &str) -> Result<ParameterEstimate, PsyError> {
        let index = self.grid.axis_index(axis)?;
        Ok(self.estimate_at(index))
    }

    /// Estimates of every axis, in grid order.
    pub fn estimates(&self) -> Vec<(&str, ParameterEstimate)> {
        self.grid
            .axes()
            .iter()
            .enumerate()
            .map(|(index, axis)| (axis.name(), self.estimate_at(index)))
            .collect()
    }

    fn estimate_at(&self, index: usize) -> ParameterEstimate {
        let mesh = self.grid.mesh(index);
        let mean = weighted_sum(&self.posterior, mesh, |value| value);
        let variance = weighted_sum(&self.posterior, mesh, |value| (value - mean).powi(2));
        ParameterEstimate {
            mean,
            sd: variance.max(0.0).sqrt(),
        }
    }

    /// Marginal posterior of one parameter, aligned with its axis values.
    pub fn marginal(&self, axis: &str) -> Result<Vec<f64>, PsyError> {
        let keep = self.grid.axis_index(axis)?;
        let mut reduced = self.posterior.clone();
        for index in (0..self.grid.ndim()).rev() {
            if index != keep {
                reduced = reduced.sum_axis(Axis(index));
            }
        }
        Ok(reduced.iter().copied().collect())
    }

    /// Equal-tailed credible interval holding `mass` of the marginal posterior.
    pub fn credible_interval(&self, axis: &str, mass: f64) -> Result<CredibleInterval, PsyError> {
        if !(mass > 0.0 && mass < 1.0) {
            return Err(PsyError::Config(
                ErrorInfo::new("interval-mass", "credible mass must lie in (0, 1)")
                    .with_context("mass", mass.to_string()),
            ));
        }
        let marginal = self.marginal(axis)?;
        let values = self.grid.axes()[self.grid.axis_index(axis)?].values();
        let tail = (1.0 - mass) / 2.0;
        let mut cumulative = 0.0;
        let mut lower = None;
        let mut upper = values[values.len() - 1];
        for (value, p) in values.iter().zip(&marginal) {
            cumulative += p;
            if lower.is_none() && cumulative >= tail {
                lower = Some(*value);
            }
            if cumulative >= 1.0 - tail {
                upper = *value;
                break;
            }
        }
        Ok(CredibleInterval {
            lower: lower.unwrap_or(values[0]),
            upper,
            mass,
        })
    }

    /// Posterior predictive probability of a positive response at `stimulus`.
    pub fn predictive(&self, model: &dyn Psychometric, stimulus: f64) -> Result<f64, PsyError> {
        let p_positive = evaluate_grid(model, stimulus, &self.grid)?;
        Ok(weighted_sum(&self.posterior, &p_positive, |p| p))
    }
}

/// Shannon entropy of a normalized tensor, `-Σ p·ln(p + ε)`.
pub fn entropy(probabilities: &ArrayD<f64>) -> f64 {
    -probabilities.fold(0.0, |acc, &p| acc + p * (p + EPSILON).ln())
}

fn weighted_sum(
    weights: &ArrayD<f64>,
    values: &ArrayD<f64>,
    transform: impl Fn(f64) -> f64,
) -> f64 {
    let mut total = 0.0;
    Zip::from(weights)
        .and(values)
        .for_each(|&w, &v| total += w * transform(v));
    total
}
