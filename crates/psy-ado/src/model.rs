use std::fmt;

use ndarray::{ArrayD, Zip};
use psy_core::errors::ErrorInfo;
use psy_core::PsyError;
use serde::{Deserialize, Serialize};

use crate::grid::ParameterGrid;

/// Probabilities are clamped to `[EPSILON, 1 - EPSILON]` before any logarithm.
pub const EPSILON: f64 = 1e-10;

/// Axis name of the threshold (location) parameter.
pub const THRESHOLD: &str = "threshold";
/// Axis name of the slope (spread) parameter.
pub const SLOPE: &str = "slope";
/// Axis name of the guess rate (lower asymptote).
pub const GUESS_RATE: &str = "guess_rate";
/// Axis name of the lapse rate (1 - upper asymptote).
pub const LAPSE_RATE: &str = "lapse_rate";

const TWO_PARAMETERS: [&str; 2] = [THRESHOLD, SLOPE];
const FOUR_PARAMETERS: [&str; 4] = [THRESHOLD, SLOPE, GUESS_RATE, LAPSE_RATE];

/// Maps a stimulus and a parameter vector to the probability of a positive response.
///
/// `theta` and the grid axes follow the order of [`Psychometric::parameter_names`].
pub trait Psychometric: Send + Sync + fmt::Debug {
    /// Names of the free parameters, in grid axis order.
    fn parameter_names(&self) -> &'static [&'static str];

    /// Probability for a single parameter vector, clamped to `[EPSILON, 1 - EPSILON]`.
    fn probability(&self, stimulus: f64, theta: &[f64]) -> Result<f64, PsyError>;

    /// Probability for every cell of `grid`, as a tensor of the grid's shape.
    fn probability_grid(&self, stimulus: f64, grid: &ParameterGrid)
        -> Result<ArrayD<f64>, PsyError>;
}

/// Built-in psychometric function shapes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PsychometricModel {
    /// Two-parameter logistic with fixed asymptotes:
    /// `p = γ + (1-γ-λ) / (1 + exp(-(x-α)/β))`.
    Logistic {
        /// Fixed guess rate γ.
        #[serde(default)]
        guess_rate: f64,
        /// Fixed lapse rate λ.
        #[serde(default = "default_lapse_rate")]
        lapse_rate: f64,
    },
    /// Four-parameter Weibull: `p = γ + (1-γ-λ)·(1 - exp(-(x/α)^β))`.
    Weibull,
}

fn default_lapse_rate() -> f64 {
    0.02
}

impl Default for PsychometricModel {
    fn default() -> Self {
        PsychometricModel::Logistic {
            guess_rate: 0.0,
            lapse_rate: default_lapse_rate(),
        }
    }
}

impl PsychometricModel {
    /// Logistic model with the given fixed asymptotes.
    pub fn logistic(guess_rate: f64, lapse_rate: f64) -> Self {
        PsychometricModel::Logistic {
            guess_rate,
            lapse_rate,
        }
    }

    /// Short label used in reports.
    pub fn label(&self) -> &'static str {
        match self {
            PsychometricModel::Logistic { .. } => "logistic",
            PsychometricModel::Weibull => "weibull",
        }
    }

    /// Number of free parameters (2 or 4).
    pub fn parameter_count(&self) -> usize {
        self.parameter_names().len()
    }

    /// Checks the fixed asymptotes of the logistic variant.
    pub fn validate(&self) -> Result<(), PsyError> {
        if let PsychometricModel::Logistic {
            guess_rate,
            lapse_rate,
        } = *self
        {
            check_asymptotes(guess_rate, lapse_rate)?;
        }
        Ok(())
    }

    /// Checks that every grid cell is a valid parameter vector for this model.
    pub fn validate_grid(&self, grid: &ParameterGrid) -> Result<(), PsyError> {
        check_arity(self.parameter_names(), grid)?;
        let slope_min = grid.axes()[1].values()[0];
        if slope_min <= 0.0 {
            return Err(PsyError::Config(
                ErrorInfo::new("slope-non-positive", "slope axis must be strictly positive")
                    .with_context("min", slope_min.to_string()),
            ));
        }
        if let PsychometricModel::Weibull = self {
            let threshold_min = grid.axes()[0].values()[0];
            if threshold_min <= 0.0 {
                return Err(PsyError::Config(
                    ErrorInfo::new(
                        "threshold-non-positive",
                        "weibull threshold axis must be strictly positive",
                    )
                    .with_context("min", threshold_min.to_string()),
                ));
            }
            let guess = grid.axes()[2].values();
            let lapse = grid.axes()[3].values();
            if guess[0] < 0.0 || lapse[0] < 0.0 {
                return Err(PsyError::Config(ErrorInfo::new(
                    "asymptote-negative",
                    "guess and lapse axes must be non-negative",
                )));
            }
            let worst = guess[guess.len() - 1] + lapse[lapse.len() - 1];
            if worst >= 1.0 {
                return Err(PsyError::Config(
                    ErrorInfo::new("asymptote-sum", "guess + lapse must stay below 1")
                        .with_context("max_sum", worst.to_string()),
                ));
            }
        }
        Ok(())
    }

    /// Inverts the function: the stimulus at which the response probability equals `target`.
    ///
    /// Returns `None` when `target` lies outside the open interval between the asymptotes.
    pub fn stimulus_for_performance(&self, target: f64, theta: &[f64]) -> Option<f64> {
        let (alpha, beta, guess, lapse) = self.unpack(theta).ok()?;
        let span = 1.0 - guess - lapse;
        let scaled = (target - guess) / span;
        if !(scaled > 0.0 && scaled < 1.0) {
            return None;
        }
        let stimulus = match self {
            PsychometricModel::Logistic { .. } => alpha - beta * (1.0 / scaled - 1.0).ln(),
            PsychometricModel::Weibull => alpha * (-(1.0 - scaled).ln()).powf(1.0 / beta),
        };
        stimulus.is_finite().then_some(stimulus)
    }

    fn unpack(&self, theta: &[f64]) -> Result<(f64, f64, f64, f64), PsyError> {
        let names = self.parameter_names();
        if theta.len() != names.len() {
            return Err(PsyError::Model(
                ErrorInfo::new("theta-arity", "parameter vector has the wrong length")
                    .with_context("model", self.label())
                    .with_context("expected", names.len().to_string())
                    .with_context("actual", theta.len().to_string()),
            ));
        }
        Ok(match *self {
            PsychometricModel::Logistic {
                guess_rate,
                lapse_rate,
            } => (theta[0], theta[1], guess_rate, lapse_rate),
            PsychometricModel::Weibull => (theta[0], theta[1], theta[2], theta[3]),
        })
    }
}

impl Psychometric for PsychometricModel {
    fn parameter_names(&self) -> &'static [&'static str] {
        match self {
            PsychometricModel::Logistic { .. } => &TWO_PARAMETERS,
            PsychometricModel::Weibull => &FOUR_PARAMETERS,
        }
    }

    fn probability(&self, stimulus: f64, theta: &[f64]) -> Result<f64, PsyError> {
        let (alpha, beta, guess, lapse) = self.unpack(theta)?;
        Ok(match self {
            PsychometricModel::Logistic { .. } => logistic(stimulus, alpha, beta, guess, lapse),
            PsychometricModel::Weibull => weibull(stimulus, alpha, beta, guess, lapse),
        })
    }

    fn probability_grid(
        &self,
        stimulus: f64,
        grid: &ParameterGrid,
    ) -> Result<ArrayD<f64>, PsyError> {
        check_arity(self.parameter_names(), grid)?;
        let meshes = grid.meshes();
        Ok(match *self {
            PsychometricModel::Logistic {
                guess_rate,
                lapse_rate,
            } => Zip::from(&meshes[0])
                .and(&meshes[1])
                .map_collect(|&alpha, &beta| {
                    logistic(stimulus, alpha, beta, guess_rate, lapse_rate)
                }),
            PsychometricModel::Weibull => Zip::from(&meshes[0])
                .and(&meshes[1])
                .and(&meshes[2])
                .and(&meshes[3])
                .map_collect(|&alpha, &beta, &guess, &lapse| {
                    weibull(stimulus, alpha, beta, guess, lapse)
                }),
        })
    }
}

/// Evaluates `model` over `grid` and rejects tensors whose shape differs from the grid's.
pub fn evaluate_grid(
    model: &dyn Psychometric,
    stimulus: f64,
    grid: &ParameterGrid,
) -> Result<ArrayD<f64>, PsyError> {
    let tensor = model.probability_grid(stimulus, grid)?;
    if tensor.shape() != grid.shape() {
        return Err(PsyError::Model(
            ErrorInfo::new("likelihood-shape", "likelihood tensor does not match the grid shape")
                .with_context("expected", format!("{:?}", grid.shape()))
                .with_context("actual", format!("{:?}", tensor.shape())),
        ));
    }
    Ok(tensor)
}

/// Clamps a probability into `[EPSILON, 1 - EPSILON]`.
#[inline]
pub fn clamp_probability(p: f64) -> f64 {
    p.clamp(EPSILON, 1.0 - EPSILON)
}

#[inline]
fn logistic(x: f64, alpha: f64, beta: f64, guess: f64, lapse: f64) -> f64 {
    let core = 1.0 / (1.0 + (-(x - alpha) / beta).exp());
    clamp_probability(guess + (1.0 - guess - lapse) * core)
}

#[inline]
fn weibull(x: f64, alpha: f64, beta: f64, guess: f64, lapse: f64) -> f64 {
    let core = 1.0 - (-(x.max(0.0) / alpha).powf(beta)).exp();
    clamp_probability(guess + (1.0 - guess - lapse) * core)
}

fn check_asymptotes(guess: f64, lapse: f64) -> Result<(), PsyError> {
    let valid = (0.0..1.0).contains(&guess) && (0.0..1.0).contains(&lapse) && guess + lapse < 1.0;
    if valid {
        Ok(())
    } else {
        Err(PsyError::Config(
            ErrorInfo::new("asymptotes", "guess and lapse rates must lie in [0, 1) with sum < 1")
                .with_context("guess_rate", guess.to_string())
                .with_context("lapse_rate", lapse.to_string()),
        ))
    }
}

fn check_arity(names: &[&str], grid: &ParameterGrid) -> Result<(), PsyError> {
    let matches = grid.ndim() == names.len()
        && grid
            .axes()
            .iter()
            .zip(names.iter())
            .all(|(axis, name)| axis.name() == *name);
    if matches {
        Ok(())
    } else {
        let actual: Vec<&str> = grid.axes().iter().map(|axis| axis.name()).collect();
        Err(PsyError::Model(
            ErrorInfo::new("grid-arity", "grid axes do not match the model parameters")
                .with_context("expected", names.join(","))
                .with_context("actual", actual.join(",")),
        ))
    }
}
