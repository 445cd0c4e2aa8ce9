use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use psy_core::errors::ErrorInfo;
use psy_core::PsyError;
use serde::{Deserialize, Serialize};

use crate::convergence::ConvergenceCriteria;
use crate::grid::{ParameterAxis, ParameterGrid};
use crate::model::{PsychometricModel, SLOPE, THRESHOLD};
use crate::prior::Prior;
use crate::selector::DesignSpec;
use crate::session::SessionPolicy;

/// Discretization and prior of one model parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisSpec {
    /// Lower bound of the grid (inclusive).
    pub min: f64,
    /// Upper bound of the grid (inclusive).
    pub max: f64,
    /// Number of evenly spaced grid points.
    #[serde(default = "default_points")]
    pub points: usize,
    /// Prior density; defaults by parameter name when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prior: Option<Prior>,
}

fn default_points() -> usize {
    21
}

impl AxisSpec {
    /// Axis over `[min, max]` with `points` values and the default prior.
    pub fn new(min: f64, max: f64, points: usize) -> Self {
        Self {
            min,
            max,
            points,
            prior: None,
        }
    }

    /// Replaces the prior.
    pub fn with_prior(mut self, prior: Prior) -> Self {
        self.prior = Some(prior);
        self
    }
}

/// Everything needed to build a Bayesian ADO engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Candidate stimuli.
    #[serde(default = "default_design")]
    pub design: DesignSpec,
    /// Psychometric function shape.
    #[serde(default)]
    pub model: PsychometricModel,
    /// Grid specification per parameter name. Every model parameter must appear.
    #[serde(default = "default_parameters")]
    pub parameters: IndexMap<String, AxisSpec>,
    /// Convergence thresholds.
    #[serde(default)]
    pub convergence: ConvergenceCriteria,
    /// Fixed stimuli presented before design optimization starts.
    #[serde(default)]
    pub warmup: Vec<f64>,
}

fn default_design() -> DesignSpec {
    DesignSpec::Range {
        start: 10.0,
        stop: 89.0,
        step: 1.0,
    }
}

fn default_parameters() -> IndexMap<String, AxisSpec> {
    let mut parameters = IndexMap::new();
    parameters.insert(THRESHOLD.to_string(), AxisSpec::new(5.0, 95.0, 31));
    parameters.insert(SLOPE.to_string(), AxisSpec::new(0.05, 5.0, 21));
    parameters
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            design: default_design(),
            model: PsychometricModel::default(),
            parameters: default_parameters(),
            convergence: ConvergenceCriteria::default(),
            warmup: Vec::new(),
        }
    }
}

impl EngineConfig {
    /// Config from an explicit design and `(name, min, max, points)` per parameter.
    ///
    /// Each axis carries its own resolution, so nuisance parameters such as the
    /// guess and lapse rates can be sampled more coarsely than the threshold.
    pub fn from_ranges(
        design: Vec<f64>,
        ranges: &[(&str, f64, f64, usize)],
        model: PsychometricModel,
    ) -> Self {
        let parameters = ranges
            .iter()
            .map(|&(name, min, max, points)| (name.to_string(), AxisSpec::new(min, max, points)))
            .collect();
        Self {
            design: DesignSpec::Values(design),
            model,
            parameters,
            convergence: ConvergenceCriteria::default(),
            warmup: Vec::new(),
        }
    }

    /// Replaces the convergence criteria.
    pub fn with_convergence(mut self, convergence: ConvergenceCriteria) -> Self {
        self.convergence = convergence;
        self
    }

    /// Replaces the warm-up stimuli.
    pub fn with_warmup(mut self, warmup: Vec<f64>) -> Self {
        self.warmup = warmup;
        self
    }

    /// Checks the parts of the config that do not depend on the grid.
    pub fn validate(&self) -> Result<(), PsyError> {
        self.convergence.validate()?;
        if let Some(pos) = self.warmup.iter().position(|value| !value.is_finite()) {
            return Err(PsyError::Config(
                ErrorInfo::new("warmup-non-finite", "warm-up stimuli must be finite")
                    .with_context("index", pos.to_string()),
            ));
        }
        Ok(())
    }

    /// Builds the grid and per-axis priors in the order given by `names`.
    pub fn build_grid(&self, names: &[&str]) -> Result<(ParameterGrid, Vec<Prior>), PsyError> {
        if let Some(extra) = self
            .parameters
            .keys()
            .find(|key| !names.contains(&key.as_str()))
        {
            return Err(PsyError::Config(
                ErrorInfo::new("parameter-unknown", "parameter is not used by the model")
                    .with_context("parameter", extra.clone())
                    .with_context("expected", names.join(",")),
            ));
        }
        let mut axes = Vec::with_capacity(names.len());
        let mut priors = Vec::with_capacity(names.len());
        for &name in names {
            let spec = self.parameters.get(name).ok_or_else(|| {
                PsyError::Config(
                    ErrorInfo::new("parameter-missing", "model parameter has no grid specification")
                        .with_context("parameter", name)
                        .with_hint("add an entry under `parameters` with min, max and points"),
                )
            })?;
            axes.push(ParameterAxis::linspace(name, spec.min, spec.max, spec.points)?);
            priors.push(
                spec.prior
                    .clone()
                    .unwrap_or_else(|| Prior::default_for(name)),
            );
        }
        Ok((ParameterGrid::new(axes)?, priors))
    }
}

/// Settings of the rolling-accuracy staircase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaircaseConfig {
    /// Difficulty used once the initial sequence is exhausted.
    #[serde(default = "default_initial_difficulty")]
    pub initial_difficulty: f64,
    /// Lower clamp for the difficulty.
    #[serde(default = "default_min_difficulty")]
    pub min_difficulty: f64,
    /// Upper clamp for the difficulty.
    #[serde(default = "default_max_difficulty")]
    pub max_difficulty: f64,
    /// Accuracy the staircase converges towards.
    #[serde(default = "default_target_accuracy")]
    pub target_accuracy: f64,
    /// Number of recent trials in the accuracy window.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Stimuli presented verbatim on the first trials.
    #[serde(default = "default_initial_stimuli")]
    pub initial_stimuli: Vec<f64>,
    /// SD of the last stimuli below which the staircase is converged.
    #[serde(default = "default_convergence_sd")]
    pub convergence_sd: f64,
}

fn default_initial_difficulty() -> f64 {
    0.2
}

fn default_min_difficulty() -> f64 {
    0.01
}

fn default_max_difficulty() -> f64 {
    0.8
}

fn default_target_accuracy() -> f64 {
    0.75
}

fn default_window() -> usize {
    5
}

fn default_initial_stimuli() -> Vec<f64> {
    vec![0.3, 0.15, 0.1]
}

fn default_convergence_sd() -> f64 {
    0.02
}

impl Default for StaircaseConfig {
    fn default() -> Self {
        Self {
            initial_difficulty: default_initial_difficulty(),
            min_difficulty: default_min_difficulty(),
            max_difficulty: default_max_difficulty(),
            target_accuracy: default_target_accuracy(),
            window: default_window(),
            initial_stimuli: default_initial_stimuli(),
            convergence_sd: default_convergence_sd(),
        }
    }
}

impl StaircaseConfig {
    /// Rejects inverted bounds, empty windows and targets outside `(0, 1)`.
    pub fn validate(&self) -> Result<(), PsyError> {
        let bounds_ok = self.min_difficulty.is_finite()
            && self.max_difficulty.is_finite()
            && self.min_difficulty > 0.0
            && self.min_difficulty < self.max_difficulty;
        if !bounds_ok {
            return Err(PsyError::Config(
                ErrorInfo::new("staircase-bounds", "difficulty bounds require 0 < min < max")
                    .with_context("min", self.min_difficulty.to_string())
                    .with_context("max", self.max_difficulty.to_string()),
            ));
        }
        if self.window == 0 || !(self.target_accuracy > 0.0 && self.target_accuracy < 1.0) {
            return Err(PsyError::Config(
                ErrorInfo::new("staircase-target", "window must be positive and target in (0, 1)")
                    .with_context("window", self.window.to_string())
                    .with_context("target", self.target_accuracy.to_string()),
            ));
        }
        let finite = self.initial_difficulty.is_finite()
            && self.convergence_sd.is_finite()
            && self.initial_stimuli.iter().all(|value| value.is_finite());
        if !finite || self.convergence_sd <= 0.0 {
            return Err(PsyError::config(
                "staircase-values",
                "staircase stimuli and convergence SD must be finite (SD positive)",
            ));
        }
        Ok(())
    }
}

/// Which adaptive procedure a session runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ProcedureConfig {
    /// Grid-based Bayesian design optimization.
    BayesianAdo(EngineConfig),
    /// Rolling-accuracy staircase.
    HeuristicStaircase(StaircaseConfig),
}

impl Default for ProcedureConfig {
    fn default() -> Self {
        ProcedureConfig::BayesianAdo(EngineConfig::default())
    }
}

/// Simulated participant used by the session runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserverConfig {
    /// Psychometric function generating the responses.
    #[serde(default)]
    pub model: PsychometricModel,
    /// True parameter vector, in the model's parameter order.
    #[serde(default = "default_truth")]
    pub truth: Vec<f64>,
}

fn default_truth() -> Vec<f64> {
    vec![50.0, 5.0]
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            model: PsychometricModel::default(),
            truth: default_truth(),
        }
    }
}

/// Deterministic seeding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedPolicy {
    /// Master seed for every random stream of the session.
    #[serde(default = "default_master_seed")]
    pub master_seed: u64,
    /// Optional session or participant label recorded in provenance.
    #[serde(default)]
    pub label: Option<String>,
}

fn default_master_seed() -> u64 {
    0x05EE_D5EE_DD15_5EED_u64
}

impl Default for SeedPolicy {
    fn default() -> Self {
        Self {
            master_seed: default_master_seed(),
            label: None,
        }
    }
}

/// Top-level YAML document for a simulated session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Adaptive procedure and its settings.
    #[serde(default)]
    pub procedure: ProcedureConfig,
    /// Trial budget and stopping policy.
    #[serde(default)]
    pub session: SessionPolicy,
    /// Simulated observer.
    #[serde(default)]
    pub observer: ObserverConfig,
    /// Master seed and label.
    #[serde(default)]
    pub seed_policy: SeedPolicy,
}

impl ExperimentConfig {
    /// Parses a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, PsyError> {
        serde_yaml::from_str(contents).map_err(|err| {
            PsyError::Serde(ErrorInfo::new("config-parse", err.to_string()))
        })
    }

    /// Reads and parses a YAML file.
    pub fn load(path: &Path) -> Result<Self, PsyError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            PsyError::Serde(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        Self::from_yaml_str(&contents)
    }

    /// Serializes the config back to YAML.
    pub fn to_yaml_string(&self) -> Result<String, PsyError> {
        serde_yaml::to_string(self)
            .map_err(|err| PsyError::Serde(ErrorInfo::new("config-serialize", err.to_string())))
    }
}
