use std::collections::BTreeMap;
use std::sync::Arc;

use psy_core::errors::ErrorInfo;
use psy_core::{AdaptiveProcedure, PsyError, RngHandle, TrialHistory};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::convergence::{ConvergenceCriteria, ConvergenceMonitor, ConvergenceState, Summary};
use crate::determinism::fallback_seed;
use crate::model::{Psychometric, PsychometricModel, SLOPE, THRESHOLD};
use crate::posterior::{CredibleInterval, PosteriorStore, UpdateOutcome};
use crate::prefetch::{PendingSelection, SelectionTask};
use crate::selector::{DesignSelector, DesignSpace, Selection};

/// Sequential Bayesian design optimization over a fixed parameter grid.
///
/// Single-threaded: every mutating call takes `&mut self`. Selection and
/// update never fail once the engine is built; degraded paths are logged.
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    seed: u64,
    model: Arc<dyn Psychometric>,
    builtin: Option<PsychometricModel>,
    posterior: PosteriorStore,
    selector: DesignSelector,
    monitor: ConvergenceMonitor,
    history: TrialHistory,
    warmup: Vec<f64>,
    fallback_rng: RngHandle,
    fallbacks: usize,
}

impl Engine {
    /// Builds an engine for the configured built-in model.
    pub fn new(config: EngineConfig, seed: u64) -> Result<Self, PsyError> {
        let model = config.model;
        model.validate()?;
        let engine = Self::build(config, Arc::new(model), Some(model), seed)?;
        model.validate_grid(engine.posterior.grid())?;
        Ok(engine)
    }

    /// Builds an engine around a caller-supplied model; `config.model` is ignored.
    pub fn with_model(
        config: EngineConfig,
        model: Arc<dyn Psychometric>,
        seed: u64,
    ) -> Result<Self, PsyError> {
        Self::build(config, model, None, seed)
    }

    fn build(
        config: EngineConfig,
        model: Arc<dyn Psychometric>,
        builtin: Option<PsychometricModel>,
        seed: u64,
    ) -> Result<Self, PsyError> {
        config.validate()?;
        let design = config.design.build()?;
        let warmup = warmup_candidates(&config.warmup, &design)?;
        let (grid, priors) = config.build_grid(model.parameter_names())?;
        let posterior = PosteriorStore::new(Arc::new(grid), &priors)?;
        info!(
            model = ?model,
            cells = posterior.grid().cell_count(),
            candidates = design.len(),
            seed,
            "engine initialized"
        );
        Ok(Self {
            config,
            seed,
            model,
            builtin,
            posterior,
            selector: DesignSelector::new(design),
            monitor: ConvergenceMonitor::new(),
            history: TrialHistory::new(),
            warmup,
            fallback_rng: RngHandle::from_seed(fallback_seed(seed)),
            fallbacks: 0,
        })
    }

    /// Next stimulus: a warm-up value while any remain, else the most informative candidate.
    ///
    /// A selector failure is logged and replaced by a uniform draw from the design space.
    pub fn select(&mut self) -> f64 {
        if let Some(stimulus) = self.warmup_stimulus() {
            debug!(trial = self.history.len(), stimulus, "warm-up stimulus");
            return stimulus;
        }
        match self.selector.select(&self.posterior, self.model.as_ref()) {
            Ok(selection) => {
                debug!(
                    trial = self.history.len(),
                    stimulus = selection.stimulus,
                    utility = selection.utility,
                    "design selected"
                );
                selection.stimulus
            }
            Err(err) => self.fallback(&err),
        }
    }

    /// Incorporates one observation: posterior update, history append, convergence check.
    pub fn update(&mut self, stimulus: f64, response: bool) -> UpdateOutcome {
        let outcome = self
            .posterior
            .update(self.model.as_ref(), stimulus, response);
        let record = self.history.append(stimulus, response);
        let estimates = self.estimates();
        let state = self
            .monitor
            .check(self.history.len(), &estimates, &self.config.convergence);
        debug!(
            trial = record.trial_index,
            stimulus,
            response,
            ?outcome,
            ?state,
            "trial recorded"
        );
        outcome
    }

    /// Posterior mean and SD of every parameter, keyed `<axis>_mean` / `<axis>_sd`.
    pub fn estimates(&self) -> BTreeMap<String, f64> {
        let mut estimates = BTreeMap::new();
        for (name, estimate) in self.posterior.estimates() {
            estimates.insert(format!("{name}_mean"), estimate.mean);
            estimates.insert(format!("{name}_sd"), estimate.sd);
        }
        estimates
    }

    /// Posterior entropy in nats.
    pub fn entropy(&self) -> f64 {
        self.posterior.entropy()
    }

    /// Session summary using the latched convergence state.
    pub fn summary(&self) -> Summary {
        self.summarize(self.monitor.is_converged())
    }

    /// Session summary evaluated against ad-hoc criteria. Does not touch the latch.
    pub fn summary_with(&self, min_trials: usize, sd_limit: f64) -> Summary {
        let criteria = ConvergenceCriteria::new(min_trials, sd_limit);
        let converged =
            ConvergenceMonitor::evaluate(self.history.len(), &self.estimates(), &criteria);
        self.summarize(converged)
    }

    fn summarize(&self, converged: bool) -> Summary {
        let estimates = self.estimates();
        let read = |key: String| estimates.get(&key).copied().unwrap_or(f64::NAN);
        Summary {
            n_trials: self.history.len(),
            converged,
            threshold_mean: read(format!("{THRESHOLD}_mean")),
            threshold_sd: read(format!("{THRESHOLD}_sd")),
            slope_mean: read(format!("{SLOPE}_mean")),
            slope_sd: read(format!("{SLOPE}_sd")),
            entropy: self.entropy(),
        }
    }

    /// Equal-tailed credible interval of every parameter.
    pub fn credible_intervals(
        &self,
        mass: f64,
    ) -> Result<BTreeMap<String, CredibleInterval>, PsyError> {
        self.posterior
            .grid()
            .axes()
            .iter()
            .map(|axis| {
                let interval = self.posterior.credible_interval(axis.name(), mass)?;
                Ok((axis.name().to_string(), interval))
            })
            .collect()
    }

    /// Posterior predictive probability of a positive response at each stimulus.
    pub fn predict(&self, stimuli: &[f64]) -> Result<Vec<f64>, PsyError> {
        stimuli
            .iter()
            .map(|&stimulus| self.posterior.predictive(self.model.as_ref(), stimulus))
            .collect()
    }

    /// Stimulus at which the posterior-mean psychometric function reaches `performance`.
    ///
    /// `None` for custom models or when `performance` is outside the asymptotes.
    pub fn threshold_at(&self, performance: f64) -> Option<f64> {
        let model = self.builtin?;
        let theta: Vec<f64> = self
            .posterior
            .estimates()
            .into_iter()
            .map(|(_, estimate)| estimate.mean)
            .collect();
        model.stimulus_for_performance(performance, &theta)
    }

    /// Ranked candidates with their expected information gain.
    pub fn top_candidates(&self, k: usize) -> Result<Vec<Selection>, PsyError> {
        self.selector
            .top_candidates(&self.posterior, self.model.as_ref(), k)
    }

    /// Re-applies a recorded history, re-running each selection before its update.
    ///
    /// The posterior ends identical to the original session's and the fallback
    /// stream advances by the same number of draws, so a resumed session
    /// continues exactly as an uninterrupted one would.
    pub fn replay(&mut self, history: &TrialHistory) {
        for record in history.records() {
            self.select();
            self.update(record.stimulus, record.response);
        }
    }

    /// Starts a new session: prior posterior, empty history, fresh fallback stream.
    pub fn reset(&mut self) {
        self.posterior.initialize();
        self.history.clear();
        self.monitor.reset();
        self.fallback_rng = RngHandle::from_seed(fallback_seed(self.seed));
        self.fallbacks = 0;
        info!(seed = self.seed, "engine reset");
    }

    /// Snapshots the posterior and computes the next design on a worker thread.
    pub fn begin_select(&self) -> PendingSelection {
        SelectionTask::new(
            self.posterior.clone(),
            self.selector.clone(),
            Arc::clone(&self.model),
        )
        .spawn(self.history.len())
    }

    /// Collects a background selection.
    ///
    /// Warm-up stimuli take precedence. A task started before the latest
    /// update, or one that failed, is discarded in favour of [`Engine::select`].
    pub fn finish_select(&mut self, pending: PendingSelection) -> f64 {
        if self.warmup_stimulus().is_some() {
            return self.select();
        }
        if pending.trial_index() != self.history.len() {
            debug!(
                started_at = pending.trial_index(),
                trial = self.history.len(),
                "stale background selection discarded"
            );
            return self.select();
        }
        match pending.join() {
            Ok(selection) => selection.stimulus,
            Err(err) => {
                warn!(%err, "background selection failed; selecting synchronously");
                self.select()
            }
        }
    }

    fn warmup_stimulus(&self) -> Option<f64> {
        self.warmup.get(self.history.len()).copied()
    }

    fn fallback(&mut self, err: &PsyError) -> f64 {
        self.fallbacks += 1;
        let candidates = self.selector.design().candidates();
        let index = self.fallback_rng.index(candidates.len()).unwrap_or(0);
        let stimulus = candidates[index];
        error!(%err, stimulus, fallbacks = self.fallbacks, "design selection failed; using random candidate");
        stimulus
    }

    /// Times the selector failed and a random candidate was used.
    pub fn fallback_count(&self) -> usize {
        self.fallbacks
    }

    /// Latched convergence state.
    pub fn convergence_state(&self) -> ConvergenceState {
        self.monitor.state()
    }

    /// Chronological trial log.
    pub fn history(&self) -> &TrialHistory {
        &self.history
    }

    /// Posterior store, for diagnostics.
    pub fn posterior(&self) -> &PosteriorStore {
        &self.posterior
    }

    /// Candidate stimuli.
    pub fn design(&self) -> &DesignSpace {
        self.selector.design()
    }

    /// Configuration the engine was built from.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Master seed.
    pub fn seed(&self) -> u64 {
        self.seed
    }
}

/// Maps each warm-up value onto the design candidate it names.
fn warmup_candidates(warmup: &[f64], design: &DesignSpace) -> Result<Vec<f64>, PsyError> {
    warmup
        .iter()
        .enumerate()
        .map(|(index, &value)| {
            design.find(value).ok_or_else(|| {
                PsyError::Config(
                    ErrorInfo::new("warmup-off-design", "warm-up stimulus is not a design candidate")
                        .with_context("index", index.to_string())
                        .with_context("stimulus", value.to_string())
                        .with_hint("warm-up values must be drawn from the design space"),
                )
            })
        })
        .collect()
}

impl AdaptiveProcedure for Engine {
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
        self.posterior
            .mean(THRESHOLD)
            .unwrap_or_else(|_| {
                self.posterior
                    .estimates()
                    .first()
                    .map_or(f64::NAN, |(_, estimate)| estimate.mean)
            })
    }

    fn is_converged(&self) -> bool {
        self.monitor.is_converged()
    }
}
