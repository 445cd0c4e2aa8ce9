use std::sync::Arc;

use ndarray::ArrayD;
use proptest::prelude::*;
use psy_core::errors::ErrorInfo;
use psy_core::PsyError;

use psy_ado::model::{SLOPE, THRESHOLD};
use psy_ado::{
    EngineConfig, ParameterGrid, PosteriorStore, Psychometric, PsychometricModel, UpdateOutcome,
};

fn store() -> PosteriorStore {
    let config = EngineConfig::default();
    let (grid, priors) = config.build_grid(&[THRESHOLD, SLOPE]).unwrap();
    PosteriorStore::new(Arc::new(grid), &priors).unwrap()
}

/// Likelihood that is exactly zero everywhere, so a positive response kills all mass.
#[derive(Debug)]
struct NeverResponds;

impl Psychometric for NeverResponds {
    fn parameter_names(&self) -> &'static [&'static str] {
        &[THRESHOLD, SLOPE]
    }

    fn probability(&self, _stimulus: f64, _theta: &[f64]) -> Result<f64, PsyError> {
        Ok(0.0)
    }

    fn probability_grid(
        &self,
        _stimulus: f64,
        grid: &ParameterGrid,
    ) -> Result<ArrayD<f64>, PsyError> {
        Ok(ArrayD::zeros(grid.shape()))
    }
}

#[derive(Debug)]
struct Broken;

impl Psychometric for Broken {
    fn parameter_names(&self) -> &'static [&'static str] {
        &[THRESHOLD, SLOPE]
    }

    fn probability(&self, _stimulus: f64, _theta: &[f64]) -> Result<f64, PsyError> {
        Err(PsyError::Model(ErrorInfo::new("broken", "always fails")))
    }

    fn probability_grid(
        &self,
        _stimulus: f64,
        _grid: &ParameterGrid,
    ) -> Result<ArrayD<f64>, PsyError> {
        Err(PsyError::Model(ErrorInfo::new("broken", "always fails")))
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn posterior_stays_normalized(
        trials in prop::collection::vec((0.0f64..100.0, any::<bool>()), 1..60)
    ) {
        let model = PsychometricModel::default();
        let mut posterior = store();
        for (stimulus, response) in trials {
            posterior.update(&model, stimulus, response);
            prop_assert!((posterior.total_mass() - 1.0).abs() < 1e-6);
            prop_assert!(posterior.probabilities().iter().all(|&p| p >= 0.0 && p.is_finite()));
        }
    }
}

#[test]
fn initialize_is_idempotent() {
    let model = PsychometricModel::default();
    let mut posterior = store();
    posterior.update(&model, 40.0, true);
    posterior.initialize();
    let once = posterior.probabilities().clone();
    posterior.initialize();
    assert_eq!(&once, posterior.probabilities());
    assert_eq!(&once, posterior.prior());
}

#[test]
fn collapsed_mass_resets_to_prior() {
    let mut posterior = store();
    posterior.update(&PsychometricModel::default(), 60.0, true);
    let outcome = posterior.update(&NeverResponds, 50.0, true);
    assert_eq!(outcome, UpdateOutcome::ResetToPrior);
    assert_eq!(posterior.probabilities(), posterior.prior());
    assert_eq!(posterior.reset_count(), 1);
}

#[test]
fn model_failure_leaves_posterior_untouched() {
    let mut posterior = store();
    posterior.update(&PsychometricModel::default(), 30.0, false);
    let before = posterior.probabilities().clone();
    assert_eq!(posterior.update(&Broken, 30.0, true), UpdateOutcome::Skipped);
    assert_eq!(&before, posterior.probabilities());
}

#[test]
fn unknown_axis_is_a_grid_error() {
    let posterior = store();
    let err = posterior.mean("lapse_rate").unwrap_err();
    assert!(matches!(err, PsyError::Grid(_)));
}

#[test]
fn marginals_sum_to_one_and_intervals_bracket_the_mean() {
    let model = PsychometricModel::default();
    let mut posterior = store();
    for (stimulus, response) in [(30.0, false), (70.0, true), (50.0, true), (45.0, false)] {
        posterior.update(&model, stimulus, response);
    }
    let marginal = posterior.marginal(THRESHOLD).unwrap();
    assert_eq!(marginal.len(), 31);
    assert!((marginal.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    let mean = posterior.mean(THRESHOLD).unwrap();
    let interval = posterior.credible_interval(THRESHOLD, 0.95).unwrap();
    assert!(interval.lower <= mean && mean <= interval.upper);
    assert!(posterior.credible_interval(THRESHOLD, 1.5).is_err());
}

#[test]
fn predictive_increases_with_stimulus() {
    let model = PsychometricModel::default();
    let posterior = store();
    let low = posterior.predictive(&model, 10.0).unwrap();
    let mid = posterior.predictive(&model, 50.0).unwrap();
    let high = posterior.predictive(&model, 90.0).unwrap();
    assert!(low < mid && mid < high);
}

#[test]
fn evidence_sharpens_the_threshold() {
    let model = PsychometricModel::default();
    let truth = [50.0, 1.5];
    let design: Vec<f64> = (10..=90).step_by(5).map(f64::from).collect();

    let run = |trials: usize| {
        let mut posterior = store();
        for i in 0..trials {
            let stimulus = design[i % design.len()];
            // deterministic responses from the true curve
            let p = model.probability(stimulus, &truth).unwrap();
            posterior.update(&model, stimulus, p >= 0.5);
        }
        posterior.sd(THRESHOLD).unwrap()
    };

    assert!(run(200) < run(10));
}
