use std::sync::Arc;

use ndarray::ArrayD;
use psy_core::PsyError;

use psy_ado::model::{SLOPE, THRESHOLD};
use psy_ado::{
    DesignSelector, DesignSpace, EngineConfig, ParameterGrid, PosteriorStore, Psychometric,
    PsychometricModel,
};

fn store() -> PosteriorStore {
    let config = EngineConfig::default();
    let (grid, priors) = config.build_grid(&[THRESHOLD, SLOPE]).unwrap();
    PosteriorStore::new(Arc::new(grid), &priors).unwrap()
}

/// Response probability independent of stimulus and parameters.
#[derive(Debug)]
struct Flat;

impl Psychometric for Flat {
    fn parameter_names(&self) -> &'static [&'static str] {
        &[THRESHOLD, SLOPE]
    }

    fn probability(&self, _stimulus: f64, _theta: &[f64]) -> Result<f64, PsyError> {
        Ok(0.5)
    }

    fn probability_grid(
        &self,
        _stimulus: f64,
        grid: &ParameterGrid,
    ) -> Result<ArrayD<f64>, PsyError> {
        Ok(ArrayD::from_elem(grid.shape(), 0.5))
    }
}

/// Produces NaN likelihoods.
#[derive(Debug)]
struct NotANumber;

impl Psychometric for NotANumber {
    fn parameter_names(&self) -> &'static [&'static str] {
        &[THRESHOLD, SLOPE]
    }

    fn probability(&self, _stimulus: f64, _theta: &[f64]) -> Result<f64, PsyError> {
        Ok(f64::NAN)
    }

    fn probability_grid(
        &self,
        _stimulus: f64,
        grid: &ParameterGrid,
    ) -> Result<ArrayD<f64>, PsyError> {
        Ok(ArrayD::from_elem(grid.shape(), f64::NAN))
    }
}

#[test]
fn information_gain_is_non_negative() {
    let model = PsychometricModel::default();
    let mut posterior = store();
    let selector = DesignSelector::new(DesignSpace::range(10.0, 89.0, 1.0).unwrap());
    for (stimulus, response) in [(0.0, false), (50.0, true), (40.0, false), (60.0, true)] {
        let utilities = selector.utilities(&posterior, &model).unwrap();
        assert_eq!(utilities.len(), 80);
        assert!(utilities.iter().all(|&u| u >= -1e-9));
        posterior.update(&model, stimulus, response);
    }
}

#[test]
fn uninformative_model_selects_first_candidate() {
    let posterior = store();
    let selector = DesignSelector::new(DesignSpace::new(vec![70.0, 20.0, 45.0]).unwrap());
    let selection = selector.select(&posterior, &Flat).unwrap();
    assert_eq!(selection.index, 0);
    assert_eq!(selection.stimulus, 70.0);
    assert!(selection.utility.abs() < 1e-9);
}

#[test]
fn prior_selection_avoids_the_design_edges() {
    let model = PsychometricModel::default();
    let posterior = store();
    let selector = DesignSelector::new(DesignSpace::range(10.0, 90.0, 10.0).unwrap());
    let selection = selector.select(&posterior, &model).unwrap();
    assert!(selection.stimulus > 10.0 && selection.stimulus < 90.0);
    let single = selector
        .information_gain(&posterior, &model, selection.stimulus)
        .unwrap();
    assert!((single - selection.utility).abs() < 1e-12);
}

#[test]
fn top_candidates_are_ranked() {
    let model = PsychometricModel::default();
    let posterior = store();
    let selector = DesignSelector::new(DesignSpace::range(10.0, 90.0, 10.0).unwrap());
    let top = selector.top_candidates(&posterior, &model, 3).unwrap();
    assert_eq!(top.len(), 3);
    assert!(top.windows(2).all(|pair| pair[0].utility >= pair[1].utility));
    assert_eq!(top[0], selector.select(&posterior, &model).unwrap());
}

#[test]
fn non_finite_utility_is_a_numeric_error() {
    let posterior = store();
    let selector = DesignSelector::new(DesignSpace::new(vec![1.0, 2.0]).unwrap());
    let err = selector.select(&posterior, &NotANumber).unwrap_err();
    assert!(matches!(err, PsyError::Numeric(_)));
}
