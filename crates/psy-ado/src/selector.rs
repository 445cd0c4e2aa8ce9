use ndarray::{ArrayD, Zip};
use psy_core::errors::ErrorInfo;
use psy_core::PsyError;
use serde::{Deserialize, Serialize};

use crate::model::{clamp_probability, evaluate_grid, Psychometric, EPSILON};
use crate::posterior::PosteriorStore;

/// How the candidate stimuli are declared in configuration.
///
/// In YAML either a plain list (`[10, 20, 30]`) or a map with
/// `start`/`stop`/`step`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DesignSpec {
    /// Explicit list of candidate stimuli.
    Values(Vec<f64>),
    /// Evenly stepped candidates from `start` to `stop`, both inclusive.
    Range {
        /// First candidate.
        start: f64,
        /// Last candidate (included when reached by whole steps).
        stop: f64,
        /// Spacing between candidates.
        step: f64,
    },
}

impl DesignSpec {
    /// Expands the declaration into a validated design space.
    pub fn build(&self) -> Result<DesignSpace, PsyError> {
        match self {
            DesignSpec::Values(values) => DesignSpace::new(values.clone()),
            DesignSpec::Range { start, stop, step } => DesignSpace::range(*start, *stop, *step),
        }
    }
}

/// Ordered, immutable set of candidate stimuli.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DesignSpace {
    candidates: Vec<f64>,
}

impl DesignSpace {
    /// Builds the space from explicit candidates. Must be non-empty and finite.
    pub fn new(candidates: Vec<f64>) -> Result<Self, PsyError> {
        if candidates.is_empty() {
            return Err(PsyError::config(
                "design-empty",
                "design space requires at least one candidate",
            ));
        }
        if let Some(pos) = candidates.iter().position(|value| !value.is_finite()) {
            return Err(PsyError::Config(
                ErrorInfo::new("design-non-finite", "design space contains a non-finite candidate")
                    .with_context("index", pos.to_string()),
            ));
        }
        Ok(Self { candidates })
    }

    /// Inclusive stepped range, e.g. `range(10, 89, 1)` yields 80 candidates.
    pub fn range(start: f64, stop: f64, step: f64) -> Result<Self, PsyError> {
        if !(start.is_finite() && stop.is_finite() && step.is_finite()) || step <= 0.0 || stop < start
        {
            return Err(PsyError::Config(
                ErrorInfo::new("design-range", "design range requires finite start <= stop and step > 0")
                    .with_context("start", start.to_string())
                    .with_context("stop", stop.to_string())
                    .with_context("step", step.to_string()),
            ));
        }
        // tolerance keeps `stop` when (stop - start) / step is whole up to rounding
        let count = ((stop - start) / step + 1e-9).floor() as usize + 1;
        Self::new((0..count).map(|i| start + step * i as f64).collect())
    }

    /// Candidates in declaration order.
    pub fn candidates(&self) -> &[f64] {
        &self.candidates
    }

    /// Number of candidates.
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Always false: constructors reject empty spaces.
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Candidate at `index`.
    pub fn get(&self, index: usize) -> Option<f64> {
        self.candidates.get(index).copied()
    }

    /// The candidate equal to `value` up to floating-point rounding.
    pub fn find(&self, value: f64) -> Option<f64> {
        let tolerance = 1e-9 * value.abs().max(1.0);
        self.candidates
            .iter()
            .copied()
            .find(|candidate| (candidate - value).abs() <= tolerance)
    }
}

/// Result of a design selection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    /// Index into the design space.
    pub index: usize,
    /// Selected stimulus.
    pub stimulus: f64,
    /// Expected information gain (nats).
    pub utility: f64,
}

/// Mutual-information design selector over a fixed design space.
#[derive(Debug, Clone)]
pub struct DesignSelector {
    design: DesignSpace,
}

impl DesignSelector {
    /// Creates a selector for the given candidates.
    pub fn new(design: DesignSpace) -> Self {
        Self { design }
    }

    /// Candidate stimuli.
    pub fn design(&self) -> &DesignSpace {
        &self.design
    }

    /// Expected information gain of every candidate, in design order.
    pub fn utilities(
        &self,
        posterior: &PosteriorStore,
        model: &dyn Psychometric,
    ) -> Result<Vec<f64>, PsyError> {
        let prior_entropy = posterior.entropy();
        self.design
            .candidates()
            .iter()
            .map(|&stimulus| gain(posterior, model, stimulus, prior_entropy))
            .collect()
    }

    /// Expected information gain of a single stimulus, which need not be a candidate.
    pub fn information_gain(
        &self,
        posterior: &PosteriorStore,
        model: &dyn Psychometric,
        stimulus: f64,
    ) -> Result<f64, PsyError> {
        gain(posterior, model, stimulus, posterior.entropy())
    }

    /// Candidate with the highest utility; ties go to the earliest candidate.
    pub fn select(
        &self,
        posterior: &PosteriorStore,
        model: &dyn Psychometric,
    ) -> Result<Selection, PsyError> {
        let utilities = self.utilities(posterior, model)?;
        let index = argmax_first(&utilities).ok_or_else(|| {
            PsyError::Selector(ErrorInfo::new("selector-empty", "no utilities to rank"))
        })?;
        Ok(Selection {
            index,
            stimulus: self.design.candidates()[index],
            utility: utilities[index],
        })
    }

    /// The `k` best candidates, by decreasing utility then by design order.
    pub fn top_candidates(
        &self,
        posterior: &PosteriorStore,
        model: &dyn Psychometric,
        k: usize,
    ) -> Result<Vec<Selection>, PsyError> {
        let utilities = self.utilities(posterior, model)?;
        let mut ranked: Vec<Selection> = utilities
            .iter()
            .enumerate()
            .map(|(index, &utility)| Selection {
                index,
                stimulus: self.design.candidates()[index],
                utility,
            })
            .collect();
        // stable sort keeps design order among equal utilities
        ranked.sort_by(|a, b| b.utility.total_cmp(&a.utility));
        ranked.truncate(k);
        Ok(ranked)
    }
}

/// Index of the first maximum. A later value replaces the incumbent only when strictly greater.
pub fn argmax_first(values: &[f64]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, &value) in values.iter().enumerate() {
        match best {
            Some((_, incumbent)) if value <= incumbent => {}
            _ => best = Some((index, value)),
        }
    }
    best.map(|(index, _)| index)
}

fn gain(
    posterior: &PosteriorStore,
    model: &dyn Psychometric,
    stimulus: f64,
    prior_entropy: f64,
) -> Result<f64, PsyError> {
    let weights = posterior.probabilities();
    let p_positive = evaluate_grid(model, stimulus, posterior.grid())?;
    let mut marginal = 0.0;
    Zip::from(weights)
        .and(&p_positive)
        .for_each(|&w, &p| marginal += w * p);
    let marginal_positive = clamp_probability(marginal);
    let marginal_negative = clamp_probability(1.0 - marginal_positive);

    let h_positive = conditional_entropy(weights, &p_positive, true);
    let h_negative = conditional_entropy(weights, &p_positive, false);
    let expected = marginal_positive * h_positive + marginal_negative * h_negative;
    let utility = prior_entropy - expected;
    if utility.is_finite() {
        Ok(utility)
    } else {
        Err(PsyError::Numeric(
            ErrorInfo::new("utility-non-finite", "information gain is not finite")
                .with_context("stimulus", stimulus.to_string())
                .with_context("utility", utility.to_string()),
        ))
    }
}

/// Entropy of the posterior conditioned on a hypothetical response.
///
/// A hypothetical posterior with mass at or below `EPSILON` contributes zero.
fn conditional_entropy(weights: &ArrayD<f64>, p_positive: &ArrayD<f64>, response: bool) -> f64 {
    let likelihood = |p: f64| if response { p } else { 1.0 - p };
    let mut mass = 0.0;
    Zip::from(weights)
        .and(p_positive)
        .for_each(|&w, &p| mass += w * likelihood(p));
    if mass <= EPSILON {
        return 0.0;
    }
    let mut entropy = 0.0;
    Zip::from(weights).and(p_positive).for_each(|&w, &p| {
        let q = w * likelihood(p) / mass;
        entropy -= q * (q + EPSILON).ln();
    });
    entropy
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_includes_stop() {
        let design = DesignSpace::range(10.0, 89.0, 1.0).unwrap();
        assert_eq!(design.len(), 80);
        assert_eq!(design.candidates()[79], 89.0);
        let coarse = DesignSpace::range(10.0, 90.0, 10.0).unwrap();
        assert_eq!(coarse.candidates(), &[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0]);
    }

    #[test]
    fn invalid_design_is_config_error() {
        assert_eq!(
            DesignSpace::new(vec![]).unwrap_err().info().code,
            "design-empty"
        );
        assert_eq!(
            DesignSpace::new(vec![1.0, f64::NAN]).unwrap_err().info().code,
            "design-non-finite"
        );
        assert!(DesignSpace::range(5.0, 1.0, 1.0).is_err());
        assert!(DesignSpace::range(0.0, 1.0, 0.0).is_err());
    }

    #[test]
    fn find_matches_candidates_up_to_rounding() {
        let design = DesignSpace::range(0.05, 0.6, 0.05).unwrap();
        assert_eq!(design.find(0.15), Some(design.candidates()[2]));
        assert_eq!(design.find(0.3), Some(0.3));
        assert_eq!(design.find(0.32), None);
    }

    #[test]
    fn argmax_keeps_first_of_equal_values() {
        assert_eq!(argmax_first(&[0.1, 0.3, 0.3, 0.2]), Some(1));
        assert_eq!(argmax_first(&[0.5, 0.5, 0.5]), Some(0));
        assert_eq!(argmax_first(&[]), None);
    }
}
