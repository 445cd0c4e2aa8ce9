use ndarray::{Array1, ArrayD, IxDyn};
use psy_core::errors::ErrorInfo;
use psy_core::PsyError;
use serde::{Deserialize, Serialize};

use crate::grid::{ParameterAxis, ParameterGrid};
use crate::model::{GUESS_RATE, LAPSE_RATE, SLOPE, THRESHOLD};

/// Analytic prior density for one parameter axis.
///
/// Densities are unnormalized: only the joint product over the grid is
/// normalized, so constant factors cancel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Prior {
    /// Flat prior over the axis.
    Uniform,
    /// Beta(a, b) over `support`, rescaled into `[0, 1]`. `support` defaults to the axis range.
    Beta {
        /// First shape parameter.
        a: f64,
        /// Second shape parameter.
        b: f64,
        /// Interval mapped onto `[0, 1]`.
        #[serde(default)]
        support: Option<(f64, f64)>,
    },
    /// Gamma(shape, scale) on the raw axis values.
    Gamma {
        /// Shape parameter k.
        shape: f64,
        /// Scale parameter θ.
        scale: f64,
    },
    /// Normal(mean, sd) on the raw axis values.
    Normal {
        /// Location.
        mean: f64,
        /// Standard deviation.
        sd: f64,
    },
}

impl Prior {
    /// Default prior for a well-known parameter name.
    ///
    /// Thresholds get a mild Beta(2, 2) preference for the middle of their
    /// range, slopes a Gamma(2, 1), and guess/lapse rates a Beta(1, 19) that
    /// favours small values.
    pub fn default_for(name: &str) -> Self {
        match name {
            THRESHOLD => Prior::Beta {
                a: 2.0,
                b: 2.0,
                support: None,
            },
            SLOPE => Prior::Gamma {
                shape: 2.0,
                scale: 1.0,
            },
            GUESS_RATE | LAPSE_RATE => Prior::Beta {
                a: 1.0,
                b: 19.0,
                support: Some((0.0, 1.0)),
            },
            _ => Prior::Uniform,
        }
    }

    /// Rejects non-positive shape/scale parameters.
    pub fn validate(&self, axis: &str) -> Result<(), PsyError> {
        let ok = match *self {
            Prior::Uniform => true,
            Prior::Beta { a, b, support } => {
                a > 0.0
                    && b > 0.0
                    && support.map_or(true, |(lo, hi)| lo.is_finite() && hi.is_finite() && lo < hi)
            }
            Prior::Gamma { shape, scale } => shape > 0.0 && scale > 0.0,
            Prior::Normal { mean, sd } => mean.is_finite() && sd > 0.0,
        };
        if ok {
            Ok(())
        } else {
            Err(PsyError::Config(
                ErrorInfo::new("prior-invalid", "prior parameters are out of range")
                    .with_context("axis", axis)
                    .with_context("prior", format!("{self:?}")),
            ))
        }
    }

    /// Unnormalized density at every point of `axis`.
    pub fn density(&self, axis: &ParameterAxis) -> Vec<f64> {
        let values = axis.values();
        let lo = values[0];
        let hi = values[values.len() - 1];
        values
            .iter()
            .map(|&x| self.density_at(x, lo, hi))
            .collect()
    }

    fn density_at(&self, x: f64, axis_lo: f64, axis_hi: f64) -> f64 {
        match *self {
            Prior::Uniform => 1.0,
            Prior::Beta { a, b, support } => {
                let (lo, hi) = support.unwrap_or((axis_lo, axis_hi));
                if hi <= lo {
                    return 1.0;
                }
                let u = (x - lo) / (hi - lo);
                if !(0.0..=1.0).contains(&u) {
                    return 0.0;
                }
                u.powf(a - 1.0) * (1.0 - u).powf(b - 1.0)
            }
            Prior::Gamma { shape, scale } => {
                if x < 0.0 {
                    0.0
                } else {
                    x.powf(shape - 1.0) * (-x / scale).exp()
                }
            }
            Prior::Normal { mean, sd } => {
                let z = (x - mean) / sd;
                (-0.5 * z * z).exp()
            }
        }
    }
}

/// Joint prior over `grid`: elementwise product of per-axis densities, normalized to 1.
pub fn joint_prior(grid: &ParameterGrid, priors: &[Prior]) -> Result<ArrayD<f64>, PsyError> {
    if priors.len() != grid.ndim() {
        return Err(PsyError::Config(
            ErrorInfo::new("prior-arity", "one prior is required per parameter axis")
                .with_context("axes", grid.ndim().to_string())
                .with_context("priors", priors.len().to_string()),
        ));
    }
    let mut joint = ArrayD::<f64>::ones(grid.shape());
    for (index, (axis, prior)) in grid.axes().iter().zip(priors).enumerate() {
        prior.validate(axis.name())?;
        let mut view_shape = vec![1usize; grid.ndim()];
        view_shape[index] = axis.len();
        let column = Array1::from_vec(prior.density(axis))
            .into_shape(IxDyn(&view_shape))
            .map_err(|err| {
                PsyError::Grid(
                    ErrorInfo::new("prior-broadcast", err.to_string())
                        .with_context("axis", axis.name()),
                )
            })?;
        joint *= &column;
    }
    let total = joint.sum();
    if !(total.is_finite() && total > 0.0) {
        return Err(PsyError::Config(
            ErrorInfo::new("prior-degenerate", "prior assigns no mass to the parameter grid")
                .with_context("total", total.to_string()),
        ));
    }
    joint.mapv_inplace(|cell| cell / total);
    Ok(joint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn beta_rescales_onto_axis_range() {
        let axis = ParameterAxis::linspace(THRESHOLD, 5.0, 95.0, 3).unwrap();
        let density = Prior::default_for(THRESHOLD).density(&axis);
        assert_eq!(density[0], 0.0);
        assert_eq!(density[2], 0.0);
        assert!((density[1] - 0.25).abs() < 1e-12);
    }

    #[test]
    fn guess_prior_favours_small_rates() {
        let axis = ParameterAxis::linspace(GUESS_RATE, 0.0, 0.1, 8).unwrap();
        let density = Prior::default_for(GUESS_RATE).density(&axis);
        assert!(density.windows(2).all(|pair| pair[0] > pair[1]));
    }

    #[test]
    fn joint_prior_is_normalized() {
        let grid = ParameterGrid::new(vec![
            ParameterAxis::linspace(THRESHOLD, 5.0, 95.0, 11).unwrap(),
            ParameterAxis::linspace(SLOPE, 0.1, 4.0, 7).unwrap(),
        ])
        .unwrap();
        let priors = vec![Prior::default_for(THRESHOLD), Prior::default_for(SLOPE)];
        let joint = joint_prior(&grid, &priors).unwrap();
        assert!((joint.sum() - 1.0).abs() < 1e-12);
        assert!(joint.iter().all(|&p| p >= 0.0));
    }

    #[test]
    fn degenerate_prior_is_rejected() {
        let grid =
            ParameterGrid::new(vec![ParameterAxis::new(SLOPE, vec![-2.0, -1.0]).unwrap()]).unwrap();
        let err = joint_prior(&grid, &[Prior::default_for(SLOPE)]).unwrap_err();
        assert_eq!(err.info().code, "prior-degenerate");
    }
}
