use ndarray::{Array1, ArrayD, IxDyn};
use psy_core::errors::ErrorInfo;
use psy_core::PsyError;
use serde::Serialize;

/// One discretized axis of the parameter space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParameterAxis {
    name: String,
    values: Vec<f64>,
}

impl ParameterAxis {
    /// Builds an axis from explicit values, which must be finite and strictly increasing.
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Result<Self, PsyError> {
        let name = name.into();
        if values.is_empty() {
            return Err(PsyError::Grid(
                ErrorInfo::new("axis-empty", "parameter axis has no points")
                    .with_context("axis", name),
            ));
        }
        if let Some(pos) = values.iter().position(|value| !value.is_finite()) {
            return Err(PsyError::Grid(
                ErrorInfo::new("axis-non-finite", "parameter axis contains a non-finite value")
                    .with_context("axis", name)
                    .with_context("index", pos.to_string()),
            ));
        }
        if let Some(pos) = values.windows(2).position(|pair| pair[1] <= pair[0]) {
            return Err(PsyError::Grid(
                ErrorInfo::new("axis-not-increasing", "parameter axis must be strictly increasing")
                    .with_context("axis", name)
                    .with_context("index", (pos + 1).to_string()),
            ));
        }
        Ok(Self { name, values })
    }

    /// Evenly spaced axis over `[min, max]` with `points` values (inclusive).
    pub fn linspace(
        name: impl Into<String>,
        min: f64,
        max: f64,
        points: usize,
    ) -> Result<Self, PsyError> {
        let name = name.into();
        if !min.is_finite() || !max.is_finite() || min >= max {
            return Err(PsyError::Config(
                ErrorInfo::new("range-bounds", "parameter range requires finite min < max")
                    .with_context("axis", name)
                    .with_context("min", min.to_string())
                    .with_context("max", max.to_string()),
            ));
        }
        if points < 2 {
            return Err(PsyError::Config(
                ErrorInfo::new("range-resolution", "parameter range needs at least two points")
                    .with_context("axis", name)
                    .with_context("points", points.to_string()),
            ));
        }
        let step = (max - min) / (points - 1) as f64;
        let mut values: Vec<f64> = (0..points).map(|i| min + step * i as f64).collect();
        // pin the last point so rounding never overshoots the range
        values[points - 1] = max;
        Self::new(name, values)
    }

    /// Axis name (e.g. `threshold`).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Grid values along the axis.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Number of points on the axis.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Always false: constructors reject empty axes.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Cartesian product of parameter axes, stored as dense broadcast meshes.
///
/// `mesh(i)` holds the value of axis `i` at every cell of the grid, so any
/// per-cell computation is a single element-wise pass over tensors of shape
/// `(N1, .., Nk)`.
#[derive(Debug, Clone)]
pub struct ParameterGrid {
    axes: Vec<ParameterAxis>,
    shape: Vec<usize>,
    meshes: Vec<ArrayD<f64>>,
}

impl ParameterGrid {
    /// Builds the grid from ordered axes. Axis names must be unique.
    pub fn new(axes: Vec<ParameterAxis>) -> Result<Self, PsyError> {
        if axes.is_empty() {
            return Err(PsyError::Grid(ErrorInfo::new(
                "grid-empty",
                "parameter grid requires at least one axis",
            )));
        }
        for (idx, axis) in axes.iter().enumerate() {
            if axes[..idx].iter().any(|other| other.name == axis.name) {
                return Err(PsyError::Grid(
                    ErrorInfo::new("axis-duplicate", "parameter axis declared twice")
                        .with_context("axis", axis.name.clone()),
                ));
            }
        }
        let shape: Vec<usize> = axes.iter().map(ParameterAxis::len).collect();
        let mut meshes = Vec::with_capacity(axes.len());
        for (idx, axis) in axes.iter().enumerate() {
            meshes.push(broadcast_axis(axis, idx, &shape)?);
        }
        Ok(Self {
            axes,
            shape,
            meshes,
        })
    }

    /// Ordered axes of the grid.
    pub fn axes(&self) -> &[ParameterAxis] {
        &self.axes
    }

    /// Tensor shape `(N1, .., Nk)`.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of axes.
    pub fn ndim(&self) -> usize {
        self.axes.len()
    }

    /// Total number of grid cells.
    pub fn cell_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Position of the named axis.
    pub fn axis_index(&self, name: &str) -> Result<usize, PsyError> {
        self.axes
            .iter()
            .position(|axis| axis.name == name)
            .ok_or_else(|| {
                PsyError::Grid(
                    ErrorInfo::new("axis-unknown", "no parameter axis with this name")
                        .with_context("axis", name),
                )
            })
    }

    /// Broadcast mesh for axis `index`.
    pub fn mesh(&self, index: usize) -> &ArrayD<f64> {
        &self.meshes[index]
    }

    /// Broadcast mesh for the named axis.
    pub fn mesh_by_name(&self, name: &str) -> Result<&ArrayD<f64>, PsyError> {
        Ok(&self.meshes[self.axis_index(name)?])
    }

    /// All meshes in axis order.
    pub fn meshes(&self) -> &[ArrayD<f64>] {
        &self.meshes
    }
}

fn broadcast_axis(
    axis: &ParameterAxis,
    index: usize,
    shape: &[usize],
) -> Result<ArrayD<f64>, PsyError> {
    let mut view_shape = vec![1usize; shape.len()];
    view_shape[index] = axis.len();
    let column = Array1::from_vec(axis.values.clone())
        .into_shape(IxDyn(&view_shape))
        .map_err(|err| mesh_error(axis, err.to_string()))?;
    let mesh = column
        .broadcast(IxDyn(shape))
        .ok_or_else(|| mesh_error(axis, "axis cannot be broadcast to grid shape".into()))?
        .to_owned();
    Ok(mesh)
}

fn mesh_error(axis: &ParameterAxis, message: String) -> PsyError {
    PsyError::Grid(ErrorInfo::new("mesh-build", message).with_context("axis", axis.name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linspace_hits_both_bounds() {
        let axis = ParameterAxis::linspace("threshold", 5.0, 99.0, 48).unwrap();
        assert_eq!(axis.values()[0], 5.0);
        assert_eq!(*axis.values().last().unwrap(), 99.0);
        assert_eq!(axis.len(), 48);
    }

    #[test]
    fn rejects_non_increasing_axis() {
        let err = ParameterAxis::new("slope", vec![1.0, 1.0, 2.0]).unwrap_err();
        assert_eq!(err.info().code, "axis-not-increasing");
        let err = ParameterAxis::linspace("slope", 2.0, 1.0, 4).unwrap_err();
        assert_eq!(err.info().code, "range-bounds");
    }

    #[test]
    fn meshes_follow_axis_values() {
        let grid = ParameterGrid::new(vec![
            ParameterAxis::new("a", vec![1.0, 2.0, 3.0]).unwrap(),
            ParameterAxis::new("b", vec![10.0, 20.0]).unwrap(),
        ])
        .unwrap();
        assert_eq!(grid.shape(), &[3, 2]);
        assert_eq!(grid.cell_count(), 6);
        assert_eq!(grid.mesh(0)[&[2usize, 1][..]], 3.0);
        assert_eq!(grid.mesh(1)[&[2usize, 1][..]], 20.0);
        assert_eq!(grid.mesh(1)[&[0usize, 0][..]], 10.0);
        assert!(grid.axis_index("c").is_err());
    }
}
