//! Component-wise interpolation of multi-valued samples.
//!
//! A rotation matrix is reconstructed by fitting one scalar interpolator per
//! cell. All cells share one normalized time domain, so every cell is
//! evaluated at the identical abscissa. The result is not re-orthonormalized.

use steadystack_common::error::{StackError, StackResult};
use steadystack_sample_model::{Attitude, RotationMatrix, TimedSample};

use crate::spline::{CubicSpline, LinearInterpolator, Point2, ScalarInterpolator};

/// A value made of independently interpolated scalar components.
pub trait Components: Copy {
    /// Number of scalar components.
    const COUNT: usize;

    /// Component `index` in `0..COUNT`.
    fn component(&self, index: usize) -> f64;

    /// Rebuild a value from exactly `COUNT` components.
    fn from_components(values: &[f64]) -> Self;
}

impl Components for f64 {
    const COUNT: usize = 1;

    fn component(&self, _index: usize) -> f64 {
        *self
    }

    fn from_components(values: &[f64]) -> Self {
        values[0]
    }
}

impl Components for RotationMatrix {
    const COUNT: usize = 9;

    fn component(&self, index: usize) -> f64 {
        self.0[index]
    }

    fn from_components(values: &[f64]) -> Self {
        let mut cells = [0.0; 9];
        cells.copy_from_slice(&values[..9]);
        RotationMatrix(cells)
    }
}

impl Components for Attitude {
    const COUNT: usize = 3;

    fn component(&self, index: usize) -> f64 {
        match index {
            0 => self.pitch,
            1 => self.roll,
            _ => self.yaw,
        }
    }

    fn from_components(values: &[f64]) -> Self {
        Attitude::new(values[0], values[1], values[2])
    }
}

/// Affine map from capture time to the normalized abscissa
/// `x = (time - offset) / diff`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalization {
    pub offset: f64,
    pub diff: f64,
}

impl Normalization {
    /// Map `[start, end]` onto `[0, 1]`.
    ///
    /// A zero-length (or invalid) span yields `offset = 0, diff = 1`.
    pub fn from_span(start: f64, end: f64) -> Self {
        let diff = end - start;
        if diff > 0.0 && diff.is_finite() {
            Self {
                offset: start,
                diff,
            }
        } else {
            Self::identity()
        }
    }

    pub fn identity() -> Self {
        Self {
            offset: 0.0,
            diff: 1.0,
        }
    }

    pub fn normalize(&self, time: f64) -> f64 {
        (time - self.offset) / self.diff
    }

}

#[derive(Debug, Clone)]
enum Cells<T, I> {
    /// Single-instant window: every query returns the first sample.
    Constant(T),
    Fitted(Vec<I>),
}

/// One scalar interpolator per component over a shared time domain.
#[derive(Debug, Clone)]
pub struct ComponentInterpolator<T, I> {
    normalization: Normalization,
    cells: Cells<T, I>,
}

/// Nine cell interpolators reconstructing a rotation matrix.
pub type MatrixInterpolator<I = CubicSpline> = ComponentInterpolator<RotationMatrix, I>;

/// Pitch/roll/yaw interpolation.
pub type AttitudeInterpolator<I = LinearInterpolator> = ComponentInterpolator<Attitude, I>;

impl<T: Components, I: ScalarInterpolator> ComponentInterpolator<T, I> {
    /// Fit over `samples`, which must be in non-decreasing time order.
    ///
    /// Runs of equal timestamps contribute only their first sample.
    pub fn fit(samples: &[TimedSample<T>]) -> StackResult<Self> {
        let (first, last) = match (samples.first(), samples.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(StackError::InsufficientSamples {
                    needed: I::MIN_POINTS,
                    available: 0,
                    time: f64::NAN,
                })
            }
        };

        let normalization = Normalization::from_span(first.time, last.time);
        if last.time <= first.time {
            return Ok(Self {
                normalization,
                cells: Cells::Constant(first.value),
            });
        }

        let mut distinct: Vec<&TimedSample<T>> = Vec::with_capacity(samples.len());
        for sample in samples {
            if distinct.last().map_or(true, |kept| kept.time != sample.time) {
                distinct.push(sample);
            }
        }

        if distinct.len() < I::MIN_POINTS {
            return Err(StackError::InsufficientSamples {
                needed: I::MIN_POINTS,
                available: distinct.len(),
                time: first.time,
            });
        }

        let xs: Vec<f64> = distinct
            .iter()
            .map(|s| normalization.normalize(s.time))
            .collect();

        let cells = (0..T::COUNT)
            .map(|component| {
                let points: Vec<Point2> = distinct
                    .iter()
                    .zip(&xs)
                    .map(|(s, &x)| Point2::new(x, s.value.component(component)))
                    .collect();
                I::fit(&points)
            })
            .collect::<StackResult<Vec<I>>>()?;

        Ok(Self {
            normalization,
            cells: Cells::Fitted(cells),
        })
    }

    /// Shared time normalization.
    pub fn normalization(&self) -> Normalization {
        self.normalization
    }

    /// Whether the window collapsed to a single instant.
    pub fn is_constant(&self) -> bool {
        matches!(self.cells, Cells::Constant(_))
    }

    /// Estimate the value at capture time `time`.
    pub fn interpolate(&self, time: f64) -> T {
        match &self.cells {
            Cells::Constant(value) => *value,
            Cells::Fitted(cells) => {
                let x = self.normalization.normalize(time);
                let values: Vec<f64> = cells.iter().map(|cell| cell.interpolate(x)).collect();
                T::from_components(&values)
            }
        }
    }
}
