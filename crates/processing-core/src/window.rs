//! Orientation sample window and bracket selection.
//!
//! The window is an append-only, time-ordered buffer cleared at the start of
//! each capture session. Lookups select the smallest bracketing subset the
//! chosen interpolator needs and fit over just that subset.

use std::ops::Range;

use steadystack_common::config::InterpolationKind;
use steadystack_common::error::{StackError, StackResult};
use steadystack_sample_model::{RotationMatrix, TimedSample};

use crate::components::{ComponentInterpolator, Components};
use crate::spline::{CubicSpline, LinearInterpolator, ScalarInterpolator};

/// Samples in a cubic bracket: `{i-2, i-1, i, i+1}`.
pub const CUBIC_BRACKET: usize = 4;

/// Samples in a linear bracket: `{i-1, i}`.
pub const LINEAR_BRACKET: usize = 2;

/// Time-ordered buffer of orientation samples.
#[derive(Debug, Clone)]
pub struct SampleWindow<T> {
    samples: Vec<TimedSample<T>>,
}

/// Window of rotation-matrix samples fed by the motion stream.
pub type OrientationWindow = SampleWindow<RotationMatrix>;

/// Result of a lookup, noting which strategy produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate<T> {
    pub time: f64,
    pub value: T,
    pub kind: InterpolationKind,
    /// Index range of the samples the fit used.
    pub bracket: (usize, usize),
}

impl<T> Default for SampleWindow<T> {
    fn default() -> Self {
        Self {
            samples: Vec::new(),
        }
    }
}

impl<T: Components> SampleWindow<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
        }
    }

    /// Build a window from samples already in non-decreasing time order.
    pub fn from_samples(samples: Vec<TimedSample<T>>) -> StackResult<Self> {
        let mut window = Self::with_capacity(samples.len());
        for sample in samples {
            window.push(sample)?;
        }
        Ok(window)
    }

    /// Append a sample at the tail.
    pub fn record(&mut self, time: f64, value: T) -> StackResult<()> {
        self.push(TimedSample::new(time, value))
    }

    /// Append a sample. Rejects non-finite times and times earlier than
    /// the current tail; equal times are kept.
    pub fn push(&mut self, sample: TimedSample<T>) -> StackResult<()> {
        if !sample.time.is_finite() {
            return Err(StackError::NonFiniteSample { time: sample.time });
        }
        if let Some(last) = self.samples.last() {
            if sample.time < last.time {
                return Err(StackError::OutOfOrderSample {
                    time: sample.time,
                    last: last.time,
                });
            }
        }
        self.samples.push(sample);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[TimedSample<T>] {
        &self.samples
    }

    /// `(first.time, last.time)`, or `None` when empty.
    pub fn domain(&self) -> Option<(f64, f64)> {
        Some((self.samples.first()?.time, self.samples.last()?.time))
    }

    /// Index of the first sample strictly later than `time`.
    fn first_after(&self, time: f64) -> usize {
        self.samples.partition_point(|s| s.time <= time)
    }

    fn insufficient(&self, needed: usize, time: f64) -> StackError {
        StackError::InsufficientSamples {
            needed,
            available: self.samples.len(),
            time,
        }
    }

    /// Four-sample bracket `{i-2, i-1, i, i+1}` where `i` is the first sample
    /// later than `time`.
    pub fn select_cubic(&self, time: f64) -> StackResult<Range<usize>> {
        let i = self.first_after(time);
        if i < 2 || i + 1 >= self.samples.len() {
            return Err(self.insufficient(CUBIC_BRACKET, time));
        }
        Ok(i - 2..i + 2)
    }

    /// Two-sample bracket `{i-1, i}` where `i` is the first sample later
    /// than `time`.
    pub fn select_linear(&self, time: f64) -> StackResult<Range<usize>> {
        let i = self.first_after(time);
        if i < 1 || i >= self.samples.len() {
            return Err(self.insufficient(LINEAR_BRACKET, time));
        }
        Ok(i - 1..i + 1)
    }

    /// Bracket for the given strategy.
    pub fn select(&self, kind: InterpolationKind, time: f64) -> StackResult<Range<usize>> {
        match kind {
            InterpolationKind::Cubic => self.select_cubic(time),
            InterpolationKind::Linear => self.select_linear(time),
        }
    }

    /// Fit an interpolator over a sub-range of the window.
    pub fn fit_range<I: ScalarInterpolator>(
        &self,
        range: Range<usize>,
    ) -> StackResult<ComponentInterpolator<T, I>> {
        let slice = self
            .samples
            .get(range.clone())
            .ok_or_else(|| self.insufficient(range.len(), f64::NAN))?;
        ComponentInterpolator::fit(slice)
    }

    /// Interpolate at `time` with exactly the requested strategy.
    pub fn interpolate(&self, kind: InterpolationKind, time: f64) -> StackResult<Estimate<T>> {
        let range = self.select(kind, time)?;
        let bracket = (range.start, range.end - 1);
        let value = match kind {
            InterpolationKind::Cubic => self.fit_range::<CubicSpline>(range)?.interpolate(time),
            InterpolationKind::Linear => {
                self.fit_range::<LinearInterpolator>(range)?.interpolate(time)
            }
        };
        Ok(Estimate {
            time,
            value,
            kind,
            bracket,
        })
    }

    /// Interpolate at `time`, falling back from cubic to linear when the
    /// four-sample bracket is unavailable.
    pub fn estimate(&self, preferred: InterpolationKind, time: f64) -> StackResult<Estimate<T>> {
        match self.interpolate(preferred, time) {
            Ok(estimate) => Ok(estimate),
            Err(err) if preferred == InterpolationKind::Cubic => {
                tracing::debug!(time, error = %err, "Cubic bracket unavailable, trying linear");
                self.interpolate(InterpolationKind::Linear, time)
            }
            Err(err) => Err(err),
        }
    }
}
