//! Interfaces to the capture device and the motion sensor.
//!
//! Both collaborators deliver their data on channels so that the capture
//! worker can multiplex them with its own command queue.

use std::time::Duration;

use steadystack_common::config::CaptureDefaults;
use steadystack_common::error::{StackError, StackResult};
use steadystack_sample_model::{bracket_biases, CaptureFrame, ExposureBias, RotationMatrix, TimedSample};
use tokio::sync::mpsc;

/// Exposure settings for one bracket.
#[derive(Debug, Clone, PartialEq)]
pub struct BracketSettings {
    /// One bias per requested shot, in capture order.
    pub biases: Vec<ExposureBias>,
}

impl BracketSettings {
    /// Build settings for `min(configured max, device max)` shots spread
    /// around the configured centre bias.
    pub fn from_defaults(defaults: &CaptureDefaults, device_max: usize) -> StackResult<Self> {
        let count = defaults.max_bracket_count.min(device_max);
        if count < 2 {
            return Err(StackError::configuration(format!(
                "bracket needs at least 2 shots, configured max {} and device max {device_max}",
                defaults.max_bracket_count
            )));
        }
        Ok(Self {
            biases: bracket_biases(count, defaults.exposure_bias_ev, defaults.bias_step_ev),
        })
    }

    /// Number of frames the device will emit.
    pub fn count(&self) -> usize {
        self.biases.len()
    }
}

/// A camera able to shoot exposure brackets.
#[async_trait::async_trait]
pub trait CaptureSource: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Most shots the device accepts in one bracket.
    fn max_bracket_count(&self) -> usize;

    /// Start a bracket. Frames arrive on the returned channel in capture
    /// order; a device error is sent as `Err` and ends the bracket.
    ///
    /// Failing here (permissions, device missing) aborts the session before
    /// any frame is requested.
    async fn begin_bracketed_capture(
        &self,
        settings: &BracketSettings,
    ) -> StackResult<mpsc::Receiver<StackResult<CaptureFrame>>>;
}

/// A device-orientation sensor.
#[async_trait::async_trait]
pub trait MotionSource: Send + Sync {
    /// Start streaming orientation samples, roughly one per `interval`.
    ///
    /// Samples arrive in non-decreasing time order. The channel closes when
    /// the stream ends.
    async fn start_orientation_updates(
        &self,
        interval: Duration,
    ) -> StackResult<mpsc::Receiver<TimedSample<RotationMatrix>>>;

    /// Stop the stream started by `start_orientation_updates`.
    async fn stop_orientation_updates(&self);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults(max: usize) -> CaptureDefaults {
        CaptureDefaults {
            max_bracket_count: max,
            exposure_bias_ev: 0.0,
            bias_step_ev: 1.0,
            ..CaptureDefaults::default()
        }
    }

    #[test]
    fn test_count_limited_by_device() {
        let settings = BracketSettings::from_defaults(&defaults(5), 3).unwrap();
        assert_eq!(settings.count(), 3);
        let evs: Vec<f32> = settings.biases.iter().map(ExposureBias::ev).collect();
        assert_eq!(evs, vec![-1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_count_limited_by_config() {
        let settings = BracketSettings::from_defaults(&defaults(2), 8).unwrap();
        assert_eq!(settings.count(), 2);
    }

    #[test]
    fn test_single_shot_is_configuration_error() {
        assert!(matches!(
            BracketSettings::from_defaults(&defaults(5), 1),
            Err(StackError::Configuration { .. })
        ));
        assert!(BracketSettings::from_defaults(&defaults(0), 4).is_err());
    }
}
