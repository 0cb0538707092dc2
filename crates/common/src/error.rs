//! Error types shared across SteadyStack crates.

use serde::{Deserialize, Serialize};

/// Top-level error type for SteadyStack operations.
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Capture device unavailable: {message}")]
    DeviceUnavailable { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid capture buffer for frame {index}: {message}")]
    CaptureBufferInvalid { index: usize, message: String },

    #[error("Insufficient orientation samples at t={time:.6}: need {needed}, {available} recorded")]
    InsufficientSamples {
        needed: usize,
        available: usize,
        time: f64,
    },

    #[error("Out-of-order sample: t={time:.6} precedes last recorded t={last:.6}")]
    OutOfOrderSample { time: f64, last: f64 },

    #[error("Sample time is not finite: {time}")]
    NonFiniteSample { time: f64 },

    #[error("Interpolation error: {message}")]
    Interpolation { message: String },

    #[error("Blend not ready: expected {expected} images, received {received}")]
    BlendNotReady { expected: usize, received: usize },

    #[error("Image dimensions differ: expected {expected:?}, found {found:?}")]
    DimensionMismatch {
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("Capture error: {message}")]
    Capture { message: String },

    #[error("A bracket session is already in progress")]
    SessionBusy,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Timed out after {millis}ms waiting for {what}")]
    Timeout { what: String, millis: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using StackError.
pub type StackResult<T> = Result<T, StackError>;

/// Closed set of reasons a bracket session can fail.
///
/// Delivered to the result sink exactly once per failed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    PermissionDenied,
    DeviceUnavailable,
    ConfigurationFailed,
    CaptureBufferInvalid,
    InsufficientOrientationSamples,
    BlendNotReady,
    Unknown,
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            FailureReason::PermissionDenied => "permission denied",
            FailureReason::DeviceUnavailable => "device unavailable",
            FailureReason::ConfigurationFailed => "configuration failed",
            FailureReason::CaptureBufferInvalid => "capture buffer invalid",
            FailureReason::InsufficientOrientationSamples => "insufficient orientation samples",
            FailureReason::BlendNotReady => "blend not ready",
            FailureReason::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

impl StackError {
    pub fn permission_denied(msg: impl Into<String>) -> Self {
        Self::PermissionDenied {
            message: msg.into(),
        }
    }

    pub fn device_unavailable(msg: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            message: msg.into(),
        }
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    pub fn buffer_invalid(index: usize, msg: impl Into<String>) -> Self {
        Self::CaptureBufferInvalid {
            index,
            message: msg.into(),
        }
    }

    pub fn interpolation(msg: impl Into<String>) -> Self {
        Self::Interpolation {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture {
            message: msg.into(),
        }
    }

    /// Map this error onto the session failure taxonomy.
    pub fn reason(&self) -> FailureReason {
        match self {
            StackError::PermissionDenied { .. } => FailureReason::PermissionDenied,
            StackError::DeviceUnavailable { .. } | StackError::Timeout { .. } => {
                FailureReason::DeviceUnavailable
            }
            StackError::Configuration { .. } | StackError::SessionBusy => {
                FailureReason::ConfigurationFailed
            }
            StackError::CaptureBufferInvalid { .. } | StackError::DimensionMismatch { .. } => {
                FailureReason::CaptureBufferInvalid
            }
            StackError::InsufficientSamples { .. }
            | StackError::OutOfOrderSample { .. }
            | StackError::NonFiniteSample { .. }
            | StackError::Interpolation { .. } => FailureReason::InsufficientOrientationSamples,
            StackError::BlendNotReady { .. } => FailureReason::BlendNotReady,
            StackError::Capture { .. }
            | StackError::Cancelled
            | StackError::Io(_)
            | StackError::Json(_)
            | StackError::Other(_) => FailureReason::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_mapping() {
        assert_eq!(
            StackError::device_unavailable("camera gone").reason(),
            FailureReason::DeviceUnavailable
        );
        assert_eq!(
            StackError::InsufficientSamples {
                needed: 4,
                available: 2,
                time: 1.0
            }
            .reason(),
            FailureReason::InsufficientOrientationSamples
        );
        assert_eq!(
            StackError::BlendNotReady {
                expected: 3,
                received: 2
            }
            .reason(),
            FailureReason::BlendNotReady
        );
        assert_eq!(
            StackError::DimensionMismatch {
                expected: (4, 4),
                found: (2, 2)
            }
            .reason(),
            FailureReason::CaptureBufferInvalid
        );
        assert_eq!(StackError::Cancelled.reason(), FailureReason::Unknown);
    }

    #[test]
    fn test_failure_reason_serializes_snake_case() {
        let json = serde_json::to_string(&FailureReason::InsufficientOrientationSamples).unwrap();
        assert_eq!(json, "\"insufficient_orientation_samples\"");
    }

    #[test]
    fn test_insufficient_samples_message() {
        let err = StackError::InsufficientSamples {
            needed: 4,
            available: 3,
            time: 1.25,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient orientation samples at t=1.250000: need 4, 3 recorded"
        );
    }
}
