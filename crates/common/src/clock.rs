//! Capture clock utilities.
//!
//! Frames and motion samples are stamped on one monotonic clock so that
//! a frame's capture instant can be located inside the motion stream.
//! The wall-clock time at the epoch is kept so logs written against the
//! clock can be related back to real time.

use std::time::{Duration, Instant};

/// Monotonic capture clock measuring seconds since a fixed epoch.
#[derive(Debug, Clone)]
pub struct CaptureClock {
    /// The instant the clock was started.
    epoch: Instant,

    /// Wall-clock time at epoch (RFC 3339 string).
    epoch_wall: String,
}

impl CaptureClock {
    /// Create a new clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Seconds elapsed since the epoch.
    pub fn now_secs(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64()
    }

    /// Wall-clock time at the epoch.
    pub fn epoch_wall(&self) -> &str {
        &self.epoch_wall
    }
}

/// Build a `Duration` from a millisecond setting.
pub fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
