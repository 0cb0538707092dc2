//! Capture frames and exposure brackets.

use serde::{Deserialize, Serialize};

use crate::sample::TimeSecs;

/// Exposure bias in EV applied to one bracket shot.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExposureBias(pub f32);

impl ExposureBias {
    pub fn ev(&self) -> f32 {
        self.0
    }
}

impl std::fmt::Display for ExposureBias {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:+.1} EV", self.0)
    }
}

/// Build `count` biases spread symmetrically around `centre_ev`.
///
/// Shot `i` gets `centre + (i - (count - 1) / 2) * step`.
pub fn bracket_biases(count: usize, centre_ev: f32, step_ev: f32) -> Vec<ExposureBias> {
    let mid = (count as f32 - 1.0) / 2.0;
    (0..count)
        .map(|i| ExposureBias(centre_ev + (i as f32 - mid) * step_ev))
        .collect()
}

/// An encoded image emitted by the capture source.
///
/// Never mutated after capture; only read for blending.
#[derive(Clone, PartialEq)]
pub struct CaptureFrame {
    /// Capture-clock time of the exposure.
    pub time: TimeSecs,

    /// Encoded image payload (JPEG, PNG, ...).
    pub image_bytes: Vec<u8>,
}

impl CaptureFrame {
    pub fn new(time: TimeSecs, image_bytes: Vec<u8>) -> Self {
        Self { time, image_bytes }
    }

    /// A frame with no payload is treated as a null buffer.
    pub fn is_empty(&self) -> bool {
        self.image_bytes.is_empty()
    }
}

impl std::fmt::Debug for CaptureFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureFrame")
            .field("time", &self.time)
            .field("bytes", &self.image_bytes.len())
            .finish()
    }
}

/// Bookkeeping for a frame accepted into a bracket session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
    /// Position within the bracket.
    pub index: usize,

    /// Capture-clock time of the exposure.
    pub time: TimeSecs,

    /// Exposure bias requested for this shot.
    pub bias: ExposureBias,

    /// Capture-clock time at which the frame reached the session.
    pub arrival_secs: TimeSecs,
}
