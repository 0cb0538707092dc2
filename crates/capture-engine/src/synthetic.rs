//! Scripted capture and motion sources.
//!
//! Used by tests and `steadystack simulate` to drive the worker without
//! hardware. Frames carry PNG-encoded test patterns.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use image::{Rgba, RgbaImage};
use steadystack_blend_engine::encode_png;
use steadystack_common::error::{FailureReason, StackError, StackResult};
use steadystack_sample_model::{CaptureFrame, RotationMatrix, TimedSample};
use tokio::sync::mpsc;

use crate::source::{BracketSettings, CaptureSource, MotionSource};

/// One scripted response from the capture device.
#[derive(Debug, Clone)]
pub enum Shot {
    /// Deliver this frame.
    Frame(CaptureFrame),
    /// Report a device error and end the bracket.
    DeviceError(String),
    /// Go silent while keeping the bracket open.
    Stall,
}

/// Capture source replaying a fixed script of shots.
pub struct ScriptedCaptureSource {
    max_bracket_count: usize,
    shots: Vec<Shot>,
    shot_interval: Duration,
    refuse_with: Option<FailureReason>,
    requests: Mutex<Vec<BracketSettings>>,
}

impl ScriptedCaptureSource {
    pub fn new(max_bracket_count: usize, shots: Vec<Shot>) -> Self {
        Self {
            max_bracket_count,
            shots,
            shot_interval: Duration::ZERO,
            refuse_with: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Script that delivers `frames` in order.
    pub fn with_frames(max_bracket_count: usize, frames: Vec<CaptureFrame>) -> Self {
        Self::new(max_bracket_count, frames.into_iter().map(Shot::Frame).collect())
    }

    /// Pause between shots.
    pub fn shot_interval(mut self, interval: Duration) -> Self {
        self.shot_interval = interval;
        self
    }

    /// Refuse to start any bracket.
    pub fn refuse_with(mut self, reason: FailureReason) -> Self {
        self.refuse_with = Some(reason);
        self
    }

    /// Settings of every bracket requested so far.
    pub fn requests(&self) -> Vec<BracketSettings> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn refusal(reason: FailureReason) -> StackError {
    match reason {
        FailureReason::PermissionDenied => StackError::permission_denied("camera access refused"),
        FailureReason::DeviceUnavailable => StackError::device_unavailable("camera not present"),
        FailureReason::ConfigurationFailed => {
            StackError::configuration("bracket settings rejected by device")
        }
        other => StackError::capture(format!("capture refused: {other}")),
    }
}

#[async_trait::async_trait]
impl CaptureSource for ScriptedCaptureSource {
    fn name(&self) -> &str {
        "scripted"
    }

    fn max_bracket_count(&self) -> usize {
        self.max_bracket_count
    }

    async fn begin_bracketed_capture(
        &self,
        settings: &BracketSettings,
    ) -> StackResult<mpsc::Receiver<StackResult<CaptureFrame>>> {
        if let Some(reason) = self.refuse_with {
            return Err(refusal(reason));
        }
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(settings.clone());

        let (tx, rx) = mpsc::channel(settings.count().max(1));
        let shots = self.shots.clone();
        let interval = self.shot_interval;
        tokio::spawn(async move {
            for shot in shots {
                if !interval.is_zero() {
                    tokio::time::sleep(interval).await;
                }
                let delivered = match shot {
                    Shot::Frame(frame) => tx.send(Ok(frame)).await,
                    Shot::DeviceError(message) => {
                        let _ = tx.send(Err(StackError::device_unavailable(message))).await;
                        return;
                    }
                    Shot::Stall => {
                        tx.closed().await;
                        return;
                    }
                };
                if delivered.is_err() {
                    return;
                }
            }
        });
        Ok(rx)
    }
}

/// Motion source replaying a fixed list of samples.
///
/// After the last sample the stream stays open until stopped, unless
/// built with [`ScriptedMotionSource::closing`].
pub struct ScriptedMotionSource {
    samples: Vec<TimedSample<RotationMatrix>>,
    pace: Duration,
    close_when_done: bool,
    unavailable: bool,
    stopped: Arc<AtomicBool>,
}

impl ScriptedMotionSource {
    pub fn new(samples: Vec<TimedSample<RotationMatrix>>) -> Self {
        Self {
            samples,
            pace: Duration::ZERO,
            close_when_done: false,
            unavailable: false,
            stopped: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Close the stream after the last sample.
    pub fn closing(mut self) -> Self {
        self.close_when_done = true;
        self
    }

    /// Pause between samples.
    pub fn paced(mut self, pace: Duration) -> Self {
        self.pace = pace;
        self
    }

    /// A sensor that fails to start.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::new(Vec::new())
        }
    }

    /// Whether `stop_orientation_updates` has been called.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl MotionSource for ScriptedMotionSource {
    async fn start_orientation_updates(
        &self,
        _interval: Duration,
    ) -> StackResult<mpsc::Receiver<TimedSample<RotationMatrix>>> {
        if self.unavailable {
            return Err(StackError::device_unavailable("motion sensor unavailable"));
        }
        self.stopped.store(false, Ordering::SeqCst);

        let (tx, rx) = mpsc::channel(self.samples.len().max(1));
        let samples = self.samples.clone();
        let pace = self.pace;
        let close_when_done = self.close_when_done;
        let stopped = Arc::clone(&self.stopped);
        tokio::spawn(async move {
            for sample in samples {
                if stopped.load(Ordering::SeqCst) {
                    return;
                }
                if !pace.is_zero() {
                    tokio::time::sleep(pace).await;
                }
                if tx.send(sample).await.is_err() {
                    return;
                }
            }
            if !close_when_done {
                tx.closed().await;
            }
        });
        Ok(rx)
    }

    async fn stop_orientation_updates(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }
}

/// Orientation samples for a steady yaw rotation of `rate` rad/s.
pub fn yaw_sweep(times: &[f64], rate: f64) -> Vec<TimedSample<RotationMatrix>> {
    times
        .iter()
        .map(|&t| TimedSample::new(t, RotationMatrix::about_z(rate * t)))
        .collect()
}

/// Evenly spaced sample times from `start` to `end` inclusive.
pub fn sample_times(start: f64, end: f64, step: f64) -> Vec<f64> {
    if step <= 0.0 || end < start {
        return vec![start];
    }
    let count = ((end - start) / step).round() as usize;
    (0..=count).map(|i| start + i as f64 * step).collect()
}

/// Test pattern: a diagonal gradient with a checkerboard, plus a bright
/// square whose position depends on `seed` (a "moving object").
pub fn test_pattern(width: u32, height: u32, seed: u32) -> RgbaImage {
    let square = (width.min(height) / 6).max(1);
    let offset_x = (seed * square * 2) % width.max(1);
    let offset_y = height / 3;

    RgbaImage::from_fn(width, height, |x, y| {
        let in_square = x >= offset_x
            && x < offset_x + square
            && y >= offset_y
            && y < offset_y + square;
        if in_square {
            return Rgba([250, 240, 40, 255]);
        }
        let checker = ((x / 8) + (y / 8)) % 2 == 0;
        let base = ((x + y) * 255 / (width + height).max(1)) as u8;
        let shade = if checker { base / 2 } else { base };
        Rgba([shade, shade / 2 + 40, 160 - shade / 2, 255])
    })
}

/// PNG-encoded test pattern frame captured at `time`.
pub fn test_pattern_frame(time: f64, width: u32, height: u32, seed: u32) -> StackResult<CaptureFrame> {
    Ok(CaptureFrame::new(time, encode_png(&test_pattern(width, height, seed))?))
}
