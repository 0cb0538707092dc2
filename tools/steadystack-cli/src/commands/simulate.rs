//! Run one bracket against synthetic sources and write the results.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use steadystack_capture_engine::synthetic::{
    sample_times, test_pattern_frame, yaw_sweep, ScriptedCaptureSource, ScriptedMotionSource,
};
use steadystack_capture_engine::{CaptureWorker, ChannelSink, SessionEvent};
use steadystack_common::clock::CaptureClock;
use steadystack_common::config::AppConfig;
use steadystack_sample_model::{serialize_samples, MotionLogHeader};

/// Motion samples start this long before the first shot.
const MOTION_LEAD_SECS: f64 = 0.2;

/// Simulated sensor rate.
const MOTION_STEP_SECS: f64 = 0.01;

pub struct SimulateOptions {
    pub output: PathBuf,
    pub shots: Option<usize>,
    pub width: u32,
    pub height: u32,
    pub yaw_rate: f64,
    pub shot_spacing: f64,
}

pub async fn run(config: &AppConfig, options: SimulateOptions) -> anyhow::Result<()> {
    let mut defaults = config.capture.clone();
    let shots = options.shots.unwrap_or(defaults.max_bracket_count);
    defaults.max_bracket_count = shots;

    let first_shot = 1.0;
    let frames = (0..shots)
        .map(|i| {
            test_pattern_frame(
                first_shot + i as f64 * options.shot_spacing,
                options.width,
                options.height,
                i as u32,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let last_shot = first_shot + shots.saturating_sub(1) as f64 * options.shot_spacing;
    let times = sample_times(
        first_shot - MOTION_LEAD_SECS,
        last_shot + MOTION_LEAD_SECS,
        MOTION_STEP_SECS,
    );
    let samples = yaw_sweep(&times, options.yaw_rate);

    println!("Simulating {shots}-shot bracket");
    println!("  Frames: {}x{}", options.width, options.height);
    println!("  Motion samples: {} ({}s to {}s)", samples.len(), times[0], times[times.len() - 1]);
    println!("  Yaw rate: {} rad/s", options.yaw_rate);
    println!();

    let capture = Arc::new(ScriptedCaptureSource::with_frames(shots, frames));
    let motion = Arc::new(ScriptedMotionSource::new(samples.clone()).closing());
    let (sink, mut events) = ChannelSink::new();
    let clock = CaptureClock::start();
    let (handle, worker) = CaptureWorker::new(defaults, capture, motion, Arc::new(sink))
        .with_clock(clock.clone())
        .spawn();

    let session_id = handle.capture().await?;
    let result = loop {
        let event = tokio::time::timeout(Duration::from_secs(30), events.recv())
            .await
            .context("Timed out waiting for the bracket")?
            .context("Capture worker stopped unexpectedly")?;
        match event {
            SessionEvent::StateChanged { state, .. } => println!("  [{session_id}] {state}"),
            SessionEvent::Progress {
                received, expected, ..
            } => println!("  [{session_id}] frame {received}/{expected}"),
            SessionEvent::OrientationReady { estimate, .. } => println!(
                "  [{session_id}] orientation for frame {} at t={:.3} ({:?})",
                estimate.frame_index, estimate.time, estimate.kind
            ),
            SessionEvent::Complete(result) => break *result,
            SessionEvent::Failed(failure) => {
                anyhow::bail!("Bracket failed ({}): {}", failure.reason, failure.message)
            }
        }
    };
    handle.shutdown()?;
    worker.await?;

    tokio::fs::create_dir_all(&options.output)
        .await
        .with_context(|| format!("Failed to create {}", options.output.display()))?;
    let original_path = options.output.join("original.png");
    let processed_path = options.output.join("processed.png");
    let motion_path = options.output.join("motion.jsonl");

    result.original.save(&original_path)?;
    result.processed.save(&processed_path)?;
    let header = MotionLogHeader::new(
        (MOTION_STEP_SECS * 1000.0).round() as u64,
        clock.epoch_wall(),
    );
    tokio::fs::write(&motion_path, serialize_samples(&header, &samples)?).await?;

    println!();
    println!("Original:  {}", original_path.display());
    println!("Processed: {}", processed_path.display());
    println!("Motion:    {}", motion_path.display());

    let summary = serde_json::json!({
        "session_id": result.session_id,
        "frames": result.frames,
        "orientation": result.orientation,
        "relative_rotation": result.orientation.relative_rotation(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
