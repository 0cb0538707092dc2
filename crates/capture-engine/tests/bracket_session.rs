use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use steadystack_capture_engine::synthetic::{
    test_pattern_frame, yaw_sweep, ScriptedCaptureSource, ScriptedMotionSource, Shot,
};
use steadystack_capture_engine::{
    BracketResult, CaptureHandle, CaptureWorker, ChannelSink, ResultSink, SessionEvent,
    SessionFailure, SessionId,
};
use steadystack_common::config::{CaptureDefaults, InterpolationKind};
use steadystack_common::error::{FailureReason, StackError};
use steadystack_sample_model::{CaptureFrame, ExposureBias, RotationMatrix, SessionState};
use tokio::sync::mpsc::UnboundedReceiver;

const YAW_RATE: f64 = 0.5;

fn defaults() -> CaptureDefaults {
    CaptureDefaults {
        max_bracket_count: 3,
        bias_step_ev: 1.0,
        first_sample_timeout_ms: 200,
        orientation_wait_ms: 30,
        frame_timeout_ms: 300,
        ..CaptureDefaults::default()
    }
}

fn frames_at(times: &[f64]) -> Vec<CaptureFrame> {
    times
        .iter()
        .enumerate()
        .map(|(i, &t)| test_pattern_frame(t, 32, 24, i as u32).unwrap())
        .collect()
}

fn bracket_motion() -> ScriptedMotionSource {
    ScriptedMotionSource::new(yaw_sweep(&[0.9, 0.95, 1.0, 1.05, 1.1, 1.15], YAW_RATE))
}

fn start(
    capture: Arc<ScriptedCaptureSource>,
    motion: Arc<ScriptedMotionSource>,
    config: CaptureDefaults,
) -> (CaptureHandle, UnboundedReceiver<SessionEvent>) {
    let (sink, events) = ChannelSink::new();
    let (handle, _task) = CaptureWorker::new(config, capture, motion, Arc::new(sink)).spawn();
    (handle, events)
}

/// Drain events until the session outcome, returning the states seen.
async fn outcome(
    events: &mut UnboundedReceiver<SessionEvent>,
) -> (Vec<SessionState>, Result<BracketResult, SessionFailure>) {
    let mut states = Vec::new();
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv())
            .await
            .expect("session should finish")
            .expect("sink should stay open");
        match event {
            SessionEvent::StateChanged { state, .. } => states.push(state),
            SessionEvent::Complete(result) => return (states, Ok(*result)),
            SessionEvent::Failed(failure) => return (states, Err(failure)),
            _ => {}
        }
    }
}

#[tokio::test]
async fn three_shot_bracket_completes_with_orientation() {
    let capture = Arc::new(ScriptedCaptureSource::with_frames(
        5,
        frames_at(&[1.0, 1.05, 1.10]),
    ));
    let motion = Arc::new(bracket_motion());
    let (handle, mut events) = start(capture.clone(), motion.clone(), defaults());

    let id = handle.capture().await.unwrap();
    let (states, result) = outcome(&mut events).await;
    let result = result.expect("bracket should complete");

    assert_eq!(
        states,
        vec![
            SessionState::Preparing,
            SessionState::Capturing,
            SessionState::Collecting,
            SessionState::Finalizing,
            SessionState::Complete,
        ]
    );
    assert_eq!(result.session_id, id);
    assert_eq!(result.frames.len(), 3);
    assert_eq!(result.processed.dimensions(), (32, 24));
    assert_eq!(result.original.dimensions(), (32, 24));

    let evs: Vec<f32> = result.frames.iter().map(|r| r.bias.ev()).collect();
    assert_eq!(evs, vec![-1.0, 0.0, 1.0]);
    assert_eq!(capture.requests()[0].biases[1], ExposureBias(0.0));

    let first = result.orientation.first.expect("first frame orientation");
    assert_eq!(first.kind, InterpolationKind::Cubic);
    assert_eq!(first.frame_index, 0);
    assert!(first.rotation.max_abs_diff(&RotationMatrix::about_z(YAW_RATE * 1.0)) < 1e-9);

    // No sample after 1.15, so the last frame only has a linear bracket.
    let last = result.orientation.last.expect("last frame orientation");
    assert_eq!(last.kind, InterpolationKind::Linear);
    assert_eq!(last.frame_index, 2);

    let relative = result.orientation.relative_rotation().unwrap();
    assert!(relative.max_abs_diff(&RotationMatrix::about_z(YAW_RATE * 0.10)) < 1e-3);
    assert!(motion.is_stopped());
}

#[tokio::test]
async fn median_removes_object_seen_in_one_frame() {
    // Frames 0 and 2 share a pattern; frame 1 has the square elsewhere.
    let frames = vec![
        test_pattern_frame(1.0, 48, 48, 0).unwrap(),
        test_pattern_frame(1.05, 48, 48, 1).unwrap(),
        test_pattern_frame(1.10, 48, 48, 0).unwrap(),
    ];
    let capture = Arc::new(ScriptedCaptureSource::with_frames(3, frames));
    let (handle, mut events) = start(capture, Arc::new(bracket_motion()), defaults());

    handle.capture().await.unwrap();
    let (_, result) = outcome(&mut events).await;
    let result = result.unwrap();
    assert_eq!(result.processed, result.original);
}

#[tokio::test]
async fn device_error_before_any_frame_fails_without_blend() {
    let capture = Arc::new(ScriptedCaptureSource::new(
        3,
        vec![Shot::DeviceError("sensor disconnected".into())],
    ));
    let (handle, mut events) = start(capture, Arc::new(bracket_motion()), defaults());

    handle.capture().await.unwrap();
    let (states, result) = outcome(&mut events).await;
    let failure = result.expect_err("session should fail");

    assert_eq!(failure.reason, FailureReason::DeviceUnavailable);
    assert_eq!(states.last(), Some(&SessionState::Failed));
    assert!(!states.contains(&SessionState::Collecting));
    assert!(!states.contains(&SessionState::Finalizing));
}

#[tokio::test]
async fn permission_refusal_aborts_configuration() {
    let capture = Arc::new(
        ScriptedCaptureSource::with_frames(3, frames_at(&[1.0, 1.05, 1.10]))
            .refuse_with(FailureReason::PermissionDenied),
    );
    let (handle, mut events) = start(capture, Arc::new(bracket_motion()), defaults());

    handle.capture().await.unwrap();
    let (states, result) = outcome(&mut events).await;
    assert_eq!(result.unwrap_err().reason, FailureReason::PermissionDenied);
    assert_eq!(states, vec![SessionState::Preparing, SessionState::Failed]);
}

#[tokio::test]
async fn device_limit_below_two_is_configuration_failure() {
    let capture = Arc::new(ScriptedCaptureSource::with_frames(1, frames_at(&[1.0])));
    let (handle, mut events) = start(capture.clone(), Arc::new(bracket_motion()), defaults());

    handle.capture().await.unwrap();
    let (_, result) = outcome(&mut events).await;
    assert_eq!(result.unwrap_err().reason, FailureReason::ConfigurationFailed);
    assert!(capture.requests().is_empty());
}

#[tokio::test]
async fn empty_buffer_is_invalid() {
    let mut frames = frames_at(&[1.0, 1.05, 1.10]);
    frames[1] = CaptureFrame::new(1.05, Vec::new());
    let capture = Arc::new(ScriptedCaptureSource::with_frames(3, frames));
    let (handle, mut events) = start(capture, Arc::new(bracket_motion()), defaults());

    handle.capture().await.unwrap();
    let (_, result) = outcome(&mut events).await;
    assert_eq!(result.unwrap_err().reason, FailureReason::CaptureBufferInvalid);
}

#[tokio::test]
async fn corrupt_buffer_fails_in_finalizing() {
    let mut frames = frames_at(&[1.0, 1.05, 1.10]);
    frames[2] = CaptureFrame::new(1.10, b"truncated jpeg".to_vec());
    let capture = Arc::new(ScriptedCaptureSource::with_frames(3, frames));
    let (handle, mut events) = start(capture, Arc::new(bracket_motion()), defaults());

    handle.capture().await.unwrap();
    let (states, result) = outcome(&mut events).await;
    assert_eq!(result.unwrap_err().reason, FailureReason::CaptureBufferInvalid);
    assert!(states.contains(&SessionState::Finalizing));
    assert_eq!(states.last(), Some(&SessionState::Failed));
}

#[tokio::test]
async fn missing_motion_still_delivers_image() {
    let capture = Arc::new(ScriptedCaptureSource::with_frames(
        3,
        frames_at(&[1.0, 1.05, 1.10]),
    ));
    let (handle, mut events) = start(
        capture,
        Arc::new(ScriptedMotionSource::unavailable()),
        defaults(),
    );

    handle.capture().await.unwrap();
    let (_, result) = outcome(&mut events).await;
    let result = result.expect("image portion still succeeds");
    assert!(result.orientation.first.is_none());
    assert!(result.orientation.last.is_none());
}

#[tokio::test]
async fn sparse_motion_yields_partial_orientation() {
    // Samples only cover the first frame; the stream then closes.
    let motion = ScriptedMotionSource::new(yaw_sweep(&[0.95, 1.02], YAW_RATE)).closing();
    let capture = Arc::new(ScriptedCaptureSource::with_frames(
        3,
        frames_at(&[1.0, 1.05, 1.10]),
    ));
    let (handle, mut events) = start(capture, Arc::new(motion), defaults());

    handle.capture().await.unwrap();
    let (_, result) = outcome(&mut events).await;
    let result = result.unwrap();
    let first = result.orientation.first.expect("linear bracket around 1.0");
    assert_eq!(first.kind, InterpolationKind::Linear);
    assert!(result.orientation.last.is_none());
    assert!(result.orientation.relative_rotation().is_none());
}

#[tokio::test]
async fn lagging_motion_is_awaited_for_cubic_brackets() {
    // Frames arrive at once while samples trickle in every 30ms, so the
    // brackets around both frames fill only after collection ends.
    let times = [0.9, 0.95, 1.0, 1.05, 1.1, 1.15, 1.2, 1.25];
    let motion = Arc::new(
        ScriptedMotionSource::new(yaw_sweep(&times, YAW_RATE)).paced(Duration::from_millis(30)),
    );
    let capture = Arc::new(ScriptedCaptureSource::with_frames(
        3,
        frames_at(&[1.0, 1.05, 1.10]),
    ));
    let config = CaptureDefaults {
        orientation_wait_ms: 1000,
        ..defaults()
    };
    let (handle, mut events) = start(capture, motion, config);

    handle.capture().await.unwrap();
    let (_, result) = outcome(&mut events).await;
    let orientation = result.unwrap().orientation;
    let first = orientation.first.expect("first frame bracketed");
    let last = orientation.last.expect("last frame bracketed");
    assert_eq!(first.kind, InterpolationKind::Cubic);
    assert_eq!(last.kind, InterpolationKind::Cubic);
    assert!(first.rotation.max_abs_diff(&RotationMatrix::about_z(0.5)) < 1e-9);
    assert!(last.rotation.max_abs_diff(&RotationMatrix::about_z(0.55)) < 1e-9);
}

#[derive(Default)]
struct CountingSink {
    states: AtomicUsize,
    outcomes: AtomicUsize,
}

impl ResultSink for CountingSink {
    fn on_state(&self, _session_id: SessionId, _state: SessionState) {
        self.states.fetch_add(1, Ordering::SeqCst);
    }

    fn on_result(&self, _result: BracketResult) {
        self.outcomes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_failure(&self, _failure: SessionFailure) {
        self.outcomes.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn worker_exit_waits_for_sink_delivery() {
    let capture = Arc::new(ScriptedCaptureSource::with_frames(
        3,
        frames_at(&[1.0, 1.05, 1.10]),
    ));
    let sink = Arc::new(CountingSink::default());
    let (handle, task) =
        CaptureWorker::new(defaults(), capture, Arc::new(bracket_motion()), sink.clone()).spawn();

    handle.capture().await.unwrap();
    handle.shutdown().unwrap();
    tokio::time::timeout(Duration::from_secs(10), task)
        .await
        .expect("worker should stop")
        .unwrap();

    assert_eq!(sink.outcomes.load(Ordering::SeqCst), 1);
    assert!(sink.states.load(Ordering::SeqCst) >= 2);
}

#[tokio::test]
async fn stalled_device_times_out_as_unavailable() {
    let frames = frames_at(&[1.0]);
    let capture = Arc::new(ScriptedCaptureSource::new(
        3,
        vec![Shot::Frame(frames[0].clone()), Shot::Stall],
    ));
    let (handle, mut events) = start(capture, Arc::new(bracket_motion()), defaults());

    handle.capture().await.unwrap();
    let (states, result) = outcome(&mut events).await;
    assert_eq!(result.unwrap_err().reason, FailureReason::DeviceUnavailable);
    assert!(states.contains(&SessionState::Collecting));
}

#[tokio::test]
async fn second_capture_while_busy_is_rejected() {
    let capture = Arc::new(
        ScriptedCaptureSource::with_frames(3, frames_at(&[1.0, 1.05, 1.10]))
            .shot_interval(Duration::from_millis(40)),
    );
    let (handle, mut events) = start(capture, Arc::new(bracket_motion()), defaults());

    let first = handle.capture().await.unwrap();
    assert!(matches!(handle.capture().await, Err(StackError::SessionBusy)));

    let (_, result) = outcome(&mut events).await;
    assert_eq!(result.unwrap().session_id, first);

    // The worker accepts new work once the session is over.
    let second = handle.capture().await.unwrap();
    assert_eq!(second, first + 1);
}

#[tokio::test]
async fn abandoned_session_fails_once_and_worker_continues() {
    let capture = Arc::new(ScriptedCaptureSource::new(3, vec![Shot::Stall]));
    let config = CaptureDefaults {
        frame_timeout_ms: 10_000,
        ..defaults()
    };
    let (handle, mut events) = start(capture, Arc::new(bracket_motion()), config);

    handle.capture().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    handle.abandon().unwrap();

    let (states, result) = outcome(&mut events).await;
    assert_eq!(result.unwrap_err().reason, FailureReason::Unknown);
    assert_eq!(states.last(), Some(&SessionState::Failed));
    assert!(!states.contains(&SessionState::Finalizing));

    handle.shutdown().unwrap();
    assert!(tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .map_or(true, |event| event.is_none()));
}
