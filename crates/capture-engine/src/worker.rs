//! Sequential capture worker.
//!
//! One task owns every piece of session state. Capture requests, abandon
//! requests and device frames are all funneled onto that task, so session
//! state is never touched concurrently. Orientation samples arrive on the
//! feed's own task and only append to the shared window. Session events
//! leave through a channel to a delivery task that owns the result sink.
//!
//! ```text
//! CaptureHandle ──commands──► CaptureWorker ──events──► delivery ──► ResultSink
//!                                 ▲     ▲
//!                  CaptureSource ─┘     └─ OrientationFeed ◄── MotionSource
//! ```

use std::future::Future;
use std::sync::Arc;

use image::RgbaImage;
use steadystack_blend_engine::{decode_frame, BlendKernel, MedianKernel, MultiImageBlend};
use steadystack_common::clock::{millis, CaptureClock};
use steadystack_common::config::CaptureDefaults;
use steadystack_common::error::{StackError, StackResult};
use steadystack_sample_model::{CaptureFrame, FrameRecord, SessionState};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::feed::OrientationFeed;
use crate::session::{
    BracketOrientation, BracketResult, BracketSession, OrientationEstimate, ResultSink,
    ChannelSink, SessionEvent, SessionFailure, SessionId,
};
use crate::source::{BracketSettings, CaptureSource, MotionSource};

enum Command {
    Capture {
        reply: oneshot::Sender<StackResult<SessionId>>,
    },
    Abandon,
    Shutdown,
}

/// Cloneable handle for submitting work to a [`CaptureWorker`].
#[derive(Clone)]
pub struct CaptureHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl CaptureHandle {
    /// Request a bracket. Resolves once the worker has accepted the request;
    /// the outcome is delivered to the result sink.
    ///
    /// Fails with `SessionBusy` while another session is collecting frames.
    pub async fn capture(&self) -> StackResult<SessionId> {
        let (reply, accepted) = oneshot::channel();
        self.send(Command::Capture { reply })?;
        accepted.await.map_err(|_| worker_stopped())?
    }

    /// Abandon the active session if it has not started finalizing.
    pub fn abandon(&self) -> StackResult<()> {
        self.send(Command::Abandon)
    }

    /// Abandon any active session and stop the worker.
    pub fn shutdown(&self) -> StackResult<()> {
        self.send(Command::Shutdown)
    }

    fn send(&self, command: Command) -> StackResult<()> {
        self.commands.send(command).map_err(|_| worker_stopped())
    }
}

fn worker_stopped() -> StackError {
    StackError::capture("capture worker has stopped")
}

/// Why a session stopped before completing.
enum Interrupt {
    Failed(StackError),
    Abandoned { shutdown: bool },
}

impl From<StackError> for Interrupt {
    fn from(error: StackError) -> Self {
        Interrupt::Failed(error)
    }
}

/// Runs bracket sessions one at a time.
pub struct CaptureWorker {
    defaults: CaptureDefaults,
    capture: Arc<dyn CaptureSource>,
    motion: Arc<dyn MotionSource>,
    sink: Arc<dyn ResultSink>,
    kernel: Arc<dyn BlendKernel>,
    clock: CaptureClock,
    next_session: SessionId,
}

impl CaptureWorker {
    pub fn new(
        defaults: CaptureDefaults,
        capture: Arc<dyn CaptureSource>,
        motion: Arc<dyn MotionSource>,
        sink: Arc<dyn ResultSink>,
    ) -> Self {
        Self {
            defaults,
            capture,
            motion,
            sink,
            kernel: MedianKernel::shared(),
            clock: CaptureClock::start(),
            next_session: 1,
        }
    }

    /// Replace the shared median kernel.
    pub fn with_kernel(mut self, kernel: Arc<dyn BlendKernel>) -> Self {
        self.kernel = kernel;
        self
    }

    /// Stamp frame arrivals on `clock` instead of a fresh one.
    pub fn with_clock(mut self, clock: CaptureClock) -> Self {
        self.clock = clock;
        self
    }

    /// Start the worker task.
    ///
    /// The sink is moved onto its own delivery task; the worker only queues
    /// events for it. The returned handle resolves once the worker has
    /// stopped and every queued event has been delivered.
    pub fn spawn(mut self) -> (CaptureHandle, JoinHandle<()>) {
        let (commands, queue) = mpsc::unbounded_channel();
        let (forwarder, outbox) = ChannelSink::new();
        let sink = std::mem::replace(&mut self.sink, Arc::new(forwarder));
        let delivery = tokio::spawn(deliver(sink, outbox));
        let task = tokio::spawn(self.run(queue, delivery));
        (CaptureHandle { commands }, task)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        delivery: JoinHandle<()>,
    ) {
        tracing::info!(capture = self.capture.name(), "Capture worker started");

        while let Some(command) = commands.recv().await {
            match command {
                Command::Capture { reply } => {
                    let id = self.next_session;
                    self.next_session += 1;
                    if reply.send(Ok(id)).is_err() {
                        tracing::debug!(session_id = id, "Capture requester went away");
                    }
                    if !self.run_session(id, &mut commands).await {
                        break;
                    }
                }
                Command::Abandon => tracing::debug!("No active session to abandon"),
                Command::Shutdown => break,
            }
        }

        tracing::info!("Capture worker stopped");
        drop(self);
        if let Err(e) = delivery.await {
            tracing::warn!(error = %e, "Result delivery task failed");
        }
    }

    /// Run one session to its outcome. Returns `false` when the worker
    /// should stop afterwards.
    async fn run_session(
        &self,
        id: SessionId,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> bool {
        let mut session = BracketSession::new(id);
        let mut feed = None;
        let started = self.clock.now_secs();

        let outcome = self.drive(&mut session, &mut feed, commands).await;
        self.stop_motion(&mut feed).await;

        match outcome {
            Ok(result) => {
                if let Err(e) = self.enter(&mut session, SessionState::Complete) {
                    self.fail(&mut session, &e);
                    return true;
                }
                tracing::info!(
                    session_id = id,
                    elapsed_secs = self.clock.now_secs() - started,
                    orientation = result.orientation.is_complete(),
                    "Bracket complete"
                );
                self.sink.on_result(result);
                true
            }
            Err(Interrupt::Failed(error)) => {
                self.fail(&mut session, &error);
                true
            }
            Err(Interrupt::Abandoned { shutdown }) => {
                self.fail(&mut session, &StackError::Cancelled);
                !shutdown
            }
        }
    }

    async fn drive(
        &self,
        session: &mut BracketSession,
        feed: &mut Option<OrientationFeed>,
        commands: &mut mpsc::UnboundedReceiver<Command>,
    ) -> Result<BracketResult, Interrupt> {
        let id = session.id();
        self.enter(session, SessionState::Preparing)?;

        let settings =
            BracketSettings::from_defaults(&self.defaults, self.capture.max_bracket_count())?;
        tracing::info!(
            session_id = id,
            shots = settings.count(),
            biases = ?settings.biases,
            "Prepared exposure bracket"
        );
        session.configure(settings.clone());

        let interval = millis(self.defaults.motion_interval_ms);
        match self.motion.start_orientation_updates(interval).await {
            Ok(samples) => *feed = Some(OrientationFeed::spawn(samples)),
            Err(e) => tracing::warn!(
                session_id = id,
                error = %e,
                "Motion updates unavailable, continuing without orientation"
            ),
        }

        if let Some(feed) = feed.as_ref() {
            let limit = millis(self.defaults.first_sample_timeout_ms);
            let arrived = self
                .guarded(session, commands, feed.wait_for_first_sample(limit))
                .await?;
            if !arrived {
                tracing::warn!(
                    session_id = id,
                    timeout_ms = self.defaults.first_sample_timeout_ms,
                    "No orientation sample before capture"
                );
            }
        }

        let mut frames = self
            .guarded(session, commands, self.capture.begin_bracketed_capture(&settings))
            .await??;
        self.enter(session, SessionState::Capturing)?;

        let frame_limit = millis(self.defaults.frame_timeout_ms);
        while session.outstanding() > 0 {
            let next = self
                .guarded(session, commands, tokio::time::timeout(frame_limit, frames.recv()))
                .await?;
            let frame = match next {
                Ok(Some(Ok(frame))) => frame,
                Ok(Some(Err(error))) => return Err(error.into()),
                Ok(None) => {
                    return Err(StackError::device_unavailable(format!(
                        "capture source closed after {} of {} frames",
                        session.received(),
                        session.expected()
                    ))
                    .into())
                }
                Err(_) => {
                    return Err(StackError::Timeout {
                        what: format!("frame {} of {}", session.received() + 1, session.expected()),
                        millis: self.defaults.frame_timeout_ms,
                    }
                    .into())
                }
            };

            if session.state() == SessionState::Capturing {
                self.enter(session, SessionState::Collecting)?;
            }
            session.accept_frame(frame, self.clock.now_secs())?;
            self.sink
                .on_progress(id, session.received(), session.expected());
        }

        self.enter(session, SessionState::Finalizing)?;
        let (frames, records) = session.take_frames();
        let orientation = self.lookup_orientation(id, feed.as_ref(), &records).await;
        self.stop_motion(feed).await;

        let (original, processed) = self.blend(frames).await?;
        Ok(BracketResult {
            session_id: id,
            original,
            processed,
            orientation,
            frames: records,
        })
    }

    /// Await `fut` while answering commands that arrive in the meantime.
    async fn guarded<F: Future>(
        &self,
        session: &BracketSession,
        commands: &mut mpsc::UnboundedReceiver<Command>,
        fut: F,
    ) -> Result<F::Output, Interrupt> {
        tokio::pin!(fut);
        loop {
            tokio::select! {
                output = &mut fut => return Ok(output),
                command = commands.recv() => {
                    if let Some(interrupt) = self.on_session_command(session, command) {
                        return Err(interrupt);
                    }
                }
            }
        }
    }

    fn on_session_command(
        &self,
        session: &BracketSession,
        command: Option<Command>,
    ) -> Option<Interrupt> {
        let id = session.id();
        match command {
            Some(Command::Capture { reply }) => {
                tracing::warn!(session_id = id, "Capture requested while a session is active");
                let _ = reply.send(Err(StackError::SessionBusy));
                None
            }
            Some(Command::Abandon) if !session.state().is_cancellable() => {
                tracing::debug!(
                    session_id = id,
                    state = %session.state(),
                    "Session can no longer be abandoned"
                );
                None
            }
            Some(Command::Abandon) => {
                tracing::info!(session_id = id, "Session abandoned");
                Some(Interrupt::Abandoned { shutdown: false })
            }
            Some(Command::Shutdown) | None => {
                tracing::info!(session_id = id, "Worker shutting down, abandoning session");
                Some(Interrupt::Abandoned { shutdown: true })
            }
        }
    }

    async fn lookup_orientation(
        &self,
        id: SessionId,
        feed: Option<&OrientationFeed>,
        records: &[FrameRecord],
    ) -> BracketOrientation {
        let (Some(first), Some(last)) = (records.first(), records.last()) else {
            return BracketOrientation::default();
        };
        let Some(feed) = feed else {
            tracing::warn!(session_id = id, "No motion stream, skipping orientation lookup");
            return BracketOrientation::default();
        };

        BracketOrientation {
            first: self.estimate_at(id, feed, first).await,
            last: self.estimate_at(id, feed, last).await,
        }
    }

    async fn estimate_at(
        &self,
        id: SessionId,
        feed: &OrientationFeed,
        record: &FrameRecord,
    ) -> Option<OrientationEstimate> {
        let kind = self.defaults.interpolation;
        let time = record.time;
        feed.wait_until(millis(self.defaults.orientation_wait_ms), |window| {
            window.select(kind, time).is_ok()
        })
        .await;

        match feed.snapshot().estimate(kind, time) {
            Ok(estimate) => {
                let estimate = OrientationEstimate {
                    frame_index: record.index,
                    time,
                    rotation: estimate.value,
                    kind: estimate.kind,
                };
                tracing::debug!(
                    session_id = id,
                    frame = record.index,
                    time,
                    kind = ?estimate.kind,
                    "Orientation estimated"
                );
                self.sink.on_orientation(id, &estimate);
                Some(estimate)
            }
            Err(error) => {
                tracing::warn!(
                    session_id = id,
                    frame = record.index,
                    time,
                    error = %error,
                    "Orientation lookup failed, continuing without it"
                );
                None
            }
        }
    }

    async fn stop_motion(&self, feed: &mut Option<OrientationFeed>) {
        if let Some(feed) = feed.take() {
            feed.stop();
            self.motion.stop_orientation_updates().await;
        }
    }

    /// Decode and median-blend the bracket off the async runtime.
    async fn blend(&self, frames: Vec<CaptureFrame>) -> StackResult<(RgbaImage, RgbaImage)> {
        let kernel = Arc::clone(&self.kernel);
        tokio::task::spawn_blocking(move || -> StackResult<(RgbaImage, RgbaImage)> {
            let mut blend = MultiImageBlend::with_kernel(frames.len(), kernel)?;
            let mut original = None;
            for (index, frame) in frames.iter().enumerate() {
                let image = decode_frame(index, frame)?;
                if original.is_none() {
                    original = Some(image.clone());
                }
                blend.push(image)?;
            }
            let processed = blend.blend()?;
            let original = original.ok_or(StackError::BlendNotReady {
                expected: frames.len(),
                received: 0,
            })?;
            Ok((original, processed))
        })
        .await
        .map_err(|e| StackError::Other(anyhow::anyhow!("blend task failed: {e}")))?
    }

    fn enter(&self, session: &mut BracketSession, state: SessionState) -> StackResult<()> {
        session.transition(state)?;
        self.sink.on_state(session.id(), state);
        Ok(())
    }

    fn fail(&self, session: &mut BracketSession, error: &StackError) {
        if session.state().is_terminal() {
            tracing::debug!(session_id = session.id(), error = %error, "Session already ended");
            return;
        }
        if session.state().can_transition_to(SessionState::Failed) {
            if let Err(e) = self.enter(session, SessionState::Failed) {
                tracing::debug!(error = %e, "Failed state not recorded");
            }
        }
        session.discard();

        let failure = SessionFailure::from_error(session.id(), error);
        tracing::warn!(
            session_id = failure.session_id,
            reason = %failure.reason,
            error = %error,
            "Bracket failed"
        );
        self.sink.on_failure(failure);
    }
}

/// Hand queued session events to `sink` in order.
async fn deliver(sink: Arc<dyn ResultSink>, mut outbox: mpsc::UnboundedReceiver<SessionEvent>) {
    while let Some(event) = outbox.recv().await {
        event.deliver(sink.as_ref());
    }
}
