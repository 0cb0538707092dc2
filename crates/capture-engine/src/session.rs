//! Bracket session state and result delivery.

use image::RgbaImage;
use serde::Serialize;
use steadystack_common::config::InterpolationKind;
use steadystack_common::error::{FailureReason, StackError, StackResult};
use steadystack_sample_model::{CaptureFrame, FrameRecord, RotationMatrix, SessionState};
use tokio::sync::mpsc;

use crate::source::BracketSettings;

/// Identifies one bracket session within a worker's lifetime.
pub type SessionId = u64;

/// Orientation reconstructed at one frame's capture instant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OrientationEstimate {
    /// Position of the frame within the bracket.
    pub frame_index: usize,
    /// Capture time of the frame.
    pub time: f64,
    pub rotation: RotationMatrix,
    /// Strategy that produced the estimate.
    pub kind: InterpolationKind,
}

/// Orientation at the bracket's first and last frame.
///
/// Either side is `None` when its lookup failed; that never fails the session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BracketOrientation {
    pub first: Option<OrientationEstimate>,
    pub last: Option<OrientationEstimate>,
}

impl BracketOrientation {
    /// Rotation carrying the first frame's attitude onto the last's.
    ///
    /// This is the counter-rotation an aligner would apply to the last
    /// frame before blending. Not re-orthonormalized.
    pub fn relative_rotation(&self) -> Option<RotationMatrix> {
        let first = self.first?;
        let last = self.last?;
        Some(first.rotation.relative_to(&last.rotation))
    }

    pub fn is_complete(&self) -> bool {
        self.first.is_some() && self.last.is_some()
    }
}

/// Everything a completed session delivers.
#[derive(Clone)]
pub struct BracketResult {
    pub session_id: SessionId,
    /// The first captured frame, decoded.
    pub original: RgbaImage,
    /// Median blend of every frame in the bracket.
    pub processed: RgbaImage,
    pub orientation: BracketOrientation,
    pub frames: Vec<FrameRecord>,
}

impl std::fmt::Debug for BracketResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BracketResult")
            .field("session_id", &self.session_id)
            .field("original", &self.original.dimensions())
            .field("processed", &self.processed.dimensions())
            .field("orientation", &self.orientation)
            .field("frames", &self.frames)
            .finish()
    }
}

/// A session that ended without a result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionFailure {
    pub session_id: SessionId,
    pub reason: FailureReason,
    pub message: String,
}

impl SessionFailure {
    pub fn from_error(session_id: SessionId, error: &StackError) -> Self {
        Self {
            session_id,
            reason: error.reason(),
            message: error.to_string(),
        }
    }
}

/// Receives session progress and exactly one outcome per session.
///
/// The capture worker never calls a sink directly: events reach it in order
/// on a separate delivery task, so a slow sink cannot stall frame collection.
pub trait ResultSink: Send + Sync {
    fn on_state(&self, _session_id: SessionId, _state: SessionState) {}

    fn on_progress(&self, _session_id: SessionId, _received: usize, _expected: usize) {}

    fn on_orientation(&self, _session_id: SessionId, _estimate: &OrientationEstimate) {}

    /// The session completed.
    fn on_result(&self, result: BracketResult);

    /// The session failed or was abandoned.
    fn on_failure(&self, failure: SessionFailure);
}

/// Events forwarded by [`ChannelSink`].
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged {
        session_id: SessionId,
        state: SessionState,
    },
    Progress {
        session_id: SessionId,
        received: usize,
        expected: usize,
    },
    OrientationReady {
        session_id: SessionId,
        estimate: OrientationEstimate,
    },
    Complete(Box<BracketResult>),
    Failed(SessionFailure),
}

impl SessionEvent {
    /// Whether this event ends its session.
    pub fn is_outcome(&self) -> bool {
        matches!(self, SessionEvent::Complete(_) | SessionEvent::Failed(_))
    }

    /// Invoke the matching `sink` callback.
    pub fn deliver(self, sink: &dyn ResultSink) {
        match self {
            SessionEvent::StateChanged { session_id, state } => sink.on_state(session_id, state),
            SessionEvent::Progress {
                session_id,
                received,
                expected,
            } => sink.on_progress(session_id, received, expected),
            SessionEvent::OrientationReady {
                session_id,
                estimate,
            } => sink.on_orientation(session_id, &estimate),
            SessionEvent::Complete(result) => sink.on_result(*result),
            SessionEvent::Failed(failure) => sink.on_failure(failure),
        }
    }
}

/// Sink that forwards every callback onto an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events }, rx)
    }

    fn forward(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Session event receiver dropped");
        }
    }
}

impl ResultSink for ChannelSink {
    fn on_state(&self, session_id: SessionId, state: SessionState) {
        self.forward(SessionEvent::StateChanged { session_id, state });
    }

    fn on_progress(&self, session_id: SessionId, received: usize, expected: usize) {
        self.forward(SessionEvent::Progress {
            session_id,
            received,
            expected,
        });
    }

    fn on_orientation(&self, session_id: SessionId, estimate: &OrientationEstimate) {
        self.forward(SessionEvent::OrientationReady {
            session_id,
            estimate: *estimate,
        });
    }

    fn on_result(&self, result: BracketResult) {
        self.forward(SessionEvent::Complete(Box::new(result)));
    }

    fn on_failure(&self, failure: SessionFailure) {
        self.forward(SessionEvent::Failed(failure));
    }
}

/// Live state of one bracket, owned by the capture worker.
#[derive(Debug)]
pub struct BracketSession {
    id: SessionId,
    state: SessionState,
    settings: Option<BracketSettings>,
    frames: Vec<CaptureFrame>,
    records: Vec<FrameRecord>,
}

impl BracketSession {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            state: SessionState::Idle,
            settings: None,
            frames: Vec::new(),
            records: Vec::new(),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn settings(&self) -> Option<&BracketSettings> {
        self.settings.as_ref()
    }

    /// Move to `next`, rejecting transitions the lifecycle forbids.
    pub fn transition(&mut self, next: SessionState) -> StackResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(StackError::capture(format!(
                "session {} cannot move from {} to {}",
                self.id, self.state, next
            )));
        }
        tracing::info!(session_id = self.id, from = %self.state, to = %next, "Session state changed");
        self.state = next;
        Ok(())
    }

    /// Fix the bracket settings while preparing.
    pub fn configure(&mut self, settings: BracketSettings) {
        self.frames = Vec::with_capacity(settings.count());
        self.records = Vec::with_capacity(settings.count());
        self.settings = Some(settings);
    }

    pub fn expected(&self) -> usize {
        self.settings.as_ref().map_or(0, BracketSettings::count)
    }

    pub fn received(&self) -> usize {
        self.frames.len()
    }

    /// Frames still to arrive.
    pub fn outstanding(&self) -> usize {
        self.expected().saturating_sub(self.frames.len())
    }

    /// Buffer an arriving frame and return the outstanding count.
    ///
    /// The first frame moves the session from Capturing to Collecting.
    /// A frame with no payload is rejected as an invalid buffer.
    pub fn accept_frame(&mut self, frame: CaptureFrame, arrival_secs: f64) -> StackResult<usize> {
        let index = self.frames.len();
        if self.outstanding() == 0 {
            return Err(StackError::capture(format!(
                "unexpected frame {index} for a bracket of {}",
                self.expected()
            )));
        }
        if frame.is_empty() {
            return Err(StackError::buffer_invalid(index, "capture buffer is empty"));
        }
        if self.state == SessionState::Capturing {
            self.transition(SessionState::Collecting)?;
        }

        let bias = self
            .settings
            .as_ref()
            .and_then(|s| s.biases.get(index).copied())
            .unwrap_or_default();
        self.records.push(FrameRecord {
            index,
            time: frame.time,
            bias,
            arrival_secs,
        });
        tracing::debug!(
            session_id = self.id,
            frame = index,
            time = frame.time,
            %bias,
            "Frame received"
        );
        self.frames.push(frame);
        Ok(self.outstanding())
    }

    pub fn frames(&self) -> &[CaptureFrame] {
        &self.frames
    }

    pub fn records(&self) -> &[FrameRecord] {
        &self.records
    }

    /// Hand the buffered frames to finalization.
    pub fn take_frames(&mut self) -> (Vec<CaptureFrame>, Vec<FrameRecord>) {
        (
            std::mem::take(&mut self.frames),
            std::mem::take(&mut self.records),
        )
    }

    /// Drop all partial state.
    pub fn discard(&mut self) {
        self.frames = Vec::new();
        self.records = Vec::new();
    }
}
