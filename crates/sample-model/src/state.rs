//! Bracket session lifecycle.

use serde::{Deserialize, Serialize};

/// State of one bracketed-capture session.
///
/// ```text
/// Idle → Preparing → Capturing → Collecting → Finalizing → Complete
///            │           │            │            │
///            └───────────┴────────────┴────────────┴──→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No capture requested yet.
    Idle,
    /// Building exposure-bracket settings.
    Preparing,
    /// Device asked to emit frames; motion stream filling the window.
    Capturing,
    /// At least one frame received, more outstanding.
    Collecting,
    /// All frames in; orientation lookup and blend running.
    Finalizing,
    /// Result delivered.
    Complete,
    /// Session abandoned or failed; partial state discarded.
    Failed,
}

impl SessionState {
    /// Whether the lifecycle permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Idle, Preparing)
                | (Preparing, Capturing)
                | (Capturing, Collecting)
                | (Collecting, Finalizing)
                | (Finalizing, Complete)
                | (Preparing | Capturing | Collecting | Finalizing, Failed)
        )
    }

    /// Complete and Failed end the session.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Complete | SessionState::Failed)
    }

    /// A session can be abandoned until finalization begins.
    pub fn is_cancellable(self) -> bool {
        matches!(
            self,
            SessionState::Preparing | SessionState::Capturing | SessionState::Collecting
        )
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            SessionState::Idle => "idle",
            SessionState::Preparing => "preparing",
            SessionState::Capturing => "capturing",
            SessionState::Collecting => "collecting",
            SessionState::Finalizing => "finalizing",
            SessionState::Complete => "complete",
            SessionState::Failed => "failed",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            SessionState::Idle,
            SessionState::Preparing,
            SessionState::Capturing,
            SessionState::Collecting,
            SessionState::Finalizing,
            SessionState::Complete,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_failure_reachable_from_active_states() {
        for state in [
            SessionState::Preparing,
            SessionState::Capturing,
            SessionState::Collecting,
            SessionState::Finalizing,
        ] {
            assert!(state.can_transition_to(SessionState::Failed));
        }
        assert!(!SessionState::Idle.can_transition_to(SessionState::Failed));
        assert!(!SessionState::Complete.can_transition_to(SessionState::Failed));
    }

    #[test]
    fn test_no_skipping_states() {
        assert!(!SessionState::Capturing.can_transition_to(SessionState::Finalizing));
        assert!(!SessionState::Idle.can_transition_to(SessionState::Complete));
        assert!(!SessionState::Finalizing.can_transition_to(SessionState::Collecting));
    }

    #[test]
    fn test_finalizing_not_cancellable() {
        assert!(SessionState::Collecting.is_cancellable());
        assert!(!SessionState::Finalizing.is_cancellable());
        assert!(SessionState::Failed.is_terminal());
    }
}
