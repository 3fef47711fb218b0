//! Capture session state machine.
//!
//! Enforces valid state transitions for the capture lifecycle:
//! - Idle -> Starting (start signal accepted, recognizer being opened)
//! - Starting -> Listening (recognizer ready)
//! - Starting -> Finishing (terminated before the recognizer became ready)
//! - Listening -> Finishing (final result, error, deadline, or stop)
//! - Finishing -> Idle (result persisted, status published)

use std::fmt;

use tokio::sync::watch;

use voxdrop_core::error::VoxdropError;

/// Operational state of the session controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No session. Ready to start.
    #[default]
    Idle,
    /// Session allocated, waiting for the recognizer to become ready.
    Starting,
    /// Recognizer is capturing speech.
    Listening,
    /// Session is being torn down and its result persisted.
    Finishing,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Starting => write!(f, "Starting"),
            SessionState::Listening => write!(f, "Listening"),
            SessionState::Finishing => write!(f, "Finishing"),
        }
    }
}

impl SessionState {
    /// Returns whether a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &SessionState) -> bool {
        matches!(
            (self, target),
            (SessionState::Idle, SessionState::Starting)
                | (SessionState::Starting, SessionState::Listening)
                | (SessionState::Starting, SessionState::Finishing)
                | (SessionState::Listening, SessionState::Finishing)
                | (SessionState::Finishing, SessionState::Idle)
        )
    }

    /// Whether a session exists in this state.
    pub fn is_active(&self) -> bool {
        !matches!(self, SessionState::Idle)
    }
}

/// State machine owned by the controller task.
///
/// Every accepted transition is published on a watch channel, so observers
/// always see the latest state without sharing a lock with the controller.
#[derive(Debug)]
pub struct StateMachine {
    state: watch::Sender<SessionState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Create a new state machine initialized to `Idle`.
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::Idle);
        Self { state }
    }

    /// Returns the current state.
    pub fn current(&self) -> SessionState {
        *self.state.borrow()
    }

    /// A receiver that observes every published state.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Attempt to transition to the target state.
    ///
    /// Returns a `VoxdropError::Session` if the transition is not allowed from
    /// the current state; the state is left unchanged in that case.
    pub fn transition(&self, target: SessionState) -> Result<(), VoxdropError> {
        let current = self.current();
        if current.can_transition_to(&target) {
            tracing::debug!("Session state: {} -> {}", current, target);
            self.state.send_replace(target);
            Ok(())
        } else {
            Err(VoxdropError::Session(format!(
                "Invalid state transition: {} -> {}",
                current, target
            )))
        }
    }

    /// Force the state machine back to Idle (used for error recovery).
    pub fn reset(&self) {
        let previous = self.state.send_replace(SessionState::Idle);
        if previous != SessionState::Idle {
            tracing::warn!("Session state machine reset to Idle from {}", previous);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
