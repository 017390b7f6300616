//! Conversation session management
//!
//! Owns the transcript and session state, runs the pure state machine, and
//! executes its effects against a [`Gateway`](crate::gateway::Gateway).
//!
//! Concurrency policy: one exchange at a time. A submission made while
//! another is pending is rejected with [`SessionError::Busy`]; nothing is
//! queued.

mod manager;

#[cfg(test)]
pub mod testing;

pub use manager::SessionManager;

use crate::state_machine::{SessionState, TransitionError};
use crate::transcript::Turn;
use serde::Serialize;
use thiserror::Error;

/// Events sent to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A turn was committed to the transcript
    TurnAppended { turn: Turn },
    /// Pending flag or last error changed
    StateChanged {
        pending: bool,
        last_error: Option<String>,
    },
    /// The transcript was emptied by a reset
    Cleared,
}

impl SessionEvent {
    pub(crate) fn state_changed(state: &SessionState) -> Self {
        SessionEvent::StateChanged {
            pending: state.is_pending(),
            last_error: state.last_error().map(str::to_string),
        }
    }
}

/// Point-in-time copy of everything a renderer needs
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub transcript: Vec<Turn>,
    pub pending: bool,
    pub last_error: Option<String>,
}

/// How a submitted exchange ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExchangeOutcome {
    /// The assistant turn that was appended
    Answered(Turn),
    /// The gateway failed; `message` is now the session's last error
    Failed { message: String },
    /// The session was reset while the call was in flight; result ignored
    Discarded,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// Blank input; nothing happened
    #[error("Message cannot be empty")]
    EmptyQuery,
    /// Another submission is still pending
    #[error("A request is already in progress")]
    Busy,
    #[error("Invalid session transition: {0}")]
    InvalidTransition(String),
    #[error("Exchange task failed: {0}")]
    TaskFailed(String),
}

impl From<TransitionError> for SessionError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::EmptyQuery => SessionError::EmptyQuery,
            TransitionError::Busy => SessionError::Busy,
            TransitionError::InvalidTransition(msg) => SessionError::InvalidTransition(msg),
        }
    }
}
