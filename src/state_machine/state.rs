//! Session state types

use serde::{Deserialize, Serialize};

/// Session state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionState {
    /// Ready for input, no gateway call outstanding
    #[default]
    Idle,

    /// A gateway call is in flight for the given session generation
    Submitting { generation: u64 },

    /// Ready for input; the last submission failed with `message`
    Failed { message: String },
}

impl SessionState {
    /// True while a gateway call is outstanding
    pub fn is_pending(&self) -> bool {
        matches!(self, SessionState::Submitting { .. })
    }

    pub fn last_error(&self) -> Option<&str> {
        match self {
            SessionState::Failed { message } => Some(message),
            _ => None,
        }
    }
}

/// Context the transition function reads but never changes
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub session_id: String,
    /// Bumped on every reset; gateway results tagged with an older value
    /// are stale
    pub generation: u64,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            generation: 0,
        }
    }
}
