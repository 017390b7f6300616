//! Events that can occur in a session

use crate::transcript::Citation;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    Submit {
        text: String,
    },
    Reset,

    // Gateway events, tagged with the generation the call started under
    ExchangeSucceeded {
        generation: u64,
        answer: String,
        citations: Vec<Citation>,
    },
    ExchangeFailed {
        generation: u64,
        /// Backend-provided explanation, if it sent one
        detail: Option<String>,
    },
}

impl Event {
    pub fn submit(text: impl Into<String>) -> Self {
        Event::Submit { text: text.into() }
    }

    /// Generation tag of a gateway completion; `None` for user events
    pub fn generation(&self) -> Option<u64> {
        match self {
            Event::ExchangeSucceeded { generation, .. } | Event::ExchangeFailed { generation, .. } => {
                Some(*generation)
            }
            Event::Submit { .. } | Event::Reset => None,
        }
    }
}
