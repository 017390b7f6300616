//! Pure state transition function

use super::{Effect, Event, SessionContext, SessionState};
use crate::gateway::CONVERSE_FALLBACK_MESSAGE;
use crate::transcript::Turn;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message cannot be empty")]
    EmptyQuery,
    #[error("A request is already in progress")]
    Busy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
pub fn transition(
    state: &SessionState,
    context: &SessionContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    // Results from before the last reset are dropped no matter what state
    // the session is in now.
    if let Some(generation) = event.generation() {
        if generation != context.generation {
            return Ok(TransitionResult::new(state.clone())
                .with_effect(Effect::DiscardResult { generation }));
        }
    }

    match (state, event) {
        // ============================================================
        // Submission
        // ============================================================

        // Blank input is ignored in every state
        (_, Event::Submit { text }) if text.trim().is_empty() => Err(TransitionError::EmptyQuery),

        // Idle/Failed + Submit -> Submitting (clears any previous error)
        (SessionState::Idle | SessionState::Failed { .. }, Event::Submit { text }) => {
            let generation = context.generation;
            Ok(TransitionResult::new(SessionState::Submitting { generation })
                .with_effect(Effect::begin_exchange(text.trim(), generation))
                .with_effect(Effect::NotifyStateChange))
        }

        // One exchange at a time
        (SessionState::Submitting { .. }, Event::Submit { .. }) => Err(TransitionError::Busy),

        // ============================================================
        // Gateway completion
        // ============================================================

        (SessionState::Submitting { .. }, Event::ExchangeSucceeded { answer, citations, .. }) => {
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::append_turn(Turn::assistant(answer, citations)))
                .with_effect(Effect::NotifyStateChange))
        }

        (SessionState::Submitting { .. }, Event::ExchangeFailed { detail, .. }) => {
            let message = detail
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| CONVERSE_FALLBACK_MESSAGE.to_string());
            Ok(TransitionResult::new(SessionState::Failed { message })
                .with_effect(Effect::NotifyStateChange))
        }

        (
            SessionState::Idle | SessionState::Failed { .. },
            Event::ExchangeSucceeded { generation, .. } | Event::ExchangeFailed { generation, .. },
        ) => Err(TransitionError::InvalidTransition(format!(
            "gateway result for generation {generation} with no submission in flight"
        ))),

        // ============================================================
        // Reset
        // ============================================================

        (_, Event::Reset) => Ok(TransitionResult::new(SessionState::Idle).with_effects([
            Effect::ClearTranscript,
            Effect::AdvanceGeneration,
            Effect::NotifyStateChange,
        ])),
    }
}
