//! Effects produced by state transitions

use crate::transcript::Turn;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Snapshot the transcript, append `turn`, then call the gateway with
    /// the snapshot as history. All three happen without yielding.
    BeginExchange { turn: Turn, generation: u64 },

    /// Append a turn to the transcript
    AppendTurn { turn: Turn },

    /// Drop every turn
    ClearTranscript,

    /// Move the session to a new generation so in-flight results go stale
    AdvanceGeneration,

    /// A gateway result arrived for an older generation and was ignored
    DiscardResult { generation: u64 },

    /// Notify subscribers of the new pending/error state
    NotifyStateChange,
}

impl Effect {
    pub fn begin_exchange(query: impl Into<String>, generation: u64) -> Self {
        Effect::BeginExchange {
            turn: Turn::user(query),
            generation,
        }
    }

    pub fn append_turn(turn: Turn) -> Self {
        Effect::AppendTurn { turn }
    }
}
