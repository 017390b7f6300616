//! Session executor

use super::{ExchangeOutcome, SessionError, SessionEvent, SessionSnapshot};
use crate::gateway::{Gateway, CONVERSE_FALLBACK_MESSAGE};
use crate::state_machine::{transition, Effect, Event, SessionContext, SessionState};
use crate::transcript::{TranscriptStore, Turn};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

const DEFAULT_EVENT_CAPACITY: usize = 128;

/// Everything guarded by the session lock
struct SessionCore {
    context: SessionContext,
    state: SessionState,
    transcript: TranscriptStore,
}

/// Work handed from the synchronous submit step to the gateway task
struct PendingExchange {
    query: String,
    history: Vec<Turn>,
    generation: u64,
}

/// What executing one transition's effects produced
#[derive(Default)]
struct Applied {
    exchange: Option<PendingExchange>,
    appended: Option<Turn>,
    discarded: bool,
}

/// Conversation session over a gateway.
///
/// Cloning yields another handle to the same session. State changes happen
/// under one lock and never span an await, so each transition and its
/// effects are atomic with respect to other calls. The lock is released for
/// the duration of the gateway round trip.
pub struct SessionManager<G> {
    gateway: Arc<G>,
    core: Arc<Mutex<SessionCore>>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    session_id: Arc<str>,
}

impl<G> Clone for SessionManager<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            core: Arc::clone(&self.core),
            broadcast_tx: self.broadcast_tx.clone(),
            session_id: Arc::clone(&self.session_id),
        }
    }
}

impl<G: Gateway + 'static> SessionManager<G> {
    pub fn new(gateway: G) -> Self {
        Self::with_event_capacity(gateway, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(gateway: G, capacity: usize) -> Self {
        let session_id: Arc<str> = uuid::Uuid::new_v4().to_string().into();
        let (broadcast_tx, _) = broadcast::channel(capacity.max(1));

        tracing::info!(session_id = %session_id, "Session created");

        Self {
            gateway: Arc::new(gateway),
            core: Arc::new(Mutex::new(SessionCore {
                context: SessionContext::new(&*session_id),
                state: SessionState::Idle,
                transcript: TranscriptStore::new(),
            })),
            broadcast_tx,
            session_id,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Receive every turn append, state change and reset from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        let core = self.core.lock().await;
        SessionSnapshot {
            transcript: core.transcript.snapshot(),
            pending: core.state.is_pending(),
            last_error: core.state.last_error().map(str::to_string),
        }
    }

    /// Submit a question and wait for the exchange to finish.
    ///
    /// The user turn is committed before this yields. The gateway call runs
    /// on its own task, so dropping the returned future does not abandon
    /// the exchange: its result is still applied (or discarded after a
    /// reset).
    pub async fn submit(&self, text: &str) -> Result<ExchangeOutcome, SessionError> {
        let exchange = {
            let mut core = self.core.lock().await;
            self.dispatch(&mut core, Event::submit(text))?
                .exchange
                .ok_or_else(|| {
                    SessionError::InvalidTransition("submission started no exchange".to_string())
                })?
        };

        tracing::info!(
            session_id = %self.session_id,
            generation = exchange.generation,
            history_len = exchange.history.len(),
            "Submitting query"
        );

        let generation = exchange.generation;
        let manager = self.clone();
        let task = tokio::spawn(async move { manager.run_exchange(exchange).await });
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(
                    session_id = %self.session_id,
                    generation,
                    error = %e,
                    "Exchange task failed"
                );
                // Settle the exchange so the session does not stay pending
                let mut core = self.core.lock().await;
                let settled = Event::ExchangeFailed {
                    generation,
                    detail: None,
                };
                if let Err(err) = self.dispatch(&mut core, settled) {
                    tracing::debug!(session_id = %self.session_id, error = %err, "Exchange already settled");
                }
                Err(SessionError::TaskFailed(e.to_string()))
            }
        }
    }

    /// Drop all turns and any error. An in-flight exchange keeps running but
    /// its result will be discarded.
    pub async fn reset(&self) {
        let mut core = self.core.lock().await;
        match self.dispatch(&mut core, Event::Reset) {
            Ok(_) => {
                tracing::info!(
                    session_id = %self.session_id,
                    generation = core.context.generation,
                    "Session reset"
                );
            }
            Err(e) => {
                tracing::error!(session_id = %self.session_id, error = %e, "Reset rejected");
            }
        }
    }

    async fn run_exchange(&self, exchange: PendingExchange) -> Result<ExchangeOutcome, SessionError> {
        let PendingExchange {
            query,
            history,
            generation,
        } = exchange;

        // A panicking gateway must still produce a completion
        let gateway = Arc::clone(&self.gateway);
        let call = tokio::spawn(async move { gateway.converse(&query, &history).await });

        let event = match call.await {
            Err(e) => {
                tracing::error!(
                    session_id = %self.session_id,
                    generation,
                    error = %e,
                    "Gateway call did not complete"
                );
                Event::ExchangeFailed {
                    generation,
                    detail: None,
                }
            }
            Ok(Ok(reply)) => Event::ExchangeSucceeded {
                generation,
                answer: reply.answer,
                citations: reply.citations,
            },
            Ok(Err(e)) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    generation,
                    kind = ?e.kind,
                    error = %e,
                    "Exchange failed"
                );
                Event::ExchangeFailed {
                    generation,
                    detail: e.detail,
                }
            }
        };

        let mut core = self.core.lock().await;
        let applied = self.dispatch(&mut core, event)?;

        Ok(if applied.discarded {
            ExchangeOutcome::Discarded
        } else if let Some(turn) = applied.appended {
            ExchangeOutcome::Answered(turn)
        } else {
            ExchangeOutcome::Failed {
                message: core
                    .state
                    .last_error()
                    .unwrap_or(CONVERSE_FALLBACK_MESSAGE)
                    .to_string(),
            }
        })
    }

    /// Run one transition and execute its effects under the caller's lock
    fn dispatch(&self, core: &mut SessionCore, event: Event) -> Result<Applied, SessionError> {
        let result = transition(&core.state, &core.context, event)?;

        if result.new_state != core.state {
            tracing::debug!(
                session_id = %self.session_id,
                from = ?core.state,
                to = ?result.new_state,
                "State transition"
            );
        }
        core.state = result.new_state;

        let mut applied = Applied::default();
        for effect in result.effects {
            self.execute_effect(core, effect, &mut applied);
        }
        Ok(applied)
    }

    fn execute_effect(&self, core: &mut SessionCore, effect: Effect, applied: &mut Applied) {
        match effect {
            Effect::BeginExchange { turn, generation } => {
                // History is exactly what was committed before this turn
                let history = core.transcript.snapshot();
                let query = turn.content().to_string();
                core.transcript.append(turn.clone());
                let _ = self.broadcast_tx.send(SessionEvent::TurnAppended { turn });
                applied.exchange = Some(PendingExchange {
                    query,
                    history,
                    generation,
                });
            }

            Effect::AppendTurn { turn } => {
                core.transcript.append(turn.clone());
                let _ = self
                    .broadcast_tx
                    .send(SessionEvent::TurnAppended { turn: turn.clone() });
                applied.appended = Some(turn);
            }

            Effect::ClearTranscript => {
                core.transcript.clear();
                let _ = self.broadcast_tx.send(SessionEvent::Cleared);
            }

            Effect::AdvanceGeneration => {
                core.context.generation += 1;
            }

            Effect::DiscardResult { generation } => {
                tracing::info!(
                    session_id = %self.session_id,
                    stale_generation = generation,
                    current_generation = core.context.generation,
                    "Discarding result from before reset"
                );
                applied.discarded = true;
            }

            Effect::NotifyStateChange => {
                let _ = self
                    .broadcast_tx
                    .send(SessionEvent::state_changed(&core.state));
            }
        }
    }
}
