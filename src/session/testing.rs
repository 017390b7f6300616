//! Mock gateways for testing
//!
//! These mocks enable session testing without real I/O.

use crate::gateway::{ConverseReply, Gateway, GatewayError};
use crate::transcript::{Citation, Turn};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

// ============================================================================
// Mock Gateway
// ============================================================================

/// A recorded `converse` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub query: String,
    pub history: Vec<Turn>,
}

/// Mock gateway that returns queued responses
#[allow(dead_code)]
pub struct MockGateway {
    responses: Mutex<VecDeque<Result<ConverseReply, GatewayError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<RecordedRequest>>,
}

#[allow(dead_code)]
impl MockGateway {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful response
    pub fn queue_answer(&self, answer: impl Into<String>, citations: Vec<Citation>) {
        self.responses.lock().unwrap().push_back(Ok(ConverseReply {
            answer: answer.into(),
            citations,
        }));
    }

    /// Queue an error response
    pub fn queue_error(&self, error: GatewayError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_response(&self, query: &str, history: &[Turn]) -> Result<ConverseReply, GatewayError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            query: query.to_string(),
            history: history.to_vec(),
        });
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::network("No mock response queued")))
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Gateway for MockGateway {
    async fn converse(&self, query: &str, history: &[Turn]) -> Result<ConverseReply, GatewayError> {
        self.next_response(query, history)
    }
}

// ============================================================================
// Gated Mock Gateway (for in-flight testing)
// ============================================================================

/// Mock gateway that holds each request until the test releases it
pub struct GatedMockGateway {
    inner: MockGateway,
    /// Signalled when a request reaches the gateway
    pub request_started: Arc<Notify>,
    /// Signal to let one held request complete
    pub release: Arc<Notify>,
}

impl GatedMockGateway {
    pub fn new() -> Self {
        Self {
            inner: MockGateway::new(),
            request_started: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        }
    }

    pub fn queue_answer(&self, answer: impl Into<String>, citations: Vec<Citation>) {
        self.inner.queue_answer(answer, citations);
    }

    pub fn recorded_requests(&self) -> Vec<RecordedRequest> {
        self.inner.recorded_requests()
    }
}

#[async_trait]
impl Gateway for GatedMockGateway {
    async fn converse(&self, query: &str, history: &[Turn]) -> Result<ConverseReply, GatewayError> {
        // notify_one stores a permit, so the test may wait after we signal
        self.request_started.notify_one();
        self.release.notified().await;
        self.inner.next_response(query, history)
    }
}

// ============================================================================
// Crashing Mock Gateway
// ============================================================================

/// Mock gateway that panics on its first `panics` calls, then answers from
/// its queue
pub struct CrashingMockGateway {
    inner: MockGateway,
    panics_left: AtomicUsize,
}

impl CrashingMockGateway {
    pub fn new(panics: usize) -> Self {
        Self {
            inner: MockGateway::new(),
            panics_left: AtomicUsize::new(panics),
        }
    }

    pub fn queue_answer(&self, answer: impl Into<String>, citations: Vec<Citation>) {
        self.inner.queue_answer(answer, citations);
    }
}

#[async_trait]
impl Gateway for CrashingMockGateway {
    async fn converse(&self, query: &str, history: &[Turn]) -> Result<ConverseReply, GatewayError> {
        let crash = self
            .panics_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        assert!(!crash, "gateway crashed");
        self.inner.next_response(query, history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::CONVERSE_FALLBACK_MESSAGE;
    use crate::session::{ExchangeOutcome, SessionError, SessionEvent, SessionManager};
    use crate::transcript::Role;
    use std::time::Duration;
    use tokio::sync::broadcast;

    const WAIT: Duration = Duration::from_secs(2);

    async fn wait_started(gateway: &GatedMockGateway) {
        tokio::time::timeout(WAIT, gateway.request_started.notified())
            .await
            .expect("gateway request should start");
    }

    async fn next_event(rx: &mut broadcast::Receiver<SessionEvent>) -> SessionEvent {
        tokio::time::timeout(WAIT, rx.recv())
            .await
            .expect("event should arrive")
            .expect("channel open")
    }

    #[tokio::test]
    async fn test_mock_gateway() {
        let gateway = MockGateway::new();
        gateway.queue_answer("Hello!", vec![]);

        let reply = gateway.converse("Hi", &[]).await.unwrap();
        assert_eq!(reply.answer, "Hello!");

        let requests = gateway.recorded_requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query, "Hi");

        let err = gateway.converse("again", &[]).await.unwrap_err();
        assert_eq!(err.message, "No mock response queued");
    }

    /// Integration test: the refund-policy exchange end to end
    #[tokio::test]
    async fn test_refund_policy_scenario() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_answer(
            "Refunds are available within 30 days.",
            vec![Citation::new("policy.pdf", 3)],
        );
        let session = SessionManager::new(gateway.clone());

        let outcome = session.submit("What is the refund policy?").await.unwrap();

        let expected_answer = Turn::assistant(
            "Refunds are available within 30 days.",
            vec![Citation::new("policy.pdf", 3)],
        );
        assert_eq!(outcome, ExchangeOutcome::Answered(expected_answer.clone()));

        let snapshot = session.snapshot().await;
        assert_eq!(
            snapshot.transcript,
            vec![Turn::user("What is the refund policy?"), expected_answer]
        );
        assert!(!snapshot.pending);
        assert_eq!(snapshot.last_error, None);

        let requests = gateway.recorded_requests();
        assert_eq!(requests[0].query, "What is the refund policy?");
        assert!(requests[0].history.is_empty());
    }

    #[tokio::test]
    async fn test_successive_submissions_alternate_and_carry_history() {
        let gateway = Arc::new(MockGateway::new());
        for i in 0..4 {
            gateway.queue_answer(format!("answer {i}"), vec![Citation::new("doc.pdf", i + 1)]);
        }
        let session = SessionManager::new(gateway.clone());

        for i in 0..4 {
            session.submit(&format!("  question {i} ")).await.unwrap();
        }

        let transcript = session.snapshot().await.transcript;
        assert_eq!(transcript.len(), 8);
        for (i, turn) in transcript.iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(turn.role(), expected, "turn {i}");
        }
        assert_eq!(transcript[0].content(), "question 0");

        // Submission N sees exactly the 2(N-1) turns committed before it
        let requests = gateway.recorded_requests();
        for (n, request) in requests.iter().enumerate() {
            assert_eq!(request.query, format!("question {n}"));
            assert_eq!(request.history.as_slice(), &transcript[..2 * n]);
        }
    }

    #[tokio::test]
    async fn test_blank_submission_is_ignored() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_error(GatewayError::status(500, None));
        let session = SessionManager::new(gateway.clone());
        let _ = session.submit("first").await.unwrap();
        let before = session.snapshot().await;

        let err = session.submit("   \n\t").await.unwrap_err();

        assert_eq!(err, SessionError::EmptyQuery);
        assert_eq!(session.snapshot().await, before);
        assert_eq!(gateway.recorded_requests().len(), 1);
    }

    #[tokio::test]
    async fn test_gateway_500_without_detail_sets_fallback() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_error(GatewayError::status(500, None));
        let session = SessionManager::new(gateway);

        let outcome = session.submit("Will this work?").await.unwrap();

        assert_eq!(
            outcome,
            ExchangeOutcome::Failed {
                message: CONVERSE_FALLBACK_MESSAGE.to_string()
            }
        );
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.transcript, vec![Turn::user("Will this work?")]);
        assert!(!snapshot.pending);
        assert_eq!(snapshot.last_error.as_deref(), Some(CONVERSE_FALLBACK_MESSAGE));
    }

    #[tokio::test]
    async fn test_gateway_panic_settles_exchange() {
        let gateway = Arc::new(CrashingMockGateway::new(1));
        gateway.queue_answer("recovered", vec![]);
        let session = SessionManager::new(gateway);
        let mut rx = session.subscribe();

        let outcome = session.submit("first").await.unwrap();

        assert_eq!(
            outcome,
            ExchangeOutcome::Failed {
                message: CONVERSE_FALLBACK_MESSAGE.to_string()
            }
        );
        let snapshot = session.snapshot().await;
        assert!(!snapshot.pending);
        assert_eq!(snapshot.last_error.as_deref(), Some(CONVERSE_FALLBACK_MESSAGE));
        assert_eq!(snapshot.transcript, vec![Turn::user("first")]);

        let mut last = next_event(&mut rx).await;
        while matches!(last, SessionEvent::TurnAppended { .. } | SessionEvent::StateChanged { pending: true, .. }) {
            last = next_event(&mut rx).await;
        }
        assert_eq!(
            last,
            SessionEvent::StateChanged {
                pending: false,
                last_error: Some(CONVERSE_FALLBACK_MESSAGE.to_string()),
            }
        );

        // The session is not stuck: the next question goes through
        let outcome = session.submit("second").await.unwrap();
        assert!(matches!(outcome, ExchangeOutcome::Answered(_)));
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.transcript.len(), 3);
        assert_eq!(snapshot.last_error, None);
    }

    #[tokio::test]
    async fn test_gateway_detail_preferred_and_cleared_on_next_submit() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_error(GatewayError::status(503, Some("Vector store unavailable".into())));
        gateway.queue_answer("Back online", vec![]);
        let session = SessionManager::new(gateway.clone());

        session.submit("first try").await.unwrap();
        assert_eq!(
            session.snapshot().await.last_error.as_deref(),
            Some("Vector store unavailable")
        );

        session.submit("second try").await.unwrap();
        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.last_error, None);
        let contents: Vec<&str> = snapshot.transcript.iter().map(Turn::content).collect();
        assert_eq!(contents, vec!["first try", "second try", "Back online"]);

        // The failed question stays in the history of the retry
        let requests = gateway.recorded_requests();
        assert_eq!(requests[1].history, vec![Turn::user("first try")]);
    }

    #[tokio::test]
    async fn test_submit_while_pending_is_rejected() {
        let gateway = Arc::new(GatedMockGateway::new());
        gateway.queue_answer("first answer", vec![]);
        let session = SessionManager::new(gateway.clone());

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.submit("first").await }
        });
        wait_started(&gateway).await;

        let err = session.submit("second").await.unwrap_err();
        assert_eq!(err, SessionError::Busy);

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.transcript, vec![Turn::user("first")]);
        assert!(snapshot.pending);

        gateway.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert!(matches!(outcome, ExchangeOutcome::Answered(_)));

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.transcript.len(), 2);
        assert!(!snapshot.pending);
        assert_eq!(gateway.recorded_requests().len(), 1);
    }

    /// Integration test: reset while a request is in flight discards its result
    #[tokio::test]
    async fn test_reset_discards_in_flight_result() {
        let gateway = Arc::new(GatedMockGateway::new());
        gateway.queue_answer("stale answer", vec![Citation::new("old.pdf", 1)]);
        let session = SessionManager::new(gateway.clone());

        let first = tokio::spawn({
            let session = session.clone();
            async move { session.submit("before reset").await }
        });
        wait_started(&gateway).await;

        session.reset().await;
        let snapshot = session.snapshot().await;
        assert!(snapshot.transcript.is_empty());
        assert!(!snapshot.pending);
        assert_eq!(snapshot.last_error, None);

        gateway.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome, ExchangeOutcome::Discarded);

        let snapshot = session.snapshot().await;
        assert!(snapshot.transcript.is_empty());
        assert!(!snapshot.pending);
    }

    #[tokio::test]
    async fn test_new_submission_after_reset_ignores_stale_result() {
        let gateway = Arc::new(GatedMockGateway::new());
        gateway.queue_answer("stale answer", vec![]);
        gateway.queue_answer("fresh answer", vec![]);
        let session = SessionManager::new(gateway.clone());

        let stale = tokio::spawn({
            let session = session.clone();
            async move { session.submit("old question").await }
        });
        wait_started(&gateway).await;
        session.reset().await;

        let fresh = tokio::spawn({
            let session = session.clone();
            async move { session.submit("new question").await }
        });
        wait_started(&gateway).await;
        assert!(session.snapshot().await.pending);

        // Let the stale call finish first
        gateway.release.notify_one();
        assert_eq!(stale.await.unwrap().unwrap(), ExchangeOutcome::Discarded);
        let snapshot = session.snapshot().await;
        assert!(snapshot.pending, "stale result must not end the new exchange");
        assert_eq!(snapshot.transcript, vec![Turn::user("new question")]);

        gateway.release.notify_one();
        let outcome = fresh.await.unwrap().unwrap();
        assert!(matches!(outcome, ExchangeOutcome::Answered(_)));

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.transcript.len(), 2);
        assert!(!snapshot.pending);

        let requests = gateway.recorded_requests();
        assert!(requests[1].history.is_empty());
    }

    #[tokio::test]
    async fn test_dropping_submit_future_still_applies_result() {
        let gateway = Arc::new(GatedMockGateway::new());
        gateway.queue_answer("late but applied", vec![]);
        let session = SessionManager::new(gateway.clone());
        let mut rx = session.subscribe();

        let submit = tokio::spawn({
            let session = session.clone();
            async move { session.submit("question").await }
        });
        wait_started(&gateway).await;
        submit.abort();

        gateway.release.notify_one();
        loop {
            if let SessionEvent::StateChanged { pending: false, .. } = next_event(&mut rx).await {
                break;
            }
        }

        let snapshot = session.snapshot().await;
        assert_eq!(snapshot.transcript.len(), 2);
        assert_eq!(snapshot.transcript[1].content(), "late but applied");
    }

    #[tokio::test]
    async fn test_subscriber_sees_events_in_order() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_answer("Hi there", vec![Citation::new("intro.pdf", 1)]);
        gateway.queue_error(GatewayError::timeout("Request timeout"));
        let session = SessionManager::new(gateway);
        let mut rx = session.subscribe();

        session.submit("Hello").await.unwrap();
        session.submit("Again").await.unwrap();
        session.reset().await;

        let expected = vec![
            SessionEvent::TurnAppended { turn: Turn::user("Hello") },
            SessionEvent::StateChanged { pending: true, last_error: None },
            SessionEvent::TurnAppended {
                turn: Turn::assistant("Hi there", vec![Citation::new("intro.pdf", 1)]),
            },
            SessionEvent::StateChanged { pending: false, last_error: None },
            SessionEvent::TurnAppended { turn: Turn::user("Again") },
            SessionEvent::StateChanged { pending: true, last_error: None },
            SessionEvent::StateChanged {
                pending: false,
                last_error: Some(CONVERSE_FALLBACK_MESSAGE.to_string()),
            },
            SessionEvent::Cleared,
            SessionEvent::StateChanged { pending: false, last_error: None },
        ];
        for want in expected {
            assert_eq!(next_event(&mut rx).await, want);
        }
    }

    #[tokio::test]
    async fn test_reset_from_failed_state() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_error(GatewayError::network("connection refused"));
        let session = SessionManager::new(gateway);

        session.submit("anyone there?").await.unwrap();
        assert!(session.snapshot().await.last_error.is_some());

        session.reset().await;
        let snapshot = session.snapshot().await;
        assert!(snapshot.transcript.is_empty());
        assert!(!snapshot.pending);
        assert_eq!(snapshot.last_error, None);
    }

    #[tokio::test]
    async fn test_sessions_are_independent() {
        let gateway = Arc::new(MockGateway::new());
        gateway.queue_answer("one", vec![]);
        let a = SessionManager::new(gateway.clone());
        let b = SessionManager::new(gateway);

        a.submit("only in a").await.unwrap();

        assert_eq!(a.snapshot().await.transcript.len(), 2);
        assert!(b.snapshot().await.transcript.is_empty());
        assert_ne!(a.session_id(), b.session_id());
    }
}
