//! Backend gateway
//!
//! Stateless adapters over the RAG backend's `/chat` and `/ingest`
//! endpoints. The session manager only sees the [`Gateway`] trait, so tests
//! swap in mocks and production wraps [`HttpGateway`] in [`LoggingGateway`].

mod error;
mod http;
pub mod wire;

pub use error::{GatewayError, GatewayErrorKind, CONVERSE_FALLBACK_MESSAGE, INGEST_FALLBACK_MESSAGE};
pub use http::HttpGateway;

use crate::transcript::{Citation, Turn};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

/// Normalized answer from the chat endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConverseReply {
    pub answer: String,
    pub citations: Vec<Citation>,
}

/// What the backend acknowledged after ingesting a document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReceipt {
    pub filename: String,
    pub message: Option<String>,
}

/// Question answering over the ingested documents
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Ask `query` with the prior conversation as context.
    ///
    /// `history` holds every turn committed before the user turn for
    /// `query`; implementations forward role and content only.
    async fn converse(&self, query: &str, history: &[Turn]) -> Result<ConverseReply, GatewayError>;
}

/// Document upload into the backend's index
#[async_trait]
pub trait DocumentIngest: Send + Sync {
    async fn ingest(&self, path: &Path) -> Result<IngestReceipt, GatewayError>;
}

// ============================================================================
// Arc implementations for trait objects
// ============================================================================

#[async_trait]
impl<T: Gateway + ?Sized> Gateway for Arc<T> {
    async fn converse(&self, query: &str, history: &[Turn]) -> Result<ConverseReply, GatewayError> {
        (**self).converse(query, history).await
    }
}

#[async_trait]
impl<T: DocumentIngest + ?Sized> DocumentIngest for Arc<T> {
    async fn ingest(&self, path: &Path) -> Result<IngestReceipt, GatewayError> {
        (**self).ingest(path).await
    }
}

/// Logging wrapper for gateways
pub struct LoggingGateway<G> {
    inner: G,
}

impl<G> LoggingGateway<G> {
    pub fn new(inner: G) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<G: Gateway> Gateway for LoggingGateway<G> {
    async fn converse(&self, query: &str, history: &[Turn]) -> Result<ConverseReply, GatewayError> {
        let start = Instant::now();
        let result = self.inner.converse(query, history).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    duration_ms = %duration.as_millis(),
                    history_len = history.len(),
                    citations = reply.citations.len(),
                    "Chat request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    duration_ms = %duration.as_millis(),
                    history_len = history.len(),
                    error = %e,
                    retryable = e.kind.is_retryable(),
                    "Chat request failed"
                );
            }
        }

        result
    }
}

#[async_trait]
impl<G: DocumentIngest> DocumentIngest for LoggingGateway<G> {
    async fn ingest(&self, path: &Path) -> Result<IngestReceipt, GatewayError> {
        let start = Instant::now();
        let result = self.inner.ingest(path).await;
        let duration = start.elapsed();

        match &result {
            Ok(receipt) => {
                tracing::info!(
                    duration_ms = %duration.as_millis(),
                    filename = %receipt.filename,
                    "Document ingested"
                );
            }
            Err(e) => {
                tracing::error!(
                    duration_ms = %duration.as_millis(),
                    path = %path.display(),
                    error = %e,
                    "Document ingest failed"
                );
            }
        }

        result
    }
}
