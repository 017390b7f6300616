//! Gateway error types

use thiserror::Error;

/// Shown when a chat request fails without a backend-provided detail
pub const CONVERSE_FALLBACK_MESSAGE: &str = "Failed to get response. Please try again.";

/// Shown when an upload fails without a backend-provided detail
pub const INGEST_FALLBACK_MESSAGE: &str = "Failed to upload document. Please try again.";

/// Gateway error with classification
#[derive(Debug, Error)]
#[error("{message}")]
pub struct GatewayError {
    pub kind: GatewayErrorKind,
    /// Diagnostic text for logs
    pub message: String,
    /// Human-readable explanation sent by the backend, if any
    pub detail: Option<String>,
}

impl GatewayError {
    pub fn new(kind: GatewayErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Network, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::Timeout, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(GatewayErrorKind::MalformedResponse, message)
    }

    /// Non-success HTTP status, optionally carrying the backend's `detail`
    pub fn status(code: u16, detail: Option<String>) -> Self {
        let message = match &detail {
            Some(d) => format!("HTTP {code}: {d}"),
            None => format!("HTTP {code}"),
        };
        Self {
            kind: GatewayErrorKind::Status(code),
            message,
            detail,
        }
    }

    /// The document could not be read or sent; `detail` is user-facing
    pub fn invalid_document(detail: impl Into<String>) -> Self {
        let detail = detail.into();
        Self {
            kind: GatewayErrorKind::InvalidDocument,
            message: format!("Invalid document: {detail}"),
            detail: Some(detail),
        }
    }

    /// Text to show the user: the backend detail when present and non-blank,
    /// otherwise `fallback`
    pub fn user_message(&self, fallback: &str) -> String {
        self.detail
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or(fallback)
            .to_string()
    }
}

/// Error classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayErrorKind {
    /// Connection refused, reset, DNS failure
    Network,
    /// Request exceeded the configured timeout
    Timeout,
    /// Backend answered with a non-2xx status
    Status(u16),
    /// 2xx response whose body does not match the expected shape
    MalformedResponse,
    /// Local file could not be read for upload
    InvalidDocument,
}

impl GatewayErrorKind {
    /// Whether a user retry has a reasonable chance of succeeding
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network | Self::Timeout => true,
            Self::Status(code) => *code == 429 || (500..=599).contains(code),
            Self::MalformedResponse | Self::InvalidDocument => false,
        }
    }
}
