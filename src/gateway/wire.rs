//! Wire format for the backend's HTTP API

use crate::transcript::{Citation, Role, Turn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of `POST /chat`
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub query: &'a str,
    pub history: Vec<HistoryEntry<'a>>,
}

impl<'a> ChatRequest<'a> {
    /// Build a request; citations on prior turns are not sent back
    pub fn new(query: &'a str, history: &'a [Turn]) -> Self {
        Self {
            query,
            history: history
                .iter()
                .map(|turn| HistoryEntry {
                    role: turn.role(),
                    content: turn.content(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HistoryEntry<'a> {
    pub role: Role,
    pub content: &'a str,
}

/// Body of a successful `POST /chat` response
#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    pub citations: Vec<WireCitation>,
}

#[derive(Debug, Deserialize)]
pub struct WireCitation {
    pub source: String,
    pub page_number: u32,
}

impl From<WireCitation> for Citation {
    fn from(c: WireCitation) -> Self {
        Citation::new(c.source, c.page_number)
    }
}

/// Body of a successful `POST /ingest` response. Nothing in it is required.
#[derive(Debug, Default, Deserialize)]
pub struct IngestResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
}

/// Error body; the backend puts its explanation in `detail`
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<Value>,
}

impl ErrorBody {
    /// Extract `detail` from a raw error body.
    ///
    /// Plain strings are used as-is. Structured details (validation error
    /// arrays) are rendered as compact JSON.
    pub fn detail_from(body: &str) -> Option<String> {
        let parsed: ErrorBody = serde_json::from_str(body).ok()?;
        match parsed.detail? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        }
    }
}
