//! Client configuration

use std::time::Duration;
use thiserror::Error;

const DEFAULT_API_URL: &str = "http://localhost:8000/api";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_EVENT_CAPACITY: usize = 128;

/// Configuration for talking to the RAG backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL the `/chat` and `/ingest` endpoints hang off
    pub api_base_url: String,
    /// Upper bound on a single backend round trip
    pub request_timeout: Duration,
    /// Buffer size of the session event broadcast channel
    pub event_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value:?}")]
    InvalidNumber { name: &'static str, value: String },
    #[error("{name} must be greater than zero")]
    Zero { name: &'static str },
}

impl ClientConfig {
    /// Read `RAGCHAT_API_URL`, `RAGCHAT_TIMEOUT_SECS` and
    /// `RAGCHAT_EVENT_CAPACITY`, defaulting anything unset
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let api_base_url = lookup("RAGCHAT_API_URL")
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or(defaults.api_base_url);

        let timeout_secs = parse_positive(&lookup, "RAGCHAT_TIMEOUT_SECS")?
            .unwrap_or(DEFAULT_TIMEOUT_SECS);
        let event_capacity = match parse_positive(&lookup, "RAGCHAT_EVENT_CAPACITY")? {
            Some(n) => usize::try_from(n).map_err(|_| ConfigError::InvalidNumber {
                name: "RAGCHAT_EVENT_CAPACITY",
                value: n.to_string(),
            })?,
            None => defaults.event_capacity,
        };

        Ok(Self {
            api_base_url,
            request_timeout: Duration::from_secs(timeout_secs),
            event_capacity,
        })
    }
}

fn parse_positive(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(name) else {
        return Ok(None);
    };
    let value: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidNumber {
        name,
        value: raw.clone(),
    })?;
    if value == 0 {
        return Err(ConfigError::Zero { name });
    }
    Ok(Some(value))
}
