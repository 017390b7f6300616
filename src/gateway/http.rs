//! reqwest-backed gateway for the RAG backend

use super::wire::{ChatRequest, ChatResponse, ErrorBody, IngestResponse};
use super::{ConverseReply, DocumentIngest, Gateway, GatewayError, IngestReceipt};
use crate::config::ClientConfig;
use crate::transcript::Turn;
use async_trait::async_trait;
use reqwest::{multipart, Client, Response};
use std::path::Path;
use std::time::Duration;

const PDF_MIME: &str = "application/pdf";

/// HTTP gateway. Holds a connection pool and the two endpoint URLs, nothing
/// else; every call is one independent round trip.
pub struct HttpGateway {
    client: Client,
    chat_url: String,
    ingest_url: String,
}

impl HttpGateway {
    pub fn new(config: &ClientConfig) -> Result<Self, GatewayError> {
        Self::with_base_url(&config.api_base_url, config.request_timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::network(format!("Failed to create HTTP client: {e}")))?;

        let base = base_url.trim_end_matches('/');
        Ok(Self {
            client,
            chat_url: format!("{base}/chat"),
            ingest_url: format!("{base}/ingest"),
        })
    }

    /// Read the body, turning non-2xx statuses into classified errors
    async fn read_body(response: Response) -> Result<String, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            // The status alone classifies the failure; a truncated body only loses the detail
            let detail = response
                .text()
                .await
                .ok()
                .and_then(|body| ErrorBody::detail_from(&body));
            return Err(GatewayError::status(status.as_u16(), detail));
        }

        response
            .text()
            .await
            .map_err(|e| classify_transport_error(&e, "Failed to read response"))
    }
}

fn classify_transport_error(e: &reqwest::Error, context: &str) -> GatewayError {
    if e.is_timeout() {
        GatewayError::timeout(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        GatewayError::network(format!("Connection failed: {e}"))
    } else {
        GatewayError::network(format!("{context}: {e}"))
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn converse(&self, query: &str, history: &[Turn]) -> Result<ConverseReply, GatewayError> {
        let request = ChatRequest::new(query, history);

        let response = self
            .client
            .post(&self.chat_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, "Request failed"))?;

        let body = Self::read_body(response).await?;

        let parsed: ChatResponse = serde_json::from_str(&body).map_err(|e| {
            GatewayError::malformed(format!("Failed to parse chat response: {e} - body: {body}"))
        })?;

        Ok(ConverseReply {
            answer: parsed.answer,
            citations: parsed.citations.into_iter().map(Into::into).collect(),
        })
    }
}

#[async_trait]
impl DocumentIngest for HttpGateway {
    async fn ingest(&self, path: &Path) -> Result<IngestReceipt, GatewayError> {
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document.pdf")
            .to_string();

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| GatewayError::invalid_document(format!("Could not read {filename}: {e}")))?;

        let part = multipart::Part::bytes(bytes)
            .file_name(filename.clone())
            .mime_str(PDF_MIME)
            .map_err(|e| GatewayError::invalid_document(format!("Could not attach {filename}: {e}")))?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(&self.ingest_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| classify_transport_error(&e, "Upload failed"))?;

        let body = Self::read_body(response).await?;

        // Success bodies carry nothing we depend on
        let parsed: IngestResponse = serde_json::from_str(&body).unwrap_or_default();
        Ok(IngestReceipt {
            filename: parsed.filename.unwrap_or(filename),
            message: parsed.message,
        })
    }
}
