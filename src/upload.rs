//! Document upload
//!
//! Client-side PDF validation plus a small status machine around
//! [`DocumentIngest`]. Uploads never touch the conversation transcript.

use crate::gateway::{DocumentIngest, IngestReceipt, INGEST_FALLBACK_MESSAGE};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

pub const NOT_PDF_MESSAGE: &str = "Please select a PDF file.";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadStatus {
    #[default]
    Idle,
    Uploading {
        filename: String,
    },
    Succeeded {
        filename: String,
    },
    Failed {
        message: String,
    },
}

impl UploadStatus {
    pub fn is_uploading(&self) -> bool {
        matches!(self, UploadStatus::Uploading { .. })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("Please select a PDF file.")]
    NotPdf,
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("An upload is already in progress")]
    InProgress,
    /// The backend refused the document; the message is user-facing
    #[error("{0}")]
    Rejected(String),
}

/// Check that `path` names an existing file with a PDF extension
pub fn validate_pdf(path: &Path) -> Result<(), UploadError> {
    let is_pdf = mime_guess::from_path(path)
        .first()
        .is_some_and(|mime| mime == mime_guess::mime::APPLICATION_PDF);
    if !is_pdf {
        return Err(UploadError::NotPdf);
    }
    if !path.is_file() {
        return Err(UploadError::NotFound(path.to_path_buf()));
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned())
}

/// Tracks one upload at a time against a [`DocumentIngest`]
pub struct UploadTracker<I> {
    ingest: Arc<I>,
    status: Mutex<UploadStatus>,
}

impl<I: DocumentIngest> UploadTracker<I> {
    pub fn new(ingest: Arc<I>) -> Self {
        Self {
            ingest,
            status: Mutex::new(UploadStatus::Idle),
        }
    }

    pub async fn status(&self) -> UploadStatus {
        self.status.lock().await.clone()
    }

    /// Forget a finished upload's outcome. No-op while uploading.
    pub async fn clear(&self) {
        let mut status = self.status.lock().await;
        if !status.is_uploading() {
            *status = UploadStatus::Idle;
        }
    }

    pub async fn upload(&self, path: &Path) -> Result<IngestReceipt, UploadError> {
        let filename = display_name(path);
        {
            let mut status = self.status.lock().await;
            if status.is_uploading() {
                return Err(UploadError::InProgress);
            }
            if let Err(e) = validate_pdf(path) {
                tracing::warn!(path = %path.display(), error = %e, "Upload rejected before sending");
                *status = UploadStatus::Failed {
                    message: e.to_string(),
                };
                return Err(e);
            }
            *status = UploadStatus::Uploading {
                filename: filename.clone(),
            };
        }

        tracing::info!(filename = %filename, "Uploading document");
        let result = self.ingest.ingest(path).await;

        let mut status = self.status.lock().await;
        match result {
            Ok(receipt) => {
                tracing::info!(filename = %receipt.filename, "Document ingested");
                *status = UploadStatus::Succeeded {
                    filename: receipt.filename.clone(),
                };
                Ok(receipt)
            }
            Err(e) => {
                tracing::warn!(filename = %filename, kind = ?e.kind, error = %e, "Upload failed");
                let message = e.user_message(INGEST_FALLBACK_MESSAGE);
                *status = UploadStatus::Failed {
                    message: message.clone(),
                };
                Err(UploadError::Rejected(message))
            }
        }
    }
}
