// Error types shared by the API client, the exporter and the orchestrator.
// The binary wraps these in `anyhow` for context; library code returns
// `ExportError` directly so callers can match on the failure kind.

use std::path::PathBuf;
use thiserror::Error;

/// Every failure the export pipeline can report.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The server answered with a non-success status.
    #[error("GET {url} failed with status {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    /// The request never produced a response (connect, timeout, send).
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Response body (or an exported document) was not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// JSON was valid but did not have the expected shape.
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Article slug {0:?} cannot be used as a file name")]
    InvalidSlug(String),

    #[error("HELPSCOUTAUTH environment variable (or --token) must be set")]
    MissingCredential,

    #[error("No collections found for token")]
    NoCollections,

    #[error("Output directory {} already exists", .0.display())]
    DirectoryExists(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The retry loop finished without a response or an error.
    #[error("Request loop finished without making an attempt")]
    NoAttempts,
}

impl ExportError {
    /// Whether another attempt at the same request could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExportError::Status { .. } => true,
            ExportError::Request(e) => !e.is_decode() && !e.is_builder(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ExportError>;
