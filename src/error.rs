// Error types for the offline worker.
// Covers network failures, lifecycle misuse, cache storage and install errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Offline and no cached response for {url}")]
    Offline { url: String },

    #[error("Install failed: could not cache {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    #[error("Invalid worker state: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Response body already used")]
    BodyUsed,

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl WorkerError {
    /// Whether this error came from the transport layer rather than the worker itself.
    pub fn is_network(&self) -> bool {
        matches!(self, WorkerError::Network(_) | WorkerError::Offline { .. })
    }
}

pub type Result<T> = std::result::Result<T, WorkerError>;
