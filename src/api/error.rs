//! Error types for REST calls.

use thiserror::Error;

/// Errors returned by guarded REST calls.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The server rejected the session credential. By the time this is
    /// returned the session has been invalidated.
    #[error("authorization failed (HTTP {status}) for {url}")]
    Unauthorized { status: u16, url: String },

    /// Any other non-success status
    #[error("unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    /// Request timeout
    #[error("request timed out")]
    Timeout,

    /// Connection or protocol failure before a response arrived
    #[error("connection failed: {0}")]
    Transport(String),

    /// Response body did not have the expected shape
    #[error("invalid response: {0}")]
    Decode(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Input rejected before or by the server
    #[error("invalid value for '{field}': {message}")]
    Validation { field: String, message: String },
}

impl ApiError {
    /// Classify a reqwest error raised before a response was received.
    pub fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }
}
