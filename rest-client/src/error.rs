//! Error types for the REST client

use thiserror::Error;

/// Errors that can occur while talking to the backend
#[derive(Debug, Error)]
pub enum RestError {
    /// Network or transport-level failure (DNS, connect, timeout)
    #[error("Network/HTTP error: {0}")]
    Network(String),

    /// The backend answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body could not be decoded
    #[error("JSON parsing error: {0}")]
    Parse(String),

    /// The request was rejected and the token could not be refreshed
    #[error("Unauthorized")]
    Unauthorized,
}

impl RestError {
    /// Whether retrying the same request could succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, RestError::Network(_))
    }
}
