use thiserror::Error;

/// Errors that can occur in the realtime feed
#[derive(Error, Debug)]
pub enum FeedError {
    /// Zone id is not a UUID
    ///
    /// The backend routes only UUID zone ids; pseudo-zones such as
    /// `all-zones` have no feed.
    #[error("Invalid zone id: {0}")]
    InvalidZone(String),

    /// Feed URL could not be built
    #[error("Invalid feed URL: {0}")]
    InvalidUrl(String),

    /// Connection could not be established
    #[error("Failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },

    /// WebSocket protocol error on an established connection
    #[error("WebSocket protocol error: {0}")]
    Protocol(String),

    /// A message could not be decoded
    #[error("Failed to decode feed message: {0}")]
    Decode(String),

    /// Background worker is not running
    #[error("Feed worker disconnected")]
    WorkerDisconnected,

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(error: tokio_tungstenite::tungstenite::Error) -> Self {
        FeedError::Protocol(error.to_string())
    }
}

/// Result type for feed operations
pub type Result<T> = std::result::Result<T, FeedError>;
