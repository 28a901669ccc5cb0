use thiserror::Error;

use crate::transport::TransportError;

/// Errors surfaced by the playback session and its collaborators
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// Zone id is not a UUID
    #[error("Invalid zone id: {0}")]
    InvalidZone(String),

    /// Zone id is well formed but not in the current listing
    #[error("Zone {0} is not in the zone listing")]
    UnknownZone(String),

    /// An operation needs a selected zone
    #[error("No zone selected")]
    NoZoneSelected,

    /// A pushed snapshot could not be turned into a playable state
    #[error("Invalid snapshot: {0}")]
    InvalidSnapshot(String),

    /// A transport intent was rejected before dispatch
    #[error("Invalid transport request: {0}")]
    InvalidIntent(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
