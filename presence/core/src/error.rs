//! Error types for presence operations

use thiserror::Error;

use crate::activity::ActivityError;
use crate::transport::TransportError;

/// Result alias for client operations
pub type Result<T> = std::result::Result<T, PresenceError>;

/// Errors returned by `RichClient`
#[derive(Debug, Error)]
pub enum PresenceError {
    /// Opening, reading or writing the endpoint failed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The endpoint rejected the application id
    #[error("Invalid client id: {0}")]
    InvalidClientId(String),

    /// The operation needs a completed handshake
    #[error("Not connected")]
    NotConnected,

    /// The activity breaks a protocol limit
    #[error("Invalid activity: {0}")]
    InvalidActivity(#[from] ActivityError),

    /// A message could not be encoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl PresenceError {
    /// Whether the session was lost while performing the operation
    #[must_use]
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::Transport(e) if e.is_connection_closed())
    }
}

impl From<serde_json::Error> for PresenceError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
