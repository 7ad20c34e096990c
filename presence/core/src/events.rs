//! Client lifecycle events delivered to subscribers

use std::fmt;

use crate::messages::Response;

/// Why a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// `shutdown()` was called locally
    Shutdown,
    /// The endpoint closed the connection or the pipe broke
    ClosedByPeer(String),
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Shutdown => write!(f, "shutdown"),
            Self::ClosedByPeer(detail) => write!(f, "closed by peer: {detail}"),
        }
    }
}

/// Event emitted by a `RichClient`
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    /// Handshake acknowledged, updates are accepted
    Ready,
    /// The endpoint answered a command
    ActivityUpdated(Response),
    /// The session ended; emitted once per session
    Disconnected {
        /// What ended it
        reason: DisconnectReason,
    },
}

impl ClientEvent {
    /// Whether this is a `Disconnected` event
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected { .. })
    }
}
