//! Transport traits and error types
//!
//! A [`Connector`] turns an [`EndpointAddress`] into a byte stream. There is
//! one connector per platform; everything above it (framing, the client
//! state machine) only sees [`IpcStream`] and [`TransportError`].

use std::io;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};

use super::endpoint::EndpointAddress;

/// Bidirectional byte stream to the presence endpoint
pub trait IpcStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> IpcStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Opens a stream to a single candidate endpoint
///
/// Implementations must report a missing endpoint as
/// [`io::ErrorKind::NotFound`]; `Transport::open` relies on that to move on
/// to the next candidate.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to one candidate address
    async fn connect(&self, address: &EndpointAddress) -> io::Result<Box<dyn IpcStream>>;
}

/// Transport-level errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// No candidate endpoint accepted a connection
    #[error("No presence endpoint found (is Discord running?)")]
    EndpointNotFound,

    /// A candidate exists but connecting to it failed
    #[error("Failed to connect to {address}: {source}")]
    ConnectionFailed {
        /// The candidate that failed
        address: EndpointAddress,
        /// The underlying OS error
        source: io::Error,
    },

    /// The peer closed the stream or the pipe broke
    #[error("Connection closed: {0}")]
    ConnectionClosed(String),

    /// Uncategorized failure while reading an open connection
    #[error("Pipe read failed: {0}")]
    ReadFailed(String),

    /// Uncategorized failure while writing an open connection
    #[error("Pipe write failed: {0}")]
    WriteFailed(String),

    /// Frame length exceeds the configured limit
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared or actual payload size
        size: usize,
        /// Limit in effect
        max: usize,
    },

    /// Payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl TransportError {
    /// Whether this error means the session is gone
    #[must_use]
    pub fn is_connection_closed(&self) -> bool {
        matches!(self, Self::ConnectionClosed(_))
    }

    /// Classify an I/O error seen while reading an open stream
    pub(crate) fn from_read(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => Self::ConnectionClosed(err.to_string()),
            _ => Self::ReadFailed(err.to_string()),
        }
    }

    /// Classify an I/O error seen while writing an open stream
    pub(crate) fn from_write(err: &io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WriteZero
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => Self::ConnectionClosed(err.to_string()),
            _ => Self::WriteFailed(err.to_string()),
        }
    }
}
