//! Transport Layer for presence IPC
//!
//! Provides abstraction over the platform endpoint:
//! - `UnixSocket`: Unix domain sockets (Linux, macOS)
//! - `NamedPipe`: Windows named pipes
//! - `InProcess`: in-memory pipes for tests and embedding
//!
//! # Design Philosophy
//!
//! Everything above [`Connector`] is platform independent. Endpoint
//! discovery ([`EndpointLocator`]) only enumerates candidates, the
//! connector only opens one, and [`Transport`] does framing on whatever
//! stream comes back. OS error codes are mapped onto [`TransportError`]
//! before they leave this module.

pub mod connection;
pub mod endpoint;
pub mod factory;
pub mod frame;
pub mod in_process;
#[cfg(windows)]
pub mod named_pipe;
pub mod traits;
#[cfg(unix)]
pub mod unix_socket;

// Re-exports for convenience
pub use connection::{FrameReader, FrameWriter, Transport};
pub use endpoint::{default_bases, EndpointAddress, EndpointLocator};
pub use factory::platform_connector;
pub use frame::{Frame, Opcode, HEADER_SIZE, MAX_FRAME_SIZE};
pub use in_process::InProcessConnector;
pub use traits::{Connector, IpcStream, TransportError};

#[cfg(windows)]
pub use named_pipe::NamedPipeConnector;
#[cfg(unix)]
pub use unix_socket::UnixSocketConnector;
