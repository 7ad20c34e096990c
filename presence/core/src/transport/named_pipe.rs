//! Windows Named Pipe Transport
//!
//! Discord on Windows serves `\\.\pipe\discord-ipc-<n>`. Opening a pipe
//! name nobody serves fails with `ERROR_FILE_NOT_FOUND`, which std maps to
//! [`io::ErrorKind::NotFound`], so probing behaves exactly as on Unix.

use std::io;

use async_trait::async_trait;
use tokio::net::windows::named_pipe::ClientOptions;

use super::endpoint::EndpointAddress;
use super::traits::{Connector, IpcStream};

/// Connector for Windows named-pipe endpoints
#[derive(Clone, Copy, Debug, Default)]
pub struct NamedPipeConnector;

impl NamedPipeConnector {
    /// Create a new connector
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for NamedPipeConnector {
    async fn connect(&self, address: &EndpointAddress) -> io::Result<Box<dyn IpcStream>> {
        let client = ClientOptions::new().open(address.as_path())?;
        Ok(Box::new(client))
    }
}
