//! Unix Socket Client Transport
//!
//! Connects to one candidate socket path. A missing socket file surfaces as
//! `ENOENT`, which std reports as [`io::ErrorKind::NotFound`].

use std::io;

use async_trait::async_trait;
use tokio::net::UnixStream;

use crate::transport::endpoint::EndpointAddress;
use crate::transport::traits::{Connector, IpcStream};

/// Connector for Unix domain socket endpoints
#[derive(Clone, Copy, Debug, Default)]
pub struct UnixSocketConnector;

impl UnixSocketConnector {
    /// Create a new connector
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for UnixSocketConnector {
    async fn connect(&self, address: &EndpointAddress) -> io::Result<Box<dyn IpcStream>> {
        let stream = UnixStream::connect(address.as_path()).await?;
        Ok(Box::new(stream))
    }
}
