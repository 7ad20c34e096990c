//! In-Process Transport
//!
//! A [`Connector`] backed by in-memory duplex pipes instead of OS sockets.
//! Each successful connect hands the endpoint side of the pipe to the
//! owner as a [`Transport`], so a test or an embedding host can play the
//! part of the Discord client.
//!
//! # Usage
//!
//! ```ignore
//! let (connector, mut peers) = InProcessConnector::new(["/tmp/discord-ipc-0"]);
//! let client = RichClient::with_connector(config, Arc::new(connector));
//!
//! let mut endpoint = peers.recv().await.unwrap();
//! let handshake = endpoint.read().await?;
//! ```

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::connection::Transport;
use super::endpoint::EndpointAddress;
use super::traits::{Connector, IpcStream};

/// Buffer size of each in-memory pipe direction
const PIPE_CAPACITY: usize = 64 * 1024;

/// Connector over a simulated set of existing endpoints
pub struct InProcessConnector {
    existing: HashSet<PathBuf>,
    failures: Mutex<HashMap<PathBuf, io::ErrorKind>>,
    attempts: Mutex<Vec<EndpointAddress>>,
    peers: mpsc::UnboundedSender<Transport>,
}

impl InProcessConnector {
    /// Create a connector where only `existing` endpoints accept connections
    ///
    /// Returns the connector and a receiver yielding the endpoint side of
    /// every connection made through it.
    pub fn new(
        existing: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> (Self, mpsc::UnboundedReceiver<Transport>) {
        let (peers, peer_rx) = mpsc::unbounded_channel();
        let connector = Self {
            existing: existing.into_iter().map(Into::into).collect(),
            failures: Mutex::new(HashMap::new()),
            attempts: Mutex::new(Vec::new()),
            peers,
        };
        (connector, peer_rx)
    }

    /// Make connecting to `path` fail with `kind`
    pub fn fail_with(&self, path: impl Into<PathBuf>, kind: io::ErrorKind) {
        self.failures.lock().insert(path.into(), kind);
    }

    /// Every address a connect was attempted on, in order
    #[must_use]
    pub fn attempts(&self) -> Vec<EndpointAddress> {
        self.attempts.lock().clone()
    }
}

#[async_trait]
impl Connector for InProcessConnector {
    async fn connect(&self, address: &EndpointAddress) -> io::Result<Box<dyn IpcStream>> {
        self.attempts.lock().push(address.clone());

        if let Some(kind) = self.failures.lock().get(address.as_path()) {
            return Err(io::Error::from(*kind));
        }
        if !self.existing.contains(address.as_path()) {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }

        let (client, endpoint) = tokio::io::duplex(PIPE_CAPACITY);
        if self
            .peers
            .send(Transport::from_stream(address.clone(), Box::new(endpoint)))
            .is_err()
        {
            tracing::debug!(%address, "No endpoint listener, pipe will read EOF");
        }

        Ok(Box::new(client))
    }
}
