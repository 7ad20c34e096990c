//! Transport Factory
//!
//! Selects the connector for the platform this crate was built for, so the
//! client never branches on OS identity.

use std::sync::Arc;

use super::traits::Connector;

#[cfg(windows)]
use super::named_pipe::NamedPipeConnector;
#[cfg(unix)]
use super::unix_socket::UnixSocketConnector;

/// Create the connector for the current platform
///
/// # Example
///
/// ```ignore
/// use presence_core::transport::{platform_connector, EndpointLocator, Transport};
///
/// let connector = platform_connector();
/// let transport = Transport::open(&EndpointLocator::platform_default(), connector.as_ref()).await?;
/// ```
#[must_use]
pub fn platform_connector() -> Arc<dyn Connector> {
    #[cfg(unix)]
    {
        Arc::new(UnixSocketConnector::new())
    }

    #[cfg(windows)]
    {
        Arc::new(NamedPipeConnector::new())
    }
}
