//! Presence Core - Client for the local Discord rich presence protocol
//!
//! The desktop client listens on a local endpoint (a Unix socket or a
//! Windows named pipe). This crate finds that endpoint, performs the
//! versioned handshake, then sets or clears the user's activity over
//! length-prefixed JSON frames.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         RichClient                            │
//! │  state machine · update cache · throttle timer · events      │
//! │        │ writes (FrameWriter)          ▲ reads (FrameReader)  │
//! └────────┼───────────────────────────────┼──────────────────────┘
//!          │                               │  background task
//! ┌────────┴───────────────────────────────┴──────────────────────┐
//! │                         Transport                             │
//! │     EndpointLocator → Connector → framed stream (8-byte hdr)  │
//! └───────────────────────────────────────────────────────────────┘
//!          │
//!   discord-ipc-0 … discord-ipc-9
//! ```
//!
//! # Key Types
//!
//! - [`RichClient`]: connect, update, clear, reconnect, shutdown
//! - [`Activity`]: the presence value, built with [`Activity::builder`]
//! - [`ClientConfig`]: settings, loaded with [`config::load_config`]
//! - [`ClientEvent`]: lifecycle events from [`RichClient::subscribe`]
//! - [`transport::Transport`]: the framed connection underneath
//!
//! # Quick Start
//!
//! ```ignore
//! use presence_core::{Activity, ClientConfig, RichClient};
//!
//! #[tokio::main]
//! async fn main() -> presence_core::Result<()> {
//!     let client = RichClient::new(ClientConfig::new("1234567890123456789"));
//!     client.connect().await?;
//!
//!     let activity = Activity::builder()
//!         .details("Editing main.rs")
//!         .started_now()
//!         .build()?;
//!     client.update(Some(activity)).await?;
//!
//!     client.shutdown().await;
//!     Ok(())
//! }
//! ```

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod activity;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod messages;
pub mod throttle;
pub mod transport;

// Re-exports for convenience
pub use activity::{
    Activity, ActivityBuilder, ActivityError, ActivityType, Assets, Button, Emoji, Party,
    Secrets, Timestamps,
};
pub use client::{ConnectionState, RichClient};
pub use config::{
    default_config_path, load_config, load_config_from_path, ClientConfig, ConfigError,
    ConfigOverrides, ConfigSource,
};
pub use error::{PresenceError, Result};
pub use events::{ClientEvent, DisconnectReason};
pub use throttle::{ThrottleDecision, UpdateThrottle};
pub use transport::{EndpointAddress, EndpointLocator, TransportError};
