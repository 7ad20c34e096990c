//! TOML Configuration File Support
//!
//! Client settings are read from `~/.config/presence/presence.toml`,
//! overridden by `PRESENCE_*` environment variables and finally by
//! command-line flags.
//!
//! # Configuration Priority
//!
//! Highest first:
//! 1. CLI arguments ([`ConfigOverrides`])
//! 2. Environment variables
//! 3. TOML configuration file
//! 4. Default values
//!
//! # Example Configuration
//!
//! ```toml
//! [client]
//! client_id = "1234567890123456789"
//! wait_for_ready = true
//! event_capacity = 32
//!
//! [ipc]
//! paths = ["/run/user/1000"]
//! max_frame_size = 65536
//!
//! [throttle]
//! update_interval_ms = 15000
//! enabled = true
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `PRESENCE_CLIENT_ID` | Application id |
//! | `PRESENCE_IPC_PATH` | Base directories, `:`-separated (`;` on Windows) |
//! | `PRESENCE_UPDATE_INTERVAL_MS` | Minimum time between updates, `0` disables |
//! | `PRESENCE_WAIT_FOR_READY` | `0`/`false` to return from connect before the ack |
//! | `PRESENCE_MAX_FRAME_SIZE` | Largest accepted incoming payload |

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::throttle::DEFAULT_UPDATE_INTERVAL;
use crate::transport::{EndpointLocator, MAX_FRAME_SIZE};

/// Default capacity of the event broadcast channel
pub const DEFAULT_EVENT_CAPACITY: usize = 32;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur when loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read config file
    #[error("Failed to read config file at {path}: {source}")]
    ReadError {
        /// The path that was attempted
        path: PathBuf,
        /// The underlying IO error
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse TOML config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

// =============================================================================
// Configuration Source Tracking
// =============================================================================

/// Tracks where a configuration value came from
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Value from command-line argument
    Cli,
    /// Value from environment variable
    Env,
    /// Value from TOML configuration file
    File,
    /// Default value
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cli => write!(f, "CLI"),
            Self::Env => write!(f, "environment"),
            Self::File => write!(f, "config file"),
            Self::Default => write!(f, "default"),
        }
    }
}

// =============================================================================
// TOML Configuration Structures
// =============================================================================

/// `[client]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientToml {
    /// Application id
    pub client_id: Option<String>,

    /// Whether `connect` waits for the handshake acknowledgement
    pub wait_for_ready: Option<bool>,

    /// Capacity of the event channel
    pub event_capacity: Option<usize>,
}

/// `[ipc]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcToml {
    /// Base directories to probe instead of the platform defaults
    pub paths: Option<Vec<PathBuf>>,

    /// Largest accepted incoming payload in bytes
    pub max_frame_size: Option<usize>,
}

/// `[throttle]` section
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleToml {
    /// Minimum time between two updates in milliseconds
    pub update_interval_ms: Option<u64>,

    /// `false` sends every update immediately
    pub enabled: Option<bool>,
}

/// Top-level TOML configuration structure
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresenceToml {
    /// Client section
    pub client: ClientToml,

    /// IPC section
    pub ipc: IpcToml,

    /// Throttle section
    pub throttle: ThrottleToml,
}

// =============================================================================
// Main Configuration Struct
// =============================================================================

/// Settings for one `RichClient`
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Application id sent in the handshake
    pub client_id: String,

    /// Base directories to probe; `None` uses the platform defaults
    pub endpoint_bases: Option<Vec<PathBuf>>,

    /// Minimum time between two activity updates (zero disables)
    pub update_interval: Duration,

    /// Whether `connect` waits for the handshake acknowledgement
    pub wait_for_ready: bool,

    /// Largest accepted incoming payload
    pub max_frame_size: usize,

    /// Capacity of the event broadcast channel
    pub event_capacity: usize,

    /// Path to the config file that was loaded (if any)
    pub config_file_path: Option<PathBuf>,

    source: ConfigSource,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            endpoint_bases: None,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            wait_for_ready: true,
            max_frame_size: MAX_FRAME_SIZE,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            config_file_path: None,
            source: ConfigSource::Default,
        }
    }
}

impl ClientConfig {
    /// Defaults for `client_id`
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            ..Self::default()
        }
    }

    /// Probe these base directories instead of the platform defaults
    #[must_use]
    pub fn with_endpoint_bases(
        mut self,
        bases: impl IntoIterator<Item = impl Into<PathBuf>>,
    ) -> Self {
        self.endpoint_bases = Some(bases.into_iter().map(Into::into).collect());
        self
    }

    /// Set the minimum update interval
    #[must_use]
    pub fn with_update_interval(mut self, interval: Duration) -> Self {
        self.update_interval = interval;
        self
    }

    /// Set whether `connect` waits for the acknowledgement
    #[must_use]
    pub fn with_wait_for_ready(mut self, wait: bool) -> Self {
        self.wait_for_ready = wait;
        self
    }

    /// Set the largest accepted incoming payload
    #[must_use]
    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Get the primary source of this configuration
    #[must_use]
    pub fn source(&self) -> ConfigSource {
        self.source
    }

    /// Set the configuration source
    pub fn set_source(&mut self, source: ConfigSource) {
        self.source = source;
    }

    /// Locator over the configured or default bases
    #[must_use]
    pub fn locator(&self) -> EndpointLocator {
        match &self.endpoint_bases {
            Some(bases) => EndpointLocator::new(bases.iter().cloned()),
            None => EndpointLocator::platform_default(),
        }
    }

    /// Check the settings before connecting
    ///
    /// # Errors
    ///
    /// `ValidationError` if the client id is not a decimal snowflake, the
    /// frame limit is zero, or the event channel has no capacity.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.is_empty() {
            return Err(ConfigError::ValidationError(
                "client_id is required".to_string(),
            ));
        }
        if !self.client_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(ConfigError::ValidationError(format!(
                "client_id must be numeric, got {:?}",
                self.client_id
            )));
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::ValidationError(
                "max_frame_size must be positive".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::ValidationError(
                "event_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Configuration Loading
// =============================================================================

/// Get the default configuration file path
///
/// Returns `$XDG_CONFIG_HOME/presence/presence.toml` or
/// `~/.config/presence/presence.toml` if `XDG_CONFIG_HOME` is not set.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("presence").join("presence.toml"))
}

/// Load configuration from the default path and the environment
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
/// A missing config file is not an error (defaults are used).
pub fn load_config() -> Result<ClientConfig, ConfigError> {
    load_config_from_path(default_config_path())
}

/// Load configuration from a specific path and the environment
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_from_path(path: Option<PathBuf>) -> Result<ClientConfig, ConfigError> {
    load_config_with_env(path, |var| std::env::var(var).ok())
}

/// Load configuration with an explicit environment lookup
///
/// # Errors
///
/// Returns an error if the specified config file cannot be read or parsed.
pub fn load_config_with_env(
    path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientConfig, ConfigError> {
    let mut config = ClientConfig::default();

    if let Some(ref config_path) = path {
        if config_path.exists() {
            let toml_content =
                std::fs::read_to_string(config_path).map_err(|e| ConfigError::ReadError {
                    path: config_path.clone(),
                    source: e,
                })?;

            let toml_config: PresenceToml = toml::from_str(&toml_content)?;
            apply_toml_config(&mut config, &toml_config);
            config.config_file_path = Some(config_path.clone());
            config.source = ConfigSource::File;

            tracing::info!(
                path = %config_path.display(),
                "Loaded configuration from file"
            );
        } else {
            tracing::debug!(
                path = %config_path.display(),
                "Config file not found, using defaults"
            );
        }
    }

    apply_env_config(&mut config, env);

    Ok(config)
}

fn apply_toml_config(config: &mut ClientConfig, toml: &PresenceToml) {
    if let Some(ref id) = toml.client.client_id {
        config.client_id = id.clone();
    }
    if let Some(wait) = toml.client.wait_for_ready {
        config.wait_for_ready = wait;
    }
    if let Some(capacity) = toml.client.event_capacity {
        config.event_capacity = capacity;
    }

    if let Some(ref paths) = toml.ipc.paths {
        config.endpoint_bases = Some(paths.clone());
    }
    if let Some(size) = toml.ipc.max_frame_size {
        config.max_frame_size = size;
    }

    if let Some(ms) = toml.throttle.update_interval_ms {
        config.update_interval = Duration::from_millis(ms);
    }
    if toml.throttle.enabled == Some(false) {
        config.update_interval = Duration::ZERO;
    }
}

fn apply_env_config(config: &mut ClientConfig, env: impl Fn(&str) -> Option<String>) {
    if let Some(id) = env("PRESENCE_CLIENT_ID") {
        config.client_id = id;
        config.source = ConfigSource::Env;
    }
    if let Some(paths) = env("PRESENCE_IPC_PATH") {
        let bases: Vec<PathBuf> = std::env::split_paths(&paths)
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        if !bases.is_empty() {
            config.endpoint_bases = Some(bases);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(interval) = env("PRESENCE_UPDATE_INTERVAL_MS") {
        if let Ok(ms) = interval.parse::<u64>() {
            config.update_interval = Duration::from_millis(ms);
            config.source = ConfigSource::Env;
        }
    }
    if let Some(wait) = env("PRESENCE_WAIT_FOR_READY") {
        config.wait_for_ready = wait != "0" && wait.to_lowercase() != "false";
        config.source = ConfigSource::Env;
    }
    if let Some(size) = env("PRESENCE_MAX_FRAME_SIZE") {
        if let Ok(s) = size.parse::<usize>() {
            config.max_frame_size = s;
            config.source = ConfigSource::Env;
        }
    }
}

// =============================================================================
// CLI Override Support
// =============================================================================

/// Command-line overrides applied after [`load_config`]
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Client id override
    pub client_id: Option<String>,

    /// Endpoint base directory override
    pub ipc_paths: Option<Vec<PathBuf>>,
}

impl ConfigOverrides {
    /// Create a new empty set of overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set client id override
    #[must_use]
    pub fn with_client_id(mut self, id: String) -> Self {
        self.client_id = Some(id);
        self
    }

    /// Set endpoint base override
    #[must_use]
    pub fn with_ipc_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.ipc_paths = Some(paths);
        self
    }

    /// Apply overrides to a configuration
    pub fn apply(&self, config: &mut ClientConfig) {
        if self.client_id.is_some() || self.ipc_paths.is_some() {
            config.source = ConfigSource::Cli;
        }
        if let Some(ref id) = self.client_id {
            config.client_id = id.clone();
        }
        if let Some(ref paths) = self.ipc_paths {
            config.endpoint_bases = Some(paths.clone());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
