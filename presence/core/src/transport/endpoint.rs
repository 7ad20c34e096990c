//! Endpoint discovery
//!
//! Discord listens on the first free name of `discord-ipc-0` through
//! `discord-ipc-9`, under a runtime directory on Unix-like systems and under
//! the named-pipe namespace on Windows. [`EndpointLocator`] enumerates the
//! candidates in probe order; it never touches the filesystem.

use std::fmt;
use std::path::{Path, PathBuf};

/// Name prefix shared by every candidate endpoint
pub const ENDPOINT_PREFIX: &str = "discord-ipc-";

/// Number of numbered endpoints probed per base directory
pub const SLOTS_PER_BASE: u8 = 10;

/// Flatpak sandbox subdirectory under the runtime directory
pub const FLATPAK_SUBDIR: &str = "app/com.discordapp.Discord";

/// Snap sandbox subdirectory under the runtime directory
pub const SNAP_SUBDIR: &str = "snap.discord";

/// Environment variables checked, in order, for the Unix runtime directory
pub const RUNTIME_DIR_VARS: [&str; 4] = ["XDG_RUNTIME_DIR", "TMPDIR", "TMP", "TEMP"];

/// Named-pipe namespace on Windows
pub const PIPE_NAMESPACE: &str = r"\\.\pipe";

/// A single candidate endpoint (socket path or named-pipe path)
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EndpointAddress(PathBuf);

impl EndpointAddress {
    /// Wrap a path as an endpoint address
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Path of the endpoint
    #[must_use]
    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// Numeric slot (`0..=9`) encoded in the endpoint name, if any
    #[must_use]
    pub fn slot(&self) -> Option<u8> {
        self.0
            .file_name()?
            .to_str()?
            .strip_prefix(ENDPOINT_PREFIX)?
            .parse()
            .ok()
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Produces the ordered candidate endpoints for a list of base directories
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EndpointLocator {
    bases: Vec<PathBuf>,
}

impl EndpointLocator {
    /// Create a locator over explicit base directories
    pub fn new(bases: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        Self {
            bases: bases.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a locator over this platform's default bases
    #[must_use]
    pub fn platform_default() -> Self {
        Self::new(default_bases())
    }

    /// Base directories in probe order
    #[must_use]
    pub fn bases(&self) -> &[PathBuf] {
        &self.bases
    }

    /// Candidate endpoints: every base in order, slots `0..=9` within each
    pub fn candidates(&self) -> impl Iterator<Item = EndpointAddress> + '_ {
        self.bases.iter().flat_map(|base| {
            (0..SLOTS_PER_BASE)
                .map(move |slot| EndpointAddress::new(base.join(format!("{ENDPOINT_PREFIX}{slot}"))))
        })
    }
}

/// Default base directories for the current platform
#[must_use]
pub fn default_bases() -> Vec<PathBuf> {
    #[cfg(windows)]
    {
        vec![PathBuf::from(PIPE_NAMESPACE)]
    }

    #[cfg(not(windows))]
    {
        unix_bases(|var| std::env::var(var).ok())
    }
}

/// Unix base directories derived from an environment lookup
///
/// The runtime directory is the first non-empty of [`RUNTIME_DIR_VARS`], or
/// `/tmp`. It is followed by its Flatpak and Snap variants.
pub fn unix_bases(lookup: impl Fn(&str) -> Option<String>) -> Vec<PathBuf> {
    let runtime_dir = RUNTIME_DIR_VARS
        .iter()
        .filter_map(|var| lookup(var))
        .find(|value| !value.is_empty())
        .map_or_else(|| PathBuf::from("/tmp"), PathBuf::from);

    let flatpak = runtime_dir.join(FLATPAK_SUBDIR);
    let snap = runtime_dir.join(SNAP_SUBDIR);
    vec![runtime_dir, flatpak, snap]
}
