//! Unix Socket Transport
//!
//! Default transport on Linux and macOS: Discord listens on a Unix domain
//! socket named `discord-ipc-<n>` under the runtime directory.
//!
//! # Socket Location
//!
//! ```text
//! $XDG_RUNTIME_DIR/discord-ipc-<0..9>                              native
//! $XDG_RUNTIME_DIR/app/com.discordapp.Discord/discord-ipc-<0..9>   Flatpak
//! $XDG_RUNTIME_DIR/snap.discord/discord-ipc-<0..9>                 Snap
//! ```
//!
//! `TMPDIR`, `TMP`, `TEMP` and finally `/tmp` stand in for
//! `XDG_RUNTIME_DIR` when it is unset (macOS uses `TMPDIR`).

mod client;

pub use client::UnixSocketConnector;
