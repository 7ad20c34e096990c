//! Protocol payloads
//!
//! JSON bodies carried inside frames. Outgoing messages are strongly typed;
//! incoming ones are parsed into the tolerant [`Response`] view, since the
//! desktop client adds fields freely.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::activity::Activity;

/// Protocol version sent in the handshake
pub const PROTOCOL_VERSION: u32 = 1;

/// Command name for setting or clearing the activity
pub const SET_ACTIVITY: &str = "SET_ACTIVITY";

/// Event name the desktop client uses for error responses
pub const ERROR_EVENT: &str = "ERROR";

/// Close / error code for an unknown application id
pub const INVALID_CLIENT_ID_CODE: i64 = 4000;

/// First message on every connection (opcode 0)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Handshake {
    /// Protocol version, always [`PROTOCOL_VERSION`]
    pub v: u32,
    /// Application id
    pub client_id: String,
}

impl Handshake {
    /// Handshake for `client_id`
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            v: PROTOCOL_VERSION,
            client_id: client_id.into(),
        }
    }
}

/// Arguments of `SET_ACTIVITY`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetActivityArgs {
    /// Process the activity belongs to
    pub pid: u32,
    /// The activity; `None` is sent as an explicit `null` to clear
    pub activity: Option<Activity>,
}

/// A command frame (opcode 1)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    /// Command name
    pub cmd: String,
    /// Command arguments
    pub args: SetActivityArgs,
    /// Unique id echoed back in the response
    pub nonce: String,
}

impl Command {
    /// `SET_ACTIVITY` for the current process with a fresh nonce
    #[must_use]
    pub fn set_activity(activity: Option<Activity>) -> Self {
        Self {
            cmd: SET_ACTIVITY.to_string(),
            args: SetActivityArgs {
                pid: process_id(),
                activity,
            },
            nonce: Uuid::new_v4().to_string(),
        }
    }
}

/// Incoming payload; every field optional
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Response {
    /// Command this responds to
    #[serde(default)]
    pub cmd: Option<String>,
    /// Event name (`READY`, `ERROR`, ...)
    #[serde(default)]
    pub evt: Option<String>,
    /// Event data
    #[serde(default)]
    pub data: Option<serde_json::Value>,
    /// Nonce of the originating command
    #[serde(default)]
    pub nonce: Option<String>,
    /// Close code (close frames)
    #[serde(default)]
    pub code: Option<i64>,
    /// Close message (close frames)
    #[serde(default)]
    pub message: Option<String>,
}

impl Response {
    /// Parse a payload, `None` if it is not a JSON object
    #[must_use]
    pub fn parse(payload: &[u8]) -> Option<Self> {
        serde_json::from_slice(payload).ok()
    }

    /// Whether this is an error event
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.evt.as_deref() == Some(ERROR_EVENT)
    }

    /// Error or close code, looked up at the top level then in `data`
    #[must_use]
    pub fn error_code(&self) -> Option<i64> {
        self.code.or_else(|| {
            self.data
                .as_ref()
                .and_then(|d| d.get("code"))
                .and_then(serde_json::Value::as_i64)
        })
    }

    /// Error or close message, looked up at the top level then in `data`
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.message.as_deref().or_else(|| {
            self.data
                .as_ref()
                .and_then(|d| d.get("message"))
                .and_then(serde_json::Value::as_str)
        })
    }
}

/// Whether a payload rejects the handshake's client id
pub fn is_invalid_client_id(payload: &[u8]) -> bool {
    let text = String::from_utf8_lossy(payload).to_lowercase();
    if text.contains("invalid client id") {
        return true;
    }
    Response::parse(payload).and_then(|r| r.error_code()) == Some(INVALID_CLIENT_ID_CODE)
}

/// Id of the current process
#[must_use]
pub fn process_id() -> u32 {
    std::process::id()
}
