//! Frame Protocol
//!
//! Wire format for presence IPC messages: an opcode and a payload length,
//! both little-endian, followed by the UTF-8 JSON payload.
//!
//! # Frame Format
//!
//! ```text
//! +----------------+----------------+------------------------------------------+
//! | Opcode (4)     | Length (4)     | JSON Payload (variable)                  |
//! | little-endian  | little-endian  | handshake, command or close reason       |
//! +----------------+----------------+------------------------------------------+
//! ```
//!
//! The Length field contains the size of the payload only (not the header).
//!
//! # Security
//!
//! - Maximum frame size is enforced to prevent memory exhaustion
//! - Length field is validated before allocating a buffer

use std::fmt;

use serde::Serialize;

use super::TransportError;

/// Default maximum frame size (64 KiB)
///
/// Presence payloads are a few hundred bytes; anything near this limit is
/// a corrupted or hostile stream.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// Frame header size: 4 bytes opcode + 4 bytes length
pub const HEADER_SIZE: usize = 8;

/// Frame opcode
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Handshake request (`{"v":1,"client_id":...}`)
    Handshake,
    /// Command or command response
    Frame,
    /// Session close, from either side
    Close,
    /// Keep-alive ping from the endpoint
    Ping,
    /// Reply to a ping
    Pong,
    /// Any opcode this client does not interpret
    Other(u32),
}

impl Opcode {
    /// Numeric value as sent on the wire
    #[must_use]
    pub fn as_u32(self) -> u32 {
        match self {
            Self::Handshake => 0,
            Self::Frame => 1,
            Self::Close => 2,
            Self::Ping => 3,
            Self::Pong => 4,
            Self::Other(code) => code,
        }
    }
}

impl From<u32> for Opcode {
    fn from(code: u32) -> Self {
        match code {
            0 => Self::Handshake,
            1 => Self::Frame,
            2 => Self::Close,
            3 => Self::Ping,
            4 => Self::Pong,
            other => Self::Other(other),
        }
    }
}

impl From<Opcode> for u32 {
    fn from(opcode: Opcode) -> Self {
        opcode.as_u32()
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handshake => write!(f, "HANDSHAKE"),
            Self::Frame => write!(f, "FRAME"),
            Self::Close => write!(f, "CLOSE"),
            Self::Ping => write!(f, "PING"),
            Self::Pong => write!(f, "PONG"),
            Self::Other(code) => write!(f, "OPCODE({code})"),
        }
    }
}

/// One complete opcode + payload unit
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Frame opcode
    pub opcode: Opcode,
    /// Raw payload bytes (UTF-8 JSON when non-empty)
    pub payload: Vec<u8>,
}

impl Frame {
    /// Create a frame
    pub fn new(opcode: Opcode, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            opcode,
            payload: payload.into(),
        }
    }

    /// Payload as text, replacing invalid UTF-8
    #[must_use]
    pub fn payload_text(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Encode an opcode and raw payload into a frame
///
/// # Errors
///
/// Returns `TransportError::FrameTooLarge` if the payload exceeds
/// `MAX_FRAME_SIZE`.
pub fn encode(opcode: Opcode, payload: &[u8]) -> Result<Vec<u8>, TransportError> {
    if payload.len() > MAX_FRAME_SIZE {
        return Err(TransportError::FrameTooLarge {
            size: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }

    // Bounded by MAX_FRAME_SIZE above
    let len = payload.len() as u32;

    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&opcode.as_u32().to_le_bytes());
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Serialize a message to JSON and encode it as a frame
///
/// # Errors
///
/// Returns `TransportError::Serialization` if JSON serialization fails, or
/// `TransportError::FrameTooLarge` if the result exceeds `MAX_FRAME_SIZE`.
pub fn encode_json<T: Serialize>(opcode: Opcode, msg: &T) -> Result<Vec<u8>, TransportError> {
    let json = serde_json::to_vec(msg).map_err(|e| TransportError::Serialization(e.to_string()))?;
    encode(opcode, &json)
}

/// Decode the 8-byte header into opcode and payload length
#[must_use]
pub fn decode_header(header: &[u8; HEADER_SIZE]) -> (Opcode, u32) {
    let opcode = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
    let len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);
    (Opcode::from(opcode), len)
}

/// Decode one frame from the front of `buf`
///
/// Returns `Ok(None)` if `buf` does not yet hold a complete frame, or the
/// frame together with the number of bytes it occupied.
///
/// # Errors
///
/// Returns `TransportError::FrameTooLarge` if the declared length exceeds
/// `max_frame_size`.
pub fn decode(buf: &[u8], max_frame_size: usize) -> Result<Option<(Frame, usize)>, TransportError> {
    let Some(header) = buf.first_chunk::<HEADER_SIZE>() else {
        return Ok(None);
    };

    let (opcode, len) = decode_header(header);
    let len = len as usize;
    if len > max_frame_size {
        return Err(TransportError::FrameTooLarge {
            size: len,
            max: max_frame_size,
        });
    }

    let total = HEADER_SIZE + len;
    if buf.len() < total {
        return Ok(None);
    }

    let frame = Frame::new(opcode, &buf[HEADER_SIZE..total]);
    Ok(Some((frame, total)))
}
