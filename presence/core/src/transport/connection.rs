//! Framed connection to the presence endpoint
//!
//! [`Transport`] owns one open stream and exposes the frame-level
//! open/read/write/close operations. [`Transport::into_split`] hands out an
//! independent [`FrameReader`] and [`FrameWriter`] so a background task can
//! block on reads while the caller keeps writing.

use std::io;

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

use super::endpoint::{EndpointAddress, EndpointLocator};
use super::frame::{self, Frame, Opcode, HEADER_SIZE, MAX_FRAME_SIZE};
use super::traits::{Connector, IpcStream, TransportError};

/// An open, framed connection to the presence endpoint
pub struct Transport {
    address: EndpointAddress,
    stream: Option<Box<dyn IpcStream>>,
    max_frame_size: usize,
}

impl Transport {
    /// Probe the locator's candidates in order and connect to the first one
    /// that exists
    ///
    /// # Errors
    ///
    /// - `TransportError::ConnectionFailed` if a candidate fails for any
    ///   reason other than not existing; probing stops there
    /// - `TransportError::EndpointNotFound` if no candidate exists
    pub async fn open(
        locator: &EndpointLocator,
        connector: &dyn Connector,
    ) -> Result<Self, TransportError> {
        for address in locator.candidates() {
            match connector.connect(&address).await {
                Ok(stream) => {
                    tracing::debug!(%address, "Opened presence endpoint");
                    return Ok(Self::from_stream(address, stream));
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    tracing::trace!(%address, "Endpoint not found, trying next");
                }
                Err(source) => {
                    tracing::warn!(%address, error = %source, "Endpoint probe failed");
                    return Err(TransportError::ConnectionFailed { address, source });
                }
            }
        }

        Err(TransportError::EndpointNotFound)
    }

    /// Wrap an already-open stream
    #[must_use]
    pub fn from_stream(address: EndpointAddress, stream: Box<dyn IpcStream>) -> Self {
        Self {
            address,
            stream: Some(stream),
            max_frame_size: MAX_FRAME_SIZE,
        }
    }

    /// Override the largest payload accepted by `read`
    #[must_use]
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Endpoint this transport is connected to
    #[must_use]
    pub fn address(&self) -> &EndpointAddress {
        &self.address
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }

    /// Read one complete frame
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` on EOF or reset, `FrameTooLarge` on an oversized
    /// length, `ReadFailed` otherwise.
    pub async fn read(&mut self) -> Result<Frame, TransportError> {
        let max = self.max_frame_size;
        let stream = self.stream.as_mut().ok_or_else(closed)?;
        read_frame(stream, max).await
    }

    /// Write one frame; `None` sends an empty payload
    ///
    /// # Errors
    ///
    /// `ConnectionClosed` on a broken pipe or short write, `WriteFailed`
    /// otherwise.
    pub async fn write(
        &mut self,
        opcode: Opcode,
        payload: Option<&[u8]>,
    ) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or_else(closed)?;
        write_frame(stream, opcode, payload.unwrap_or_default()).await
    }

    /// Release the stream; calling this again does nothing
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                tracing::debug!(error = %e, "Stream shutdown failed");
            }
            tracing::debug!(address = %self.address, "Transport closed");
        }
    }

    /// Split into independent reader and writer halves
    ///
    /// # Errors
    ///
    /// Returns `ConnectionClosed` if the transport was already closed.
    pub fn into_split(self) -> Result<(FrameReader, FrameWriter), TransportError> {
        let stream = self.stream.ok_or_else(closed)?;
        let (read_half, write_half) = tokio::io::split(stream);

        let reader = FrameReader {
            inner: read_half,
            max_frame_size: self.max_frame_size,
        };
        let writer = FrameWriter {
            address: self.address,
            inner: Some(write_half),
        };
        Ok((reader, writer))
    }
}

/// Read half of a split [`Transport`]
pub struct FrameReader {
    inner: ReadHalf<Box<dyn IpcStream>>,
    max_frame_size: usize,
}

impl FrameReader {
    /// Read one complete frame
    ///
    /// # Errors
    ///
    /// Same as [`Transport::read`].
    pub async fn read(&mut self) -> Result<Frame, TransportError> {
        read_frame(&mut self.inner, self.max_frame_size).await
    }
}

/// Write half of a split [`Transport`]
pub struct FrameWriter {
    address: EndpointAddress,
    inner: Option<WriteHalf<Box<dyn IpcStream>>>,
}

impl FrameWriter {
    /// Endpoint this writer is connected to
    #[must_use]
    pub fn address(&self) -> &EndpointAddress {
        &self.address
    }

    /// Write one frame; `None` sends an empty payload
    ///
    /// # Errors
    ///
    /// Same as [`Transport::write`].
    pub async fn write(
        &mut self,
        opcode: Opcode,
        payload: Option<&[u8]>,
    ) -> Result<(), TransportError> {
        let inner = self.inner.as_mut().ok_or_else(closed)?;
        write_frame(inner, opcode, payload.unwrap_or_default()).await
    }

    /// Serialize `msg` to JSON and write it as one frame
    ///
    /// # Errors
    ///
    /// `Serialization` if encoding fails, otherwise as [`FrameWriter::write`].
    pub async fn write_json<T: Serialize>(
        &mut self,
        opcode: Opcode,
        msg: &T,
    ) -> Result<(), TransportError> {
        let payload =
            serde_json::to_vec(msg).map_err(|e| TransportError::Serialization(e.to_string()))?;
        tracing::trace!(
            %opcode,
            payload = %String::from_utf8_lossy(&payload),
            "Sending frame"
        );
        self.write(opcode, Some(&payload)).await
    }

    /// Shut down the write direction; calling this again does nothing
    pub async fn close(&mut self) {
        if let Some(mut inner) = self.inner.take() {
            if let Err(e) = inner.shutdown().await {
                tracing::debug!(error = %e, "Writer shutdown failed");
            }
        }
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

fn closed() -> TransportError {
    TransportError::ConnectionClosed("transport is closed".to_string())
}

async fn read_frame<R>(reader: &mut R, max_frame_size: usize) -> Result<Frame, TransportError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut header = [0u8; HEADER_SIZE];
    reader
        .read_exact(&mut header)
        .await
        .map_err(|e| TransportError::from_read(&e))?;

    let (opcode, len) = frame::decode_header(&header);
    let len = len as usize;
    if len > max_frame_size {
        return Err(TransportError::FrameTooLarge {
            size: len,
            max: max_frame_size,
        });
    }

    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| TransportError::from_read(&e))?;

    tracing::trace!(%opcode, len, "Received frame");
    Ok(Frame::new(opcode, payload))
}

async fn write_frame<W>(writer: &mut W, opcode: Opcode, payload: &[u8]) -> Result<(), TransportError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let bytes = frame::encode(opcode, payload)?;
    writer
        .write_all(&bytes)
        .await
        .map_err(|e| TransportError::from_write(&e))?;
    writer
        .flush()
        .await
        .map_err(|e| TransportError::from_write(&e))
}
