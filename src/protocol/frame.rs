//! Length-prefixed framing.
//!
//! ```text
//! ┌─────────────────┬──────────────────────────────┐
//! │  Length (4B)    │           Payload            │
//! │   big-endian    │  Header + Body               │
//! └─────────────────┴──────────────────────────────┘
//! ```
//!
//! The length excludes itself.
// https://kafka.apache.org/protocol.html#protocol_common

use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

use super::codec::ByteWriter;
use super::dispatch::Registry;
use super::request::Request;
use super::response::Response;
use super::types::Serialize;
use super::{ErrorCode, ProtocolError, Result};

/// Largest frame accepted by default (100 MB, same as Kafka).
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

const LENGTH_PREFIX_SIZE: usize = 4;

/// Prepends the payload size to the payload.
pub fn encode_frame(payload: &[u8]) -> Bytes {
    let mut bytes = BytesMut::with_capacity(payload.len() + LENGTH_PREFIX_SIZE);
    bytes.put_u32(payload.len() as u32);
    bytes.put_slice(payload);
    bytes.freeze()
}

/// Serializes header and body, then frames them.
pub fn encode_response(response: &Response) -> Bytes {
    let mut scratch = ByteWriter::new();
    response.serialize(&mut scratch);
    encode_frame(scratch.as_bytes())
}

/// A minimal frame carrying only a correlation id and an error code, for failures that happen
/// before any response body exists.
pub fn encode_error(correlation_id: i32, error_code: ErrorCode) -> Bytes {
    let mut scratch = ByteWriter::new();
    scratch.write_i32(correlation_id);
    scratch.write_i16(error_code.into());
    encode_frame(scratch.as_bytes())
}

/// Reads until `buf` is full or the stream ends, returning how much was read.
async fn read_full<R: AsyncRead + Unpin>(src: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

/// Splits a byte stream into frame payloads.
#[derive(Debug)]
pub struct FrameReader<R> {
    src: R,
    max_frame_size: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(src: R) -> Self {
        Self::with_max_frame_size(src, MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(src: R, max_frame_size: usize) -> Self {
        Self {
            src,
            max_frame_size,
        }
    }

    /// Returns the next payload, without its length prefix.
    ///
    /// A stream that ends before the first length byte yields [`ProtocolError::EndOfStream`];
    /// one that ends anywhere later in the frame yields [`ProtocolError::TruncatedFrame`].
    pub async fn next_frame(&mut self) -> Result<Bytes> {
        let mut msg_size_buf = [0u8; LENGTH_PREFIX_SIZE];
        match read_full(&mut self.src, &mut msg_size_buf).await? {
            0 => return Err(ProtocolError::EndOfStream),
            LENGTH_PREFIX_SIZE => {}
            actual => {
                return Err(ProtocolError::TruncatedFrame {
                    expected: LENGTH_PREFIX_SIZE,
                    actual,
                })
            }
        }

        let msg_size = u32::from_be_bytes(msg_size_buf) as usize;
        if msg_size > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: msg_size,
                limit: self.max_frame_size,
            });
        }

        let mut msg = BytesMut::with_capacity(msg_size);
        msg.resize(msg_size, 0);
        let actual = read_full(&mut self.src, &mut msg).await?;
        if actual != msg_size {
            return Err(ProtocolError::TruncatedFrame {
                expected: msg_size,
                actual,
            });
        }

        Ok(msg.freeze())
    }
}

/// Reads framed requests and decodes them through a [`Registry`].
#[derive(Debug)]
pub struct MessageReader<R> {
    frames: FrameReader<R>,
    registry: Arc<Registry>,
}

impl<R: AsyncRead + Unpin> MessageReader<R> {
    pub fn new(frames: FrameReader<R>, registry: Arc<Registry>) -> Self {
        Self { frames, registry }
    }

    pub async fn next_request(&mut self) -> Result<Request> {
        let payload = self.frames.next_frame().await?;
        let request = self.registry.decode_request(payload)?;
        debug!(
            api_key = request.header.request_api_key,
            api_version = request.header.request_api_version,
            correlation_id = request.header.correlation_id,
            client_id = ?request.header.client_id,
            "decoded request"
        );
        Ok(request)
    }
}

/// Writes framed responses. Every frame is flushed completely before returning.
#[derive(Debug)]
pub struct MessageWriter<W> {
    dst: W,
}

impl<W: AsyncWrite + Unpin> MessageWriter<W> {
    pub fn new(dst: W) -> Self {
        Self { dst }
    }

    pub async fn send_response(&mut self, response: &Response) -> Result<()> {
        self.send_frame(&encode_response(response)).await
    }

    pub async fn send_error(&mut self, correlation_id: i32, error_code: ErrorCode) -> Result<()> {
        self.send_frame(&encode_error(correlation_id, error_code)).await
    }

    async fn send_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.dst.write_all(frame).await?;
        self.dst.flush().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.dst
    }
}
