use thiserror::Error;

use super::ErrorCode;

pub type Result<T, E = ProtocolError> = std::result::Result<T, E>;

/// Everything that can go wrong while reading or writing the wire protocol or the metadata log.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The peer closed the connection before sending the next frame length.
    /// This is the normal way a connection ends.
    #[error("end of stream")]
    EndOfStream,

    /// The stream ended in the middle of a frame.
    #[error("truncated frame: expected {expected} bytes, got {actual}")]
    TruncatedFrame { expected: usize, actual: usize },

    #[error("frame of {size} bytes exceeds the limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },

    #[error("unexpected end of input: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEndOfInput { needed: usize, remaining: usize },

    /// The continuation bit was still set after 64 bits worth of payload.
    #[error("malformed varint")]
    MalformedVarint,

    #[error("invalid length {0}")]
    InvalidLength(i64),

    #[error("invalid utf-8 string")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// Only the empty tagged field array is understood.
    #[error("{count} tagged fields present, only empty tagged field arrays are supported")]
    UnsupportedTaggedFields { count: u64 },

    /// No decoder is registered for this (api key, api version) pair.
    #[error("unsupported version {api_version} of api key {api_key}")]
    UnsupportedVersion {
        api_key: i16,
        api_version: i16,
        correlation_id: i32,
    },

    #[error("unknown record type {0}")]
    UnknownRecordType(u8),

    /// A scoped decode finished with bytes left over.
    #[error("schema mismatch: {residual} bytes left after decoding {what}")]
    DecodeSchemaMismatch { what: &'static str, residual: usize },

    #[error("record batch checksum mismatch: stored 0x{stored:08x}, computed 0x{computed:08x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Correlation id of the request that failed, when it is known.
    /// Only errors that carry one can be answered with an error frame.
    pub fn correlation_id(&self) -> Option<i32> {
        match self {
            Self::UnsupportedVersion { correlation_id, .. } => Some(*correlation_id),
            _ => None,
        }
    }

    /// Error code sent back in the error frame for errors that have a correlation id.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::UnsupportedVersion { .. } => ErrorCode::UnsupportedVersion,
            _ => ErrorCode::UnknownServerError,
        }
    }
}
