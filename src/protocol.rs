pub mod codec;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod record_batch;
pub mod request;
pub mod response;
pub mod types;

pub use error::{ProtocolError, Result};

use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

/// https://kafka.apache.org/protocol.html#protocol_api_keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i16)]
pub enum ApiKey {
    Fetch = 1,
    ApiVersions = 18,
    DescribeTopicPartitions = 75,
}

/// https://kafka.apache.org/protocol.html#protocol_error_codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, FromPrimitive)]
#[repr(i16)]
pub enum ErrorCode {
    UnknownServerError = -1,
    None = 0,
    CorruptMessage = 2,
    UnknownTopicOrPartition = 3,
    UnsupportedVersion = 35,
    InvalidRequest = 42,
    UnknownTopicId = 100,
    #[num_enum(catch_all)]
    Other(i16),
}

impl ErrorCode {
    pub fn is_none(self) -> bool {
        self == ErrorCode::None
    }
}
