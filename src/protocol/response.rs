pub mod api_versions;
pub mod describe_topic_partitions;
pub mod fetch;

use super::codec::{ByteReader, ByteWriter};
use super::types::{Deserialize, Serialize, TaggedFields};
use super::{ApiKey, Result};

pub use api_versions::{ApiVersionsApiKey, ApiVersionsResponseV4};
pub use describe_topic_partitions::DescribeTopicPartitionsResponseV0;
pub use fetch::FetchResponseV16;

// The APIVersions response uses the "v0" header format, while all other responses use the "v1" header format.
// The response header format (v0) is 4 bytes long, and contains exactly one field: correlation_id
// The response header format (v1) contains an additional tag_buffer field.
// https://kafka.apache.org/protocol.html#protocol_messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderVersion {
    V0,
    V1,
}

impl HeaderVersion {
    fn serialize(self, correlation_id: i32, dst: &mut ByteWriter) {
        dst.write_i32(correlation_id);
        if self == HeaderVersion::V1 {
            TaggedFields::write_empty(dst);
        }
    }

    fn deserialize(self, src: &mut ByteReader) -> Result<i32> {
        let correlation_id = src.read_i32()?;
        if self == HeaderVersion::V1 {
            TaggedFields::skip(src)?;
        }
        Ok(correlation_id)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    ApiVersions(ApiVersionsResponseV4),
    Fetch(FetchResponseV16),
    DescribeTopicPartitions(DescribeTopicPartitionsResponseV0),
}

impl ResponseBody {
    pub fn api_key(&self) -> ApiKey {
        match self {
            Self::ApiVersions(_) => ApiKey::ApiVersions,
            Self::Fetch(_) => ApiKey::Fetch,
            Self::DescribeTopicPartitions(_) => ApiKey::DescribeTopicPartitions,
        }
    }

    /// Header version is fixed per api, independent of the body version.
    pub fn header_version(&self) -> HeaderVersion {
        header_version(self.api_key())
    }
}

pub fn header_version(api_key: ApiKey) -> HeaderVersion {
    match api_key {
        ApiKey::ApiVersions => HeaderVersion::V0,
        ApiKey::Fetch | ApiKey::DescribeTopicPartitions => HeaderVersion::V1,
    }
}

impl Serialize for ResponseBody {
    fn serialize(&self, dst: &mut ByteWriter) {
        match self {
            Self::ApiVersions(body) => body.serialize(dst),
            Self::Fetch(body) => body.serialize(dst),
            Self::DescribeTopicPartitions(body) => body.serialize(dst),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub correlation_id: i32,
    pub body: ResponseBody,
}

impl Response {
    pub fn new(correlation_id: i32, body: ResponseBody) -> Self {
        Self {
            correlation_id,
            body,
        }
    }

    /// Decodes a response payload (without the frame length). Responses do not name their api,
    /// so the caller has to know which request it answers.
    pub fn deserialize(api_key: ApiKey, src: &mut ByteReader) -> Result<Self> {
        let correlation_id = header_version(api_key).deserialize(src)?;
        let body = match api_key {
            ApiKey::ApiVersions => ResponseBody::ApiVersions(ApiVersionsResponseV4::deserialize(src)?),
            ApiKey::Fetch => ResponseBody::Fetch(FetchResponseV16::deserialize(src)?),
            ApiKey::DescribeTopicPartitions => ResponseBody::DescribeTopicPartitions(
                DescribeTopicPartitionsResponseV0::deserialize(src)?,
            ),
        };
        src.expect_consumed("response")?;

        Ok(Self {
            correlation_id,
            body,
        })
    }
}

impl Serialize for Response {
    fn serialize(&self, dst: &mut ByteWriter) {
        self.body
            .header_version()
            .serialize(self.correlation_id, dst);
        self.body.serialize(dst);
    }
}
