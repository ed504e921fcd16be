pub mod api_versions;
pub mod describe_topic_partitions;
pub mod fetch;

use super::codec::{ByteReader, ByteWriter};
use super::types::{Deserialize, NullableString, Serialize, TaggedFields};
use super::{ApiKey, Result};

pub use api_versions::ApiVersionsRequestV4;
pub use describe_topic_partitions::DescribeTopicPartitionsRequestV0;
pub use fetch::FetchRequestV16;

/// Request Header v2
// https://kafka.apache.org/protocol.html#protocol_messages
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderV2 {
    pub request_api_key: i16,
    pub request_api_version: i16,
    pub correlation_id: i32,
    /// Uses the legacy INT16 length string, not the compact one.
    pub client_id: Option<String>,
}

impl Deserialize for HeaderV2 {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let request_api_key = src.read_i16()?; // https://kafka.apache.org/protocol.html#protocol_api_keys
        let request_api_version = src.read_i16()?;
        let correlation_id = src.read_i32()?;
        let client_id = NullableString::deserialize(src)?;
        TaggedFields::skip(src)?;

        Ok(Self {
            request_api_key,
            request_api_version,
            correlation_id,
            client_id,
        })
    }
}

impl HeaderV2 {
    /// Fails if the client id does not fit its INT16 length.
    pub fn serialize(&self, dst: &mut ByteWriter) -> Result<()> {
        dst.write_i16(self.request_api_key);
        dst.write_i16(self.request_api_version);
        dst.write_i32(self.correlation_id);
        NullableString::serialize(dst, self.client_id.as_deref())?;
        TaggedFields::write_empty(dst);
        Ok(())
    }
}

/// Request bodies this broker understands, one variant per registered (api key, api version).
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    ApiVersions(ApiVersionsRequestV4),
    Fetch(FetchRequestV16),
    DescribeTopicPartitions(DescribeTopicPartitionsRequestV0),
}

impl RequestBody {
    pub fn api_key(&self) -> ApiKey {
        match self {
            Self::ApiVersions(_) => ApiKey::ApiVersions,
            Self::Fetch(_) => ApiKey::Fetch,
            Self::DescribeTopicPartitions(_) => ApiKey::DescribeTopicPartitions,
        }
    }
}

impl Serialize for RequestBody {
    fn serialize(&self, dst: &mut ByteWriter) {
        match self {
            Self::ApiVersions(body) => body.serialize(dst),
            Self::Fetch(body) => body.serialize(dst),
            Self::DescribeTopicPartitions(body) => body.serialize(dst),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub header: HeaderV2,
    pub body: RequestBody,
}

impl Request {
    pub fn correlation_id(&self) -> i32 {
        self.header.correlation_id
    }

    pub fn serialize(&self, dst: &mut ByteWriter) -> Result<()> {
        self.header.serialize(dst)?;
        self.body.serialize(dst);
        Ok(())
    }
}
