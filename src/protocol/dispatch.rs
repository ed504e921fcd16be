//! Request decoding keyed by (api key, api version).

use std::collections::BTreeMap;

use bytes::Bytes;

use super::codec::ByteReader;
use super::request::{
    ApiVersionsRequestV4, DescribeTopicPartitionsRequestV0, FetchRequestV16, HeaderV2, Request,
    RequestBody,
};
use super::response::ApiVersionsApiKey;
use super::types::Deserialize;
use super::{ApiKey, ProtocolError, Result};

/// Decodes the body that follows a request header.
pub type Decoder = fn(&mut ByteReader) -> Result<RequestBody>;

fn api_versions_v4(src: &mut ByteReader) -> Result<RequestBody> {
    ApiVersionsRequestV4::deserialize(src).map(RequestBody::ApiVersions)
}

fn fetch_v16(src: &mut ByteReader) -> Result<RequestBody> {
    FetchRequestV16::deserialize(src).map(RequestBody::Fetch)
}

fn describe_topic_partitions_v0(src: &mut ByteReader) -> Result<RequestBody> {
    DescribeTopicPartitionsRequestV0::deserialize(src).map(RequestBody::DescribeTopicPartitions)
}

/// Immutable table of request decoders. Built once and shared by every connection.
#[derive(Debug, Clone)]
pub struct Registry {
    decoders: BTreeMap<(i16, i16), Decoder>,
}

impl Registry {
    /// The built-in decoders, with topic/partition description served under `describe_key`.
    pub fn new(describe_key: i16) -> Self {
        let decoders: [((i16, i16), Decoder); 3] = [
            ((ApiKey::ApiVersions.into(), 4), api_versions_v4),
            ((ApiKey::Fetch.into(), 16), fetch_v16),
            ((describe_key, 0), describe_topic_partitions_v0),
        ];
        decoders.into_iter().collect()
    }

    pub fn lookup(&self, api_key: i16, api_version: i16) -> Option<Decoder> {
        self.decoders.get(&(api_key, api_version)).copied()
    }

    /// Registered versions collapsed into one min/max range per api key.
    pub fn supported_versions(&self) -> Vec<ApiVersionsApiKey> {
        let mut keys: Vec<ApiVersionsApiKey> = Vec::new();
        // BTreeMap iterates in (key, version) order
        for &(api_key, version) in self.decoders.keys() {
            match keys.last_mut() {
                Some(last) if last.api_key == api_key => last.max_version = version,
                _ => keys.push(ApiVersionsApiKey {
                    api_key,
                    min_version: version,
                    max_version: version,
                }),
            }
        }
        keys
    }

    /// Decodes one frame payload (without its length prefix) into a typed request.
    ///
    /// An unregistered (api key, api version) pair fails with
    /// [`ProtocolError::UnsupportedVersion`], which carries the correlation id so
    /// the caller can still answer with an error frame.
    pub fn decode_request(&self, payload: Bytes) -> Result<Request> {
        let mut src = ByteReader::new(payload);
        let header = HeaderV2::deserialize(&mut src)?;

        let decoder = self
            .lookup(header.request_api_key, header.request_api_version)
            .ok_or(ProtocolError::UnsupportedVersion {
                api_key: header.request_api_key,
                api_version: header.request_api_version,
                correlation_id: header.correlation_id,
            })?;

        let body = decoder(&mut src)?;
        src.expect_consumed("request body")?;

        Ok(Request { header, body })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(ApiKey::DescribeTopicPartitions.into())
    }
}

impl FromIterator<((i16, i16), Decoder)> for Registry {
    fn from_iter<I: IntoIterator<Item = ((i16, i16), Decoder)>>(iter: I) -> Self {
        Self {
            decoders: iter.into_iter().collect(),
        }
    }
}
