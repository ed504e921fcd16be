use crate::protocol::codec::{ByteReader, ByteWriter};
use crate::protocol::types::{CompactArray, Deserialize, Serialize, TaggedFields};
use crate::protocol::{ErrorCode, Result};

/// Uses the v0 response header.
// https://kafka.apache.org/protocol.html#The_Messages_ApiVersions
#[derive(Debug, Clone, PartialEq)]
pub struct ApiVersionsResponseV4 {
    pub error_code: ErrorCode,
    pub api_keys: Option<Vec<ApiVersionsApiKey>>,
    pub throttle_time_ms: i32,
}

impl ApiVersionsResponseV4 {
    pub fn new(api_keys: Vec<ApiVersionsApiKey>) -> Self {
        Self {
            error_code: ErrorCode::None,
            api_keys: Some(api_keys),
            throttle_time_ms: 0,
        }
    }
}

impl Serialize for ApiVersionsResponseV4 {
    fn serialize(&self, dst: &mut ByteWriter) {
        dst.write_i16(self.error_code.into());
        // a failed response carries nothing but its error code
        if !self.error_code.is_none() {
            return;
        }

        CompactArray::serialize(dst, self.api_keys.as_deref(), ApiVersionsApiKey::serialize);
        dst.write_i32(self.throttle_time_ms);
        TaggedFields::write_empty(dst);
    }
}

impl Deserialize for ApiVersionsResponseV4 {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let error_code = ErrorCode::from(src.read_i16()?);
        if !error_code.is_none() {
            return Ok(Self {
                error_code,
                api_keys: None,
                throttle_time_ms: 0,
            });
        }

        let api_keys = CompactArray::deserialize(src, ApiVersionsApiKey::deserialize)?;
        let throttle_time_ms = src.read_i32()?;
        TaggedFields::skip(src)?;

        Ok(Self {
            error_code,
            api_keys,
            throttle_time_ms,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersionsApiKey {
    pub api_key: i16,
    pub min_version: i16,
    pub max_version: i16,
}

impl Serialize for ApiVersionsApiKey {
    fn serialize(&self, dst: &mut ByteWriter) {
        dst.write_i16(self.api_key);
        dst.write_i16(self.min_version);
        dst.write_i16(self.max_version);
        TaggedFields::write_empty(dst);
    }
}

impl Deserialize for ApiVersionsApiKey {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let api_key = src.read_i16()?;
        let min_version = src.read_i16()?;
        let max_version = src.read_i16()?;
        TaggedFields::skip(src)?;
        Ok(Self {
            api_key,
            min_version,
            max_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_layout() {
        let resp = ApiVersionsResponseV4::new(vec![ApiVersionsApiKey {
            api_key: 18,
            min_version: 0,
            max_version: 4,
        }]);
        let mut w = ByteWriter::new();
        resp.serialize(&mut w);
        assert_eq!(
            w.as_bytes(),
            &[0, 0, 0x02, 0, 18, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0]
        );

        let mut r = ByteReader::new(w.freeze());
        assert_eq!(ApiVersionsResponseV4::deserialize(&mut r).unwrap(), resp);
        assert!(r.is_empty());
    }

    #[test]
    fn error_short_circuits() {
        let resp = ApiVersionsResponseV4 {
            error_code: ErrorCode::UnsupportedVersion,
            api_keys: None,
            throttle_time_ms: 0,
        };
        let mut w = ByteWriter::new();
        resp.serialize(&mut w);
        assert_eq!(w.as_bytes(), &[0, 35]);
        assert_eq!(
            ApiVersionsResponseV4::deserialize(&mut ByteReader::new(w.freeze())).unwrap(),
            resp
        );
    }

    #[test]
    fn null_and_empty_api_keys_differ() {
        for api_keys in [None, Some(vec![])] {
            let resp = ApiVersionsResponseV4 {
                error_code: ErrorCode::None,
                api_keys,
                throttle_time_ms: 5,
            };
            let mut w = ByteWriter::new();
            resp.serialize(&mut w);
            assert_eq!(
                ApiVersionsResponseV4::deserialize(&mut ByteReader::new(w.freeze())).unwrap(),
                resp
            );
        }
    }
}
