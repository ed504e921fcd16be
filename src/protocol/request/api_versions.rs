use crate::protocol::codec::{ByteReader, ByteWriter};
use crate::protocol::types::{CompactString, Deserialize, Serialize, TaggedFields};
use crate::protocol::Result;

// https://kafka.apache.org/protocol.html#The_Messages_ApiVersions
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApiVersionsRequestV4 {
    pub client_software_name: Option<String>,
    pub client_software_version: Option<String>,
}

impl Deserialize for ApiVersionsRequestV4 {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let client_software_name = CompactString::deserialize(src)?;
        let client_software_version = CompactString::deserialize(src)?;
        TaggedFields::skip(src)?;

        Ok(Self {
            client_software_name,
            client_software_version,
        })
    }
}

impl Serialize for ApiVersionsRequestV4 {
    fn serialize(&self, dst: &mut ByteWriter) {
        CompactString::serialize(dst, self.client_software_name.as_deref());
        CompactString::serialize(dst, self.client_software_version.as_deref());
        TaggedFields::write_empty(dst);
    }
}
