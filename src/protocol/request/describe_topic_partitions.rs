use crate::protocol::codec::{ByteReader, ByteWriter};
use crate::protocol::types::{CompactArray, CompactString, Deserialize, Serialize, TaggedFields};
use crate::protocol::Result;

// https://kafka.apache.org/protocol.html#The_Messages_DescribeTopicPartitions
#[derive(Debug, Clone, PartialEq)]
pub struct DescribeTopicPartitionsRequestV0 {
    pub topics: Option<Vec<TopicRequest>>,
    pub response_partition_limit: i32,
    pub cursor: Option<Cursor>,
}

impl DescribeTopicPartitionsRequestV0 {
    pub fn topic_names(&self) -> impl Iterator<Item = &str> {
        self.topics
            .iter()
            .flatten()
            .filter_map(|t| t.name.as_deref())
    }
}

impl Deserialize for DescribeTopicPartitionsRequestV0 {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let topics = CompactArray::deserialize(src, TopicRequest::deserialize)?;
        let response_partition_limit = src.read_i32()?;
        let cursor = Cursor::deserialize_nullable(src)?;
        TaggedFields::skip(src)?;

        Ok(Self {
            topics,
            response_partition_limit,
            cursor,
        })
    }
}

impl Serialize for DescribeTopicPartitionsRequestV0 {
    fn serialize(&self, dst: &mut ByteWriter) {
        CompactArray::serialize(dst, self.topics.as_deref(), TopicRequest::serialize);
        dst.write_i32(self.response_partition_limit);
        Cursor::serialize_nullable(self.cursor.as_ref(), dst);
        TaggedFields::write_empty(dst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicRequest {
    pub name: Option<String>,
}

impl Deserialize for TopicRequest {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let name = CompactString::deserialize(src)?;
        TaggedFields::skip(src)?;
        Ok(Self { name })
    }
}

impl Serialize for TopicRequest {
    fn serialize(&self, dst: &mut ByteWriter) {
        CompactString::serialize(dst, self.name.as_deref());
        TaggedFields::write_empty(dst);
    }
}

/// Pagination cursor, shared by the request and the response.
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    pub topic_name: Option<String>,
    pub partition_index: i32,
}

impl Cursor {
    // nullable structs are prefixed by -1 (null) or 1 (present)
    const NULL: i8 = -1;
    const PRESENT: i8 = 1;

    pub fn deserialize_nullable(src: &mut ByteReader) -> Result<Option<Self>> {
        match src.read_i8()? {
            Self::NULL => Ok(None),
            _ => Self::deserialize(src).map(Some),
        }
    }

    pub fn serialize_nullable(cursor: Option<&Self>, dst: &mut ByteWriter) {
        match cursor {
            Some(cursor) => {
                dst.write_i8(Self::PRESENT);
                cursor.serialize(dst);
            }
            None => dst.write_i8(Self::NULL),
        }
    }
}

impl Deserialize for Cursor {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let topic_name = CompactString::deserialize(src)?;
        let partition_index = src.read_i32()?;
        TaggedFields::skip(src)?;
        Ok(Self {
            topic_name,
            partition_index,
        })
    }
}

impl Serialize for Cursor {
    fn serialize(&self, dst: &mut ByteWriter) {
        CompactString::serialize(dst, self.topic_name.as_deref());
        dst.write_i32(self.partition_index);
        TaggedFields::write_empty(dst);
    }
}
