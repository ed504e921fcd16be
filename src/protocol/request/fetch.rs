use crate::protocol::codec::{ByteReader, ByteWriter};
use crate::protocol::types::{CompactArray, CompactString, Deserialize, Serialize, TaggedFields, Uuid};
use crate::protocol::Result;

// https://kafka.apache.org/protocol.html#The_Messages_Fetch
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchRequestV16 {
    pub max_wait_ms: i32,
    pub min_bytes: i32,
    pub max_bytes: i32,
    pub isolation_level: i8,
    pub session_id: i32,
    pub session_epoch: i32,
    pub topics: Option<Vec<FetchTopic>>,
    pub forgotten_topics_data: Option<Vec<ForgottenTopic>>,
    pub rack_id: Option<String>,
}

impl FetchRequestV16 {
    pub fn topics(&self) -> &[FetchTopic] {
        self.topics.as_deref().unwrap_or_default()
    }
}

impl Deserialize for FetchRequestV16 {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let max_wait_ms = src.read_i32()?;
        let min_bytes = src.read_i32()?;
        let max_bytes = src.read_i32()?;
        let isolation_level = src.read_i8()?;
        let session_id = src.read_i32()?;
        let session_epoch = src.read_i32()?;
        let topics = CompactArray::deserialize(src, FetchTopic::deserialize)?;
        let forgotten_topics_data = CompactArray::deserialize(src, ForgottenTopic::deserialize)?;
        let rack_id = CompactString::deserialize(src)?;
        TaggedFields::skip(src)?;

        Ok(Self {
            max_wait_ms,
            min_bytes,
            max_bytes,
            isolation_level,
            session_id,
            session_epoch,
            topics,
            forgotten_topics_data,
            rack_id,
        })
    }
}

impl Serialize for FetchRequestV16 {
    fn serialize(&self, dst: &mut ByteWriter) {
        dst.write_i32(self.max_wait_ms);
        dst.write_i32(self.min_bytes);
        dst.write_i32(self.max_bytes);
        dst.write_i8(self.isolation_level);
        dst.write_i32(self.session_id);
        dst.write_i32(self.session_epoch);
        CompactArray::serialize(dst, self.topics.as_deref(), FetchTopic::serialize);
        CompactArray::serialize(
            dst,
            self.forgotten_topics_data.as_deref(),
            ForgottenTopic::serialize,
        );
        CompactString::serialize(dst, self.rack_id.as_deref());
        TaggedFields::write_empty(dst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchTopic {
    pub topic_id: Uuid,
    pub partitions: Option<Vec<FetchPartition>>,
}

impl Deserialize for FetchTopic {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let topic_id = Uuid::deserialize(src)?;
        let partitions = CompactArray::deserialize(src, FetchPartition::deserialize)?;
        TaggedFields::skip(src)?;
        Ok(Self {
            topic_id,
            partitions,
        })
    }
}

impl Serialize for FetchTopic {
    fn serialize(&self, dst: &mut ByteWriter) {
        self.topic_id.serialize(dst);
        CompactArray::serialize(dst, self.partitions.as_deref(), FetchPartition::serialize);
        TaggedFields::write_empty(dst);
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchPartition {
    pub partition: i32,
    pub current_leader_epoch: i32,
    pub fetch_offset: i64,
    pub last_fetched_epoch: i32,
    pub log_start_offset: i64,
    pub partition_max_bytes: i32,
}

impl Deserialize for FetchPartition {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let partition = src.read_i32()?;
        let current_leader_epoch = src.read_i32()?;
        let fetch_offset = src.read_i64()?;
        let last_fetched_epoch = src.read_i32()?;
        let log_start_offset = src.read_i64()?;
        let partition_max_bytes = src.read_i32()?;
        TaggedFields::skip(src)?;

        Ok(Self {
            partition,
            current_leader_epoch,
            fetch_offset,
            last_fetched_epoch,
            log_start_offset,
            partition_max_bytes,
        })
    }
}

impl Serialize for FetchPartition {
    fn serialize(&self, dst: &mut ByteWriter) {
        dst.write_i32(self.partition);
        dst.write_i32(self.current_leader_epoch);
        dst.write_i64(self.fetch_offset);
        dst.write_i32(self.last_fetched_epoch);
        dst.write_i64(self.log_start_offset);
        dst.write_i32(self.partition_max_bytes);
        TaggedFields::write_empty(dst);
    }
}

/// Partitions to remove from an incremental fetch session.
#[derive(Debug, Clone, PartialEq)]
pub struct ForgottenTopic {
    pub topic_id: Uuid,
    pub partitions: Option<Vec<i32>>,
}

impl Deserialize for ForgottenTopic {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let topic_id = Uuid::deserialize(src)?;
        let partitions = CompactArray::deserialize(src, ByteReader::read_i32)?;
        TaggedFields::skip(src)?;
        Ok(Self {
            topic_id,
            partitions,
        })
    }
}

impl Serialize for ForgottenTopic {
    fn serialize(&self, dst: &mut ByteWriter) {
        self.topic_id.serialize(dst);
        CompactArray::serialize(dst, self.partitions.as_deref(), i32::serialize);
        TaggedFields::write_empty(dst);
    }
}
