use crate::protocol::codec::{ByteReader, ByteWriter};
use crate::protocol::request::describe_topic_partitions::Cursor;
use crate::protocol::types::{CompactArray, CompactString, Deserialize, Serialize, TaggedFields, Uuid};
use crate::protocol::{ErrorCode, Result};

// https://kafka.apache.org/protocol.html#The_Messages_DescribeTopicPartitions
#[derive(Debug, Clone, PartialEq)]
pub struct DescribeTopicPartitionsResponseV0 {
    pub throttle_time_ms: i32,
    pub topics: Option<Vec<Topic>>,
    pub next_cursor: Option<Cursor>,
}

impl DescribeTopicPartitionsResponseV0 {
    pub fn new(topics: Vec<Topic>) -> Self {
        Self {
            throttle_time_ms: 0,
            topics: Some(topics),
            next_cursor: None,
        }
    }
}

impl Serialize for DescribeTopicPartitionsResponseV0 {
    fn serialize(&self, dst: &mut ByteWriter) {
        dst.write_i32(self.throttle_time_ms);
        CompactArray::serialize(dst, self.topics.as_deref(), Topic::serialize);
        Cursor::serialize_nullable(self.next_cursor.as_ref(), dst);
        TaggedFields::write_empty(dst);
    }
}

impl Deserialize for DescribeTopicPartitionsResponseV0 {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let throttle_time_ms = src.read_i32()?;
        let topics = CompactArray::deserialize(src, Topic::deserialize)?;
        let next_cursor = Cursor::deserialize_nullable(src)?;
        TaggedFields::skip(src)?;

        Ok(Self {
            throttle_time_ms,
            topics,
            next_cursor,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Topic {
    pub error_code: ErrorCode,
    pub name: Option<String>,
    pub topic_id: Uuid,
    pub is_internal: bool,
    pub partitions: Option<Vec<Partition>>,
    /// A 4-byte integer (bitfield) representing the authorized operations for this topic.
    pub topic_authorized_operations: i32,
}

impl Serialize for Topic {
    fn serialize(&self, dst: &mut ByteWriter) {
        dst.write_i16(self.error_code.into());
        CompactString::serialize(dst, self.name.as_deref());
        self.topic_id.serialize(dst);
        dst.write_bool(self.is_internal);
        CompactArray::serialize(dst, self.partitions.as_deref(), Partition::serialize);
        dst.write_i32(self.topic_authorized_operations);
        TaggedFields::write_empty(dst);
    }
}

impl Deserialize for Topic {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let error_code = ErrorCode::from(src.read_i16()?);
        let name = CompactString::deserialize(src)?;
        let topic_id = Uuid::deserialize(src)?;
        let is_internal = src.read_bool()?;
        let partitions = CompactArray::deserialize(src, Partition::deserialize)?;
        let topic_authorized_operations = src.read_i32()?;
        TaggedFields::skip(src)?;

        Ok(Self {
            error_code,
            name,
            topic_id,
            is_internal,
            partitions,
            topic_authorized_operations,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub error_code: ErrorCode,
    pub partition_index: i32,
    pub leader_id: i32,
    pub leader_epoch: i32,
    pub replica_nodes: Option<Vec<i32>>,
    pub isr_nodes: Option<Vec<i32>>,
    pub eligible_leader_replicas: Option<Vec<i32>>,
    pub last_known_elr: Option<Vec<i32>>,
    pub offline_replicas: Option<Vec<i32>>,
}

impl Serialize for Partition {
    fn serialize(&self, dst: &mut ByteWriter) {
        dst.write_i16(self.error_code.into());
        dst.write_i32(self.partition_index);
        dst.write_i32(self.leader_id);
        dst.write_i32(self.leader_epoch);
        for nodes in [
            &self.replica_nodes,
            &self.isr_nodes,
            &self.eligible_leader_replicas,
            &self.last_known_elr,
            &self.offline_replicas,
        ] {
            CompactArray::serialize(dst, nodes.as_deref(), i32::serialize);
        }
        TaggedFields::write_empty(dst);
    }
}

impl Deserialize for Partition {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let error_code = ErrorCode::from(src.read_i16()?);
        let partition_index = src.read_i32()?;
        let leader_id = src.read_i32()?;
        let leader_epoch = src.read_i32()?;
        let replica_nodes = CompactArray::deserialize(src, i32::deserialize)?;
        let isr_nodes = CompactArray::deserialize(src, i32::deserialize)?;
        let eligible_leader_replicas = CompactArray::deserialize(src, i32::deserialize)?;
        let last_known_elr = CompactArray::deserialize(src, i32::deserialize)?;
        let offline_replicas = CompactArray::deserialize(src, i32::deserialize)?;
        TaggedFields::skip(src)?;

        Ok(Self {
            error_code,
            partition_index,
            leader_id,
            leader_epoch,
            replica_nodes,
            isr_nodes,
            eligible_leader_replicas,
            last_known_elr,
            offline_replicas,
        })
    }
}
