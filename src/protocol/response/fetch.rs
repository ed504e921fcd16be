use bytes::Bytes;

use crate::protocol::codec::{ByteReader, ByteWriter};
use crate::protocol::types::{CompactArray, CompactBytes, Deserialize, Serialize, TaggedFields, Uuid};
use crate::protocol::{ErrorCode, Result};

// https://kafka.apache.org/protocol.html#The_Messages_Fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponseV16 {
    pub throttle_time_ms: i32,
    pub error_code: ErrorCode,
    pub session_id: i32,
    pub responses: Option<Vec<TopicResponse>>,
}

impl FetchResponseV16 {
    pub fn new(session_id: i32, responses: Vec<TopicResponse>) -> Self {
        Self {
            throttle_time_ms: 0,
            error_code: ErrorCode::None,
            session_id,
            responses: Some(responses),
        }
    }
}

impl Serialize for FetchResponseV16 {
    fn serialize(&self, dst: &mut ByteWriter) {
        dst.write_i32(self.throttle_time_ms);
        dst.write_i16(self.error_code.into());
        if !self.error_code.is_none() {
            return;
        }

        dst.write_i32(self.session_id);
        CompactArray::serialize(dst, self.responses.as_deref(), TopicResponse::serialize);
        TaggedFields::write_empty(dst);
    }
}

impl Deserialize for FetchResponseV16 {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let throttle_time_ms = src.read_i32()?;
        let error_code = ErrorCode::from(src.read_i16()?);
        if !error_code.is_none() {
            return Ok(Self {
                throttle_time_ms,
                error_code,
                session_id: 0,
                responses: None,
            });
        }

        let session_id = src.read_i32()?;
        let responses = CompactArray::deserialize(src, TopicResponse::deserialize)?;
        TaggedFields::skip(src)?;

        Ok(Self {
            throttle_time_ms,
            error_code,
            session_id,
            responses,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicResponse {
    pub topic_id: Uuid,
    pub partitions: Option<Vec<TopicPartition>>,
}

impl TopicResponse {
    pub fn new(topic_id: Uuid, partitions: Vec<TopicPartition>) -> Self {
        Self {
            topic_id,
            partitions: Some(partitions),
        }
    }
}

impl Serialize for TopicResponse {
    fn serialize(&self, dst: &mut ByteWriter) {
        self.topic_id.serialize(dst);
        CompactArray::serialize(dst, self.partitions.as_deref(), TopicPartition::serialize);
        TaggedFields::write_empty(dst);
    }
}

impl Deserialize for TopicResponse {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let topic_id = Uuid::deserialize(src)?;
        let partitions = CompactArray::deserialize(src, TopicPartition::deserialize)?;
        TaggedFields::skip(src)?;
        Ok(Self {
            topic_id,
            partitions,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicPartition {
    pub partition_index: i32,
    pub error_code: ErrorCode,
    pub high_watermark: i64,
    pub last_stable_offset: i64,
    pub log_start_offset: i64,
    pub aborted_transactions: Option<Vec<AbortedTransaction>>,
    pub preferred_read_replica: i32,
    /// Raw record batches, exactly as stored in the partition log.
    pub records: Option<Bytes>,
}

impl TopicPartition {
    pub fn new(partition_index: i32, error_code: ErrorCode, records: Option<Bytes>) -> Self {
        Self {
            partition_index,
            error_code,
            high_watermark: 0,
            last_stable_offset: 0,
            log_start_offset: 0,
            aborted_transactions: Some(Vec::new()),
            preferred_read_replica: -1,
            records,
        }
    }
}

impl Serialize for TopicPartition {
    fn serialize(&self, dst: &mut ByteWriter) {
        dst.write_i32(self.partition_index);
        dst.write_i16(self.error_code.into());
        dst.write_i64(self.high_watermark);
        dst.write_i64(self.last_stable_offset);
        dst.write_i64(self.log_start_offset);
        CompactArray::serialize(
            dst,
            self.aborted_transactions.as_deref(),
            AbortedTransaction::serialize,
        );
        dst.write_i32(self.preferred_read_replica);
        CompactBytes::serialize(dst, self.records.as_deref());
        TaggedFields::write_empty(dst);
    }
}

impl Deserialize for TopicPartition {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let partition_index = src.read_i32()?;
        let error_code = ErrorCode::from(src.read_i16()?);
        let high_watermark = src.read_i64()?;
        let last_stable_offset = src.read_i64()?;
        let log_start_offset = src.read_i64()?;
        let aborted_transactions = CompactArray::deserialize(src, AbortedTransaction::deserialize)?;
        let preferred_read_replica = src.read_i32()?;
        let records = CompactBytes::deserialize(src)?;
        TaggedFields::skip(src)?;

        Ok(Self {
            partition_index,
            error_code,
            high_watermark,
            last_stable_offset,
            log_start_offset,
            aborted_transactions,
            preferred_read_replica,
            records,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbortedTransaction {
    pub producer_id: i64,
    pub first_offset: i64,
}

impl Serialize for AbortedTransaction {
    fn serialize(&self, dst: &mut ByteWriter) {
        dst.write_i64(self.producer_id);
        dst.write_i64(self.first_offset);
        TaggedFields::write_empty(dst);
    }
}

impl Deserialize for AbortedTransaction {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let producer_id = src.read_i64()?;
        let first_offset = src.read_i64()?;
        TaggedFields::skip(src)?;
        Ok(Self {
            producer_id,
            first_offset,
        })
    }
}
