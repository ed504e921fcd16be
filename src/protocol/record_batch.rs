//! On-disk log format used by the cluster metadata log.
//!
//! A log file is a plain sequence of record batches. Each batch wraps records, and each record
//! wraps a typed metadata value.
// https://kafka.apache.org/documentation/#recordbatch

use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use tracing::debug;

use super::codec::{ByteReader, ByteWriter};
use super::types::{
    Array, CompactArray, CompactBytes, CompactString, Deserialize, Serialize, TaggedFields, Uuid,
};
use super::{ProtocolError, Result};

/// Current record batch format version.
pub const MAGIC: i8 = 2;

/// Partition leader epoch, magic and crc: the part of the batch length not covered by the crc.
const CRC_PREFIX_SIZE: usize = 4 + 1 + 4;

fn to_len(len: i64) -> Result<usize> {
    usize::try_from(len).map_err(|_| ProtocolError::InvalidLength(len))
}

/// A record batch is the format that Kafka uses to store multiple records.
///
/// The CRC-32C stored in the batch is verified on decode and recomputed on encode, so it is not
/// kept as a field.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    /// Offset of the first record in this batch.
    pub base_offset: i64,
    /// Epoch of the leader for this partition. Incremented by 1 whenever the partition leader
    /// changes; used to detect out of order writes.
    pub partition_leader_epoch: i32,
    /// Version of the record batch format.
    pub magic: i8,
    /// bit 0~2: compression codec, bit 3: timestampType, bit 4: isTransactional,
    /// bit 5: isControlBatch, bit 6: hasDeleteHorizonMs, bit 7~15: unused
    pub attributes: i16,
    /// Difference between the last offset of this record batch and the base offset.
    pub last_offset_delta: i32,
    pub base_timestamp: i64,
    pub max_timestamp: i64,
    /// -1 when the producer id is not set.
    pub producer_id: i64,
    /// -1 when not applicable.
    pub producer_epoch: i16,
    /// Sequence number of the first record, used for ordering and deduplication of produced
    /// records.
    pub base_sequence: i32,
    pub records: Vec<Record>,
}

impl RecordBatch {
    /// A batch with the envelope fields a controller writes for metadata records.
    pub fn new(base_offset: i64, records: Vec<Record>) -> Self {
        let last_offset_delta = records.len().saturating_sub(1) as i32;
        Self {
            base_offset,
            partition_leader_epoch: 1,
            magic: MAGIC,
            attributes: 0,
            last_offset_delta,
            base_timestamp: 0,
            max_timestamp: 0,
            producer_id: -1,
            producer_epoch: -1,
            base_sequence: -1,
            records,
        }
    }
}

impl Deserialize for RecordBatch {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let base_offset = src.read_i64()?;
        // Batch Length excludes the Base Offset and the Batch Length itself
        let batch_length = src.read_i32()?;
        let mut src = src.scope(to_len(batch_length.into())?)?;

        let partition_leader_epoch = src.read_i32()?;
        let magic = src.read_i8()?;

        // The CRC covers the data from the attributes to the end of the batch
        let stored = src.read_u32()?;
        let computed = crc32c::crc32c(src.peek_remaining());
        if stored != computed {
            return Err(ProtocolError::ChecksumMismatch { stored, computed });
        }

        let attributes = src.read_i16()?;
        let last_offset_delta = src.read_i32()?;
        let base_timestamp = src.read_i64()?;
        let max_timestamp = src.read_i64()?;
        let producer_id = src.read_i64()?;
        let producer_epoch = src.read_i16()?;
        let base_sequence = src.read_i32()?;
        let records = Array::deserialize(&mut src, Record::deserialize)?.unwrap_or_default();
        src.expect_consumed("record batch")?;

        Ok(Self {
            base_offset,
            partition_leader_epoch,
            magic,
            attributes,
            last_offset_delta,
            base_timestamp,
            max_timestamp,
            producer_id,
            producer_epoch,
            base_sequence,
            records,
        })
    }
}

impl RecordBatch {
    /// Writes the batch, computing its length and checksum. Fails, writing nothing, if the
    /// record count or the batch length does not fit an INT32.
    pub fn serialize(&self, dst: &mut ByteWriter) -> Result<()> {
        let mut checked = ByteWriter::new();
        checked.write_i16(self.attributes);
        checked.write_i32(self.last_offset_delta);
        checked.write_i64(self.base_timestamp);
        checked.write_i64(self.max_timestamp);
        checked.write_i64(self.producer_id);
        checked.write_i16(self.producer_epoch);
        checked.write_i32(self.base_sequence);
        Array::serialize(&mut checked, Some(self.records.as_slice()), Record::serialize)?;

        let batch_length = CRC_PREFIX_SIZE + checked.len();
        let batch_length = i32::try_from(batch_length)
            .map_err(|_| ProtocolError::InvalidLength(batch_length as i64))?;

        dst.write_i64(self.base_offset);
        dst.write_i32(batch_length);
        dst.write_i32(self.partition_leader_epoch);
        dst.write_i8(self.magic);
        dst.write_u32(crc32c::crc32c(checked.as_bytes()));
        dst.write_raw(checked.as_bytes());
        Ok(())
    }
}

/// A record is the format that Kafka uses to store a single record.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Currently unused by the protocol.
    pub attributes: i8,
    /// Difference between the timestamp of the record and the base timestamp of the batch.
    pub timestamp_delta: i64,
    /// Difference between the offset of the record and the base offset of the batch.
    pub offset_delta: i64,
    pub key: Option<Bytes>,
    /// Version of the value framing, currently 1.
    pub frame_version: u8,
    /// Schema version of the typed value.
    pub value_version: u8,
    pub value: RecordValue,
    pub headers: Option<Vec<RecordHeader>>,
}

impl Record {
    /// A metadata record with the frame and schema versions current controllers write.
    pub fn new(offset_delta: i64, value: RecordValue) -> Self {
        Self {
            attributes: 0,
            timestamp_delta: 0,
            offset_delta,
            key: None,
            frame_version: 1,
            value_version: value.current_version(),
            value,
            headers: None,
        }
    }
}

impl Deserialize for Record {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        // Length is calculated from the attributes field to the end of the record
        let length = src.read_signed_varint()?;
        let mut src = src.scope(to_len(length)?)?;

        let attributes = src.read_i8()?;
        let timestamp_delta = src.read_signed_varint()?;
        let offset_delta = src.read_signed_varint()?;
        let key = CompactBytes::deserialize(&mut src)?;

        let value_length = src.read_signed_varint()?;
        let mut value = src.scope(to_len(value_length)?)?;
        let frame_version = value.read_u8()?;
        let record_type = value.read_u8()?;
        let value_version = value.read_u8()?;
        let record_type = RecordType::try_from(record_type)
            .map_err(|_| ProtocolError::UnknownRecordType(record_type))?;
        let value = RecordValue::deserialize(record_type, &mut value)?;

        let headers = CompactArray::deserialize(&mut src, RecordHeader::deserialize)?;
        src.expect_consumed("record")?;

        Ok(Self {
            attributes,
            timestamp_delta,
            offset_delta,
            key,
            frame_version,
            value_version,
            value,
            headers,
        })
    }
}

impl Serialize for Record {
    fn serialize(&self, dst: &mut ByteWriter) {
        let mut value = ByteWriter::new();
        value.write_u8(self.frame_version);
        value.write_u8(self.value.record_type().into());
        value.write_u8(self.value_version);
        self.value.serialize(&mut value);

        let mut body = ByteWriter::new();
        body.write_i8(self.attributes);
        body.write_signed_varint(self.timestamp_delta);
        body.write_signed_varint(self.offset_delta);
        CompactBytes::serialize(&mut body, self.key.as_deref());
        body.write_signed_varint(value.len() as i64);
        body.write_raw(value.as_bytes());
        CompactArray::serialize(&mut body, self.headers.as_deref(), RecordHeader::serialize);

        dst.write_signed_varint(body.len() as i64);
        dst.write_raw(body.as_bytes());
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordHeader {
    pub key: Option<String>,
    pub value: Option<Bytes>,
}

impl Deserialize for RecordHeader {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let key = CompactString::deserialize(src)?;
        let value = CompactBytes::deserialize(src)?;
        Ok(Self { key, value })
    }
}

impl Serialize for RecordHeader {
    fn serialize(&self, dst: &mut ByteWriter) {
        CompactString::serialize(dst, self.key.as_deref());
        CompactBytes::serialize(dst, self.value.as_deref());
    }
}

/// Type tag of a metadata record value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RecordType {
    Topic = 2,
    Partition = 3,
    FeatureLevel = 12,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordValue {
    Topic(TopicRecord),
    Partition(PartitionRecord),
    FeatureLevel(FeatureLevelRecord),
}

impl RecordValue {
    pub fn record_type(&self) -> RecordType {
        match self {
            Self::Topic(_) => RecordType::Topic,
            Self::Partition(_) => RecordType::Partition,
            Self::FeatureLevel(_) => RecordType::FeatureLevel,
        }
    }

    fn current_version(&self) -> u8 {
        match self {
            Self::Topic(_) | Self::FeatureLevel(_) => 0,
            Self::Partition(_) => 1,
        }
    }

    /// Decodes the payload that follows the frame version, type and version bytes.
    /// The payload has to fill `src` exactly.
    fn deserialize(record_type: RecordType, src: &mut ByteReader) -> Result<Self> {
        let value = match record_type {
            RecordType::Topic => Self::Topic(TopicRecord::deserialize(src)?),
            RecordType::Partition => Self::Partition(PartitionRecord::deserialize(src)?),
            RecordType::FeatureLevel => Self::FeatureLevel(FeatureLevelRecord::deserialize(src)?),
        };
        src.expect_consumed("record value")?;
        Ok(value)
    }
}

impl Serialize for RecordValue {
    fn serialize(&self, dst: &mut ByteWriter) {
        match self {
            Self::Topic(v) => v.serialize(dst),
            Self::Partition(v) => v.serialize(dst),
            Self::FeatureLevel(v) => v.serialize(dst),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicRecord {
    pub name: Option<String>,
    pub id: Uuid,
}

impl Deserialize for TopicRecord {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let name = CompactString::deserialize(src)?;
        let id = Uuid::deserialize(src)?;
        TaggedFields::skip(src)?;
        Ok(Self { name, id })
    }
}

impl Serialize for TopicRecord {
    fn serialize(&self, dst: &mut ByteWriter) {
        CompactString::serialize(dst, self.name.as_deref());
        self.id.serialize(dst);
        TaggedFields::write_empty(dst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionRecord {
    pub partition_id: i32,
    pub topic_id: Uuid,
    pub replicas: Option<Vec<i32>>,
    /// The in-sync replicas of this partition
    pub in_sync_replicas: Option<Vec<i32>>,
    /// The replicas that we are in the process of removing
    pub removing_replicas: Option<Vec<i32>>,
    pub adding_replicas: Option<Vec<i32>>,
    pub leader_id: i32,
    pub leader_epoch: i32,
    pub partition_epoch: i32,
    pub directories: Option<Vec<Uuid>>,
}

impl Deserialize for PartitionRecord {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let partition_id = src.read_i32()?;
        let topic_id = Uuid::deserialize(src)?;
        let replicas = CompactArray::deserialize(src, i32::deserialize)?;
        let in_sync_replicas = CompactArray::deserialize(src, i32::deserialize)?;
        let removing_replicas = CompactArray::deserialize(src, i32::deserialize)?;
        let adding_replicas = CompactArray::deserialize(src, i32::deserialize)?;
        let leader_id = src.read_i32()?;
        let leader_epoch = src.read_i32()?;
        let partition_epoch = src.read_i32()?;
        let directories = CompactArray::deserialize(src, Uuid::deserialize)?;
        TaggedFields::skip(src)?;

        Ok(Self {
            partition_id,
            topic_id,
            replicas,
            in_sync_replicas,
            removing_replicas,
            adding_replicas,
            leader_id,
            leader_epoch,
            partition_epoch,
            directories,
        })
    }
}

impl Serialize for PartitionRecord {
    fn serialize(&self, dst: &mut ByteWriter) {
        dst.write_i32(self.partition_id);
        self.topic_id.serialize(dst);
        CompactArray::serialize(dst, self.replicas.as_deref(), i32::serialize);
        CompactArray::serialize(dst, self.in_sync_replicas.as_deref(), i32::serialize);
        CompactArray::serialize(dst, self.removing_replicas.as_deref(), i32::serialize);
        CompactArray::serialize(dst, self.adding_replicas.as_deref(), i32::serialize);
        dst.write_i32(self.leader_id);
        dst.write_i32(self.leader_epoch);
        dst.write_i32(self.partition_epoch);
        CompactArray::serialize(dst, self.directories.as_deref(), Uuid::serialize);
        TaggedFields::write_empty(dst);
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureLevelRecord {
    pub name: Option<String>,
    pub feature_level: i16,
}

impl Deserialize for FeatureLevelRecord {
    fn deserialize(src: &mut ByteReader) -> Result<Self> {
        let name = CompactString::deserialize(src)?;
        let feature_level = src.read_i16()?;
        TaggedFields::skip(src)?;
        Ok(Self {
            name,
            feature_level,
        })
    }
}

impl Serialize for FeatureLevelRecord {
    fn serialize(&self, dst: &mut ByteWriter) {
        CompactString::serialize(dst, self.name.as_deref());
        dst.write_i16(self.feature_level);
        TaggedFields::write_empty(dst);
    }
}

/// Broker metadata recovered from a full scan of the metadata log, in log order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterMetadata {
    pub topics: Vec<TopicRecord>,
    pub partitions: Vec<PartitionRecord>,
    pub feature_levels: Vec<FeatureLevelRecord>,
}

impl ClusterMetadata {
    /// The most recent record for a topic name.
    pub fn topic_by_name(&self, name: &str) -> Option<&TopicRecord> {
        self.topics
            .iter()
            .rev()
            .find(|t| t.name.as_deref() == Some(name))
    }

    pub fn topic_by_id(&self, id: &Uuid) -> Option<&TopicRecord> {
        self.topics.iter().rev().find(|t| t.id == *id)
    }

    pub fn partitions_of<'a>(&'a self, topic_id: &'a Uuid) -> impl Iterator<Item = &'a PartitionRecord> {
        self.partitions.iter().filter(move |p| p.topic_id == *topic_id)
    }

    pub fn feature_level(&self, name: &str) -> Option<i16> {
        self.feature_levels
            .iter()
            .rev()
            .find(|f| f.name.as_deref() == Some(name))
            .map(|f| f.feature_level)
    }

    fn apply(&mut self, value: RecordValue) {
        match value {
            RecordValue::Topic(topic) => self.topics.push(topic),
            RecordValue::Partition(partition) => self.partitions.push(partition),
            RecordValue::FeatureLevel(feature) => self.feature_levels.push(feature),
        }
    }
}

/// Decodes every batch of a log file.
pub fn read_batches(log: Bytes) -> Result<Vec<RecordBatch>> {
    let mut src = ByteReader::new(log);
    let mut batches = Vec::new();
    while !src.is_empty() {
        batches.push(RecordBatch::deserialize(&mut src)?);
    }
    Ok(batches)
}

/// Scans a whole metadata log. Any decode failure fails the scan; there are no partial results.
pub fn scan_log(log: Bytes) -> Result<ClusterMetadata> {
    let batches = read_batches(log)?;

    let mut metadata = ClusterMetadata::default();
    for batch in &batches {
        for record in &batch.records {
            metadata.apply(record.value.clone());
        }
    }

    debug!(
        batches = batches.len(),
        topics = metadata.topics.len(),
        partitions = metadata.partitions.len(),
        feature_levels = metadata.feature_levels.len(),
        "scanned metadata log"
    );
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOO_ID: Uuid = Uuid::from_bytes([
        0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x40, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        0x91,
    ]);

    fn topic(name: &str, id: Uuid) -> RecordValue {
        RecordValue::Topic(TopicRecord {
            name: Some(name.to_string()),
            id,
        })
    }

    fn partition(partition_id: i32, topic_id: Uuid) -> RecordValue {
        RecordValue::Partition(PartitionRecord {
            partition_id,
            topic_id,
            replicas: Some(vec![1]),
            in_sync_replicas: Some(vec![1]),
            removing_replicas: Some(vec![]),
            adding_replicas: Some(vec![]),
            leader_id: 1,
            leader_epoch: 0,
            partition_epoch: 0,
            directories: Some(vec![Uuid::from_bytes([0x10; 16])]),
        })
    }

    fn encode(batches: &[RecordBatch]) -> Bytes {
        let mut w = ByteWriter::new();
        for batch in batches {
            batch.serialize(&mut w).unwrap();
        }
        w.freeze()
    }

    /// Wraps raw record bytes into a batch envelope with a valid checksum.
    fn raw_batch(record_count: i32, records: &[u8]) -> Bytes {
        let mut checked = ByteWriter::new();
        checked.write_i16(0);
        checked.write_i32(record_count - 1);
        checked.write_i64(0);
        checked.write_i64(0);
        checked.write_i64(-1);
        checked.write_i16(-1);
        checked.write_i32(-1);
        checked.write_i32(record_count);
        checked.write_raw(records);

        let mut w = ByteWriter::new();
        w.write_i64(0);
        w.write_i32((CRC_PREFIX_SIZE + checked.len()) as i32);
        w.write_i32(1);
        w.write_i8(MAGIC);
        w.write_u32(crc32c::crc32c(checked.as_bytes()));
        w.write_raw(checked.as_bytes());
        w.freeze()
    }

    /// A record whose value is given verbatim.
    fn raw_record(value: &[u8]) -> Vec<u8> {
        let mut body = ByteWriter::new();
        body.write_i8(0);
        body.write_signed_varint(0);
        body.write_signed_varint(0);
        CompactBytes::serialize(&mut body, None);
        body.write_signed_varint(value.len() as i64);
        body.write_raw(value);
        CompactArray::serialize::<RecordHeader>(&mut body, Some(&[][..]), RecordHeader::serialize);

        let mut w = ByteWriter::new();
        w.write_signed_varint(body.len() as i64);
        w.write_raw(body.as_bytes());
        w.as_bytes().to_vec()
    }

    #[test]
    fn scan_topic_and_partition() {
        let log = encode(&[RecordBatch::new(
            0,
            vec![
                Record::new(0, topic("foo", FOO_ID)),
                Record::new(1, partition(0, FOO_ID)),
            ],
        )]);

        let metadata = scan_log(log).unwrap();
        assert_eq!(metadata.topics.len(), 1);
        assert_eq!(metadata.partitions.len(), 1);

        let foo = metadata.topic_by_name("foo").unwrap();
        assert_eq!(foo.id, FOO_ID);
        assert_eq!(metadata.partitions[0].topic_id, foo.id);
        assert_eq!(metadata.partitions_of(&foo.id).count(), 1);
        assert!(metadata.topic_by_name("bar").is_none());
    }

    #[test]
    fn scan_multiple_batches() {
        let bar_id = Uuid::from_bytes([0xba; 16]);
        let log = encode(&[
            RecordBatch::new(
                0,
                vec![Record::new(
                    0,
                    RecordValue::FeatureLevel(FeatureLevelRecord {
                        name: Some("metadata.version".to_string()),
                        feature_level: 20,
                    }),
                )],
            ),
            RecordBatch::new(
                1,
                vec![
                    Record::new(0, topic("bar", bar_id)),
                    Record::new(1, partition(0, bar_id)),
                    Record::new(2, partition(1, bar_id)),
                ],
            ),
            RecordBatch::new(4, vec![Record::new(0, topic("foo", FOO_ID))]),
        ]);

        let metadata = scan_log(log).unwrap();
        assert_eq!(metadata.feature_level("metadata.version"), Some(20));
        assert_eq!(metadata.topic_by_id(&FOO_ID).unwrap().name.as_deref(), Some("foo"));
        assert_eq!(metadata.partitions_of(&bar_id).count(), 2);
        assert_eq!(metadata.partitions_of(&FOO_ID).count(), 0);
    }

    #[test]
    fn batch_round_trip() {
        let mut record = Record::new(0, partition(3, FOO_ID));
        record.key = Some(Bytes::from_static(b"k"));
        record.timestamp_delta = -5;
        record.headers = Some(vec![RecordHeader {
            key: Some("h".to_string()),
            value: None,
        }]);
        let mut batch = RecordBatch::new(17, vec![record, Record::new(1, topic("foo", FOO_ID))]);
        batch.base_timestamp = 1_726_045_943_832;
        batch.max_timestamp = 1_726_045_943_832;

        let batches = read_batches(encode(&[batch.clone()])).unwrap();
        assert_eq!(batches, vec![batch]);
    }

    #[test]
    fn batch_length_excludes_offset_and_length() {
        let log = encode(&[RecordBatch::new(0, vec![])]);
        let declared = i32::from_be_bytes([log[8], log[9], log[10], log[11]]) as usize;
        assert_eq!(declared, log.len() - 12);
        assert_eq!(log[16], MAGIC as u8);
    }

    #[test]
    fn corrupted_batch_fails_checksum() {
        let log = encode(&[RecordBatch::new(0, vec![Record::new(0, topic("foo", FOO_ID))])]);
        let mut corrupted = log.to_vec();
        let last = corrupted.len() - 3;
        corrupted[last] ^= 0x01;

        assert!(matches!(
            scan_log(corrupted.into()),
            Err(ProtocolError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn unknown_record_type() {
        let log = raw_batch(1, &raw_record(&[1, 99, 0]));
        assert!(matches!(
            scan_log(log),
            Err(ProtocolError::UnknownRecordType(99))
        ));
    }

    #[test]
    fn residual_value_bytes_are_a_schema_mismatch() {
        let mut value = ByteWriter::new();
        value.write_u8(1);
        value.write_u8(RecordType::FeatureLevel.into());
        value.write_u8(0);
        FeatureLevelRecord {
            name: Some("x".to_string()),
            feature_level: 1,
        }
        .serialize(&mut value);
        value.write_u8(0xee);

        let log = raw_batch(1, &raw_record(value.as_bytes()));
        assert!(matches!(
            scan_log(log),
            Err(ProtocolError::DecodeSchemaMismatch {
                what: "record value",
                residual: 1
            })
        ));
    }

    #[test]
    fn truncated_log_yields_nothing() {
        let log = encode(&[
            RecordBatch::new(0, vec![Record::new(0, topic("foo", FOO_ID))]),
            RecordBatch::new(1, vec![Record::new(0, partition(0, FOO_ID))]),
        ]);
        let truncated = log.slice(..log.len() - 1);
        assert!(matches!(
            scan_log(truncated),
            Err(ProtocolError::UnexpectedEndOfInput { .. })
        ));
    }

    #[test]
    fn empty_log() {
        assert_eq!(scan_log(Bytes::new()).unwrap(), ClusterMetadata::default());
    }
}
