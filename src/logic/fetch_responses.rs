use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bytes::Bytes;
use tracing::debug;

use super::Broker;
use crate::protocol::{
    record_batch::ClusterMetadata,
    request::fetch::{FetchRequestV16, FetchTopic},
    response::fetch::{FetchResponseV16, TopicPartition, TopicResponse},
    ErrorCode,
};

/// https://kafka.apache.org/documentation/#log
const FIRST_SEGMENT_FILE: &str = "00000000000000000000.log";

pub async fn process(broker: &Broker, req: FetchRequestV16) -> Result<FetchResponseV16> {
    if req.topics().is_empty() {
        return Ok(FetchResponseV16::new(req.session_id, vec![]));
    }

    let metadata = broker.load_metadata().await?;

    let mut responses = Vec::with_capacity(req.topics().len());
    for topic in req.topics() {
        responses.push(fetch_topic(broker, &metadata, topic).await?);
    }

    Ok(FetchResponseV16::new(req.session_id, responses))
}

fn requested_partitions(topic: &FetchTopic) -> Vec<i32> {
    match topic.partitions.as_deref() {
        Some(partitions) if !partitions.is_empty() => {
            partitions.iter().map(|p| p.partition).collect()
        }
        _ => vec![0],
    }
}

async fn fetch_topic(
    broker: &Broker,
    metadata: &ClusterMetadata,
    topic: &FetchTopic,
) -> Result<TopicResponse> {
    let requested = requested_partitions(topic);

    let Some(record) = metadata.topic_by_id(&topic.topic_id) else {
        debug!(topic_id = %topic.topic_id, "fetch for unknown topic id");
        let partitions = requested
            .into_iter()
            .map(|index| TopicPartition::new(index, ErrorCode::UnknownTopicId, None))
            .collect();
        return Ok(TopicResponse::new(topic.topic_id, partitions));
    };
    let name = record.name.as_deref().unwrap_or_default();

    let mut partitions = Vec::with_capacity(requested.len());
    for index in requested {
        let known = metadata
            .partitions_of(&topic.topic_id)
            .any(|p| p.partition_id == index);
        let partition = if known {
            let path = segment_path(broker.log_dir(), name, index);
            TopicPartition::new(index, ErrorCode::None, read_segment(&path).await?)
        } else {
            TopicPartition::new(index, ErrorCode::UnknownTopicOrPartition, None)
        };
        partitions.push(partition);
    }

    Ok(TopicResponse::new(topic.topic_id, partitions))
}

fn segment_path(log_dir: &Path, topic: &str, partition: i32) -> PathBuf {
    log_dir
        .join(format!("{topic}-{partition}"))
        .join(FIRST_SEGMENT_FILE)
}

/// Raw batches of a partition log, or `None` when nothing was written yet.
async fn read_segment(path: &Path) -> Result<Option<Bytes>> {
    match tokio::fs::read(path).await {
        Ok(data) => Ok(Some(Bytes::from(data))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("read partition log {}", path.display())),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::logic::test_support::write_log;
    use crate::protocol::dispatch::Registry;
    use crate::protocol::record_batch::{
        PartitionRecord, Record, RecordBatch, RecordValue, TopicRecord,
    };
    use crate::protocol::request::fetch::FetchPartition;
    use crate::protocol::types::Uuid;

    const TOPIC_ID: Uuid = Uuid::from_bytes([9; 16]);

    fn broker(dir: &TempDir) -> Broker {
        let topic = RecordValue::Topic(TopicRecord {
            name: Some("paz".to_string()),
            id: TOPIC_ID,
        });
        let partition = RecordValue::Partition(PartitionRecord {
            partition_id: 0,
            topic_id: TOPIC_ID,
            replicas: Some(vec![1]),
            in_sync_replicas: Some(vec![1]),
            removing_replicas: Some(vec![]),
            adding_replicas: Some(vec![]),
            leader_id: 1,
            leader_epoch: 0,
            partition_epoch: 0,
            directories: Some(vec![]),
        });
        let log = write_log(
            dir.path(),
            "__cluster_metadata-0/00000000000000000000.log",
            &[RecordBatch::new(
                0,
                vec![Record::new(0, topic), Record::new(1, partition)],
            )],
        );
        Broker::new(Arc::new(Registry::default()), log, dir.path().to_path_buf())
    }

    fn request(topic_id: Uuid, partitions: &[i32]) -> FetchRequestV16 {
        FetchRequestV16 {
            session_id: 3,
            topics: Some(vec![FetchTopic {
                topic_id,
                partitions: Some(
                    partitions
                        .iter()
                        .map(|&partition| FetchPartition {
                            partition,
                            current_leader_epoch: 0,
                            fetch_offset: 0,
                            last_fetched_epoch: -1,
                            log_start_offset: -1,
                            partition_max_bytes: 1024,
                        })
                        .collect(),
                ),
            }]),
            ..FetchRequestV16::default()
        }
    }

    #[tokio::test]
    async fn no_topics_skips_metadata() {
        // metadata log does not exist, so any scan would fail
        let dir = TempDir::new().unwrap();
        let broker = Broker::new(
            Arc::new(Registry::default()),
            dir.path().join("absent.log"),
            dir.path().to_path_buf(),
        );
        let resp = process(&broker, FetchRequestV16::default()).await.unwrap();
        assert_eq!(resp.error_code, ErrorCode::None);
        assert_eq!(resp.responses, Some(vec![]));
    }

    #[tokio::test]
    async fn unknown_topic_id() {
        let dir = TempDir::new().unwrap();
        let resp = process(&broker(&dir), request(Uuid::from_bytes([1; 16]), &[0]))
            .await
            .unwrap();
        let responses = resp.responses.unwrap();
        let partition = &responses[0].partitions.as_ref().unwrap()[0];
        assert_eq!(partition.error_code, ErrorCode::UnknownTopicId);
        assert_eq!(partition.records, None);
    }

    #[tokio::test]
    async fn known_topic_without_data_log() {
        let dir = TempDir::new().unwrap();
        let resp = process(&broker(&dir), request(TOPIC_ID, &[0]))
            .await
            .unwrap();
        let responses = resp.responses.unwrap();
        let partition = &responses[0].partitions.as_ref().unwrap()[0];
        assert_eq!(partition.error_code, ErrorCode::None);
        assert_eq!(partition.records, None);
    }

    #[tokio::test]
    async fn known_topic_returns_raw_log() {
        let dir = TempDir::new().unwrap();
        let broker = broker(&dir);
        let data = write_log(
            dir.path(),
            "paz-0/00000000000000000000.log",
            &[RecordBatch::new(0, vec![])],
        );
        let expected = std::fs::read(data).unwrap();

        let resp = process(&broker, request(TOPIC_ID, &[0])).await.unwrap();
        let responses = resp.responses.unwrap();
        let partition = &responses[0].partitions.as_ref().unwrap()[0];
        assert_eq!(partition.error_code, ErrorCode::None);
        assert_eq!(partition.records.as_deref(), Some(&expected[..]));
    }

    #[tokio::test]
    async fn unknown_partition_of_known_topic() {
        let dir = TempDir::new().unwrap();
        let resp = process(&broker(&dir), request(TOPIC_ID, &[4]))
            .await
            .unwrap();
        let responses = resp.responses.unwrap();
        let partition = &responses[0].partitions.as_ref().unwrap()[0];
        assert_eq!(partition.partition_index, 4);
        assert_eq!(partition.error_code, ErrorCode::UnknownTopicOrPartition);
    }
}
