use std::collections::BTreeSet;

use crate::protocol::{
    record_batch::{ClusterMetadata, PartitionRecord},
    request::describe_topic_partitions::{Cursor, DescribeTopicPartitionsRequestV0},
    response::describe_topic_partitions::{DescribeTopicPartitionsResponseV0, Partition, Topic},
    types::Uuid,
    ErrorCode,
};

/*
0x00000df8 is 0000 1101 1111 1000 in binary, which grants:
    READ (bit 3), WRITE (bit 4), CREATE (bit 5), DELETE (bit 6), ALTER (bit 7),
    DESCRIBE (bit 8), DESCRIBE_CONFIGS (bit 10), ALTER_CONFIGS (bit 11)
https://github.com/apache/kafka/blob/1962917436f463541f9bb63791b7ed55c23ce8c1/clients/src/main/java/org/apache/kafka/common/acl/AclOperation.java#L44
*/
const TOPIC_AUTHORIZED_OPERATIONS: i32 = 0x0df8;

/// Describes the requested topics from `metadata`, in name order.
///
/// At most `response_partition_limit` partitions are returned in total; when the limit
/// cuts a listing short, `next_cursor` names the first partition that was left out.
pub fn process(
    metadata: &ClusterMetadata,
    req: DescribeTopicPartitionsRequestV0,
) -> DescribeTopicPartitionsResponseV0 {
    let names: BTreeSet<&str> = req.topic_names().collect();
    let start = req.cursor.as_ref().and_then(|c| {
        c.topic_name
            .as_deref()
            .map(|name| (name, c.partition_index))
    });
    let limit = usize::try_from(req.response_partition_limit).unwrap_or(0);

    let mut budget = limit;
    let mut topics = Vec::with_capacity(names.len());
    let mut next_cursor = None;

    for name in names {
        let first_partition = match start {
            Some((cursor_name, _)) if name < cursor_name => continue,
            Some((cursor_name, index)) if name == cursor_name => index,
            _ => 0,
        };

        let Some(topic) = metadata.topic_by_name(name) else {
            topics.push(unknown_topic(name));
            continue;
        };

        let mut records: Vec<&PartitionRecord> = metadata
            .partitions_of(&topic.id)
            .filter(|p| p.partition_id >= first_partition)
            .collect();
        records.sort_by_key(|p| p.partition_id);

        if records.len() > budget {
            next_cursor = Some(Cursor {
                topic_name: Some(name.to_string()),
                partition_index: records[budget].partition_id,
            });
            // a topic is only listed with at least one of its partitions
            if budget == 0 {
                break;
            }
            records.truncate(budget);
        }
        budget -= records.len();

        topics.push(Topic {
            error_code: ErrorCode::None,
            name: Some(name.to_string()),
            topic_id: topic.id,
            is_internal: false,
            partitions: Some(records.into_iter().map(describe_partition).collect()),
            topic_authorized_operations: TOPIC_AUTHORIZED_OPERATIONS,
        });

        if next_cursor.is_some() {
            break;
        }
    }

    DescribeTopicPartitionsResponseV0 {
        next_cursor,
        ..DescribeTopicPartitionsResponseV0::new(topics)
    }
}

fn unknown_topic(name: &str) -> Topic {
    Topic {
        error_code: ErrorCode::UnknownTopicOrPartition,
        name: Some(name.to_string()),
        topic_id: Uuid::NIL,
        is_internal: false,
        partitions: Some(Vec::new()),
        topic_authorized_operations: TOPIC_AUTHORIZED_OPERATIONS,
    }
}

fn describe_partition(record: &PartitionRecord) -> Partition {
    Partition {
        error_code: ErrorCode::None,
        partition_index: record.partition_id,
        leader_id: record.leader_id,
        leader_epoch: record.leader_epoch,
        replica_nodes: Some(record.replicas.clone().unwrap_or_default()),
        isr_nodes: Some(record.in_sync_replicas.clone().unwrap_or_default()),
        eligible_leader_replicas: Some(Vec::new()),
        last_known_elr: Some(Vec::new()),
        offline_replicas: Some(Vec::new()),
    }
}
