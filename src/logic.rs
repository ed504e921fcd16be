pub mod fetch_responses;
pub mod topic_partitions;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytes::Bytes;

use crate::config::Config;
use crate::protocol::dispatch::Registry;
use crate::protocol::record_batch::{scan_log, ClusterMetadata};
use crate::protocol::request::{Request, RequestBody};
use crate::protocol::response::{ApiVersionsResponseV4, Response, ResponseBody};

/// Answers decoded requests. Shared read-only by all connections.
#[derive(Debug, Clone)]
pub struct Broker {
    registry: Arc<Registry>,
    metadata_log: PathBuf,
    log_dir: PathBuf,
}

impl Broker {
    pub fn new(registry: Arc<Registry>, metadata_log: PathBuf, log_dir: PathBuf) -> Self {
        Self {
            registry,
            metadata_log,
            log_dir,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Arc::new(Registry::new(config.describe_topic_partitions_key)),
            config.metadata_log.clone(),
            config.log_dir.clone(),
        )
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn log_dir(&self) -> &PathBuf {
        &self.log_dir
    }

    /// Rebuilds broker metadata from the metadata log. The log is the only source of truth,
    /// so this rescans it on every call.
    pub async fn load_metadata(&self) -> Result<ClusterMetadata> {
        let log = tokio::fs::read(&self.metadata_log)
            .await
            .with_context(|| format!("read metadata log {}", self.metadata_log.display()))?;
        scan_log(Bytes::from(log)).context("scan metadata log")
    }

    pub async fn process(&self, request: Request) -> Result<Response> {
        let correlation_id = request.correlation_id();

        let body = match request.body {
            RequestBody::ApiVersions(_) => ResponseBody::ApiVersions(ApiVersionsResponseV4::new(
                self.registry.supported_versions(),
            )),
            RequestBody::Fetch(req) => ResponseBody::Fetch(
                fetch_responses::process(self, req)
                    .await
                    .context("process fetch request")?,
            ),
            RequestBody::DescribeTopicPartitions(req) => {
                let metadata = self.load_metadata().await?;
                ResponseBody::DescribeTopicPartitions(topic_partitions::process(&metadata, req))
            }
        };

        Ok(Response::new(correlation_id, body))
    }
}
