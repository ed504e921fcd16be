use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

use crate::protocol::frame::MAX_FRAME_SIZE;

/// Broker answering ApiVersions, Fetch and DescribeTopicPartitions from a KRaft metadata log.
#[derive(Parser, Debug, Clone)]
#[command(name = "kraft-wire")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Address to accept client connections on.
    #[arg(long, default_value = "127.0.0.1:9092")]
    pub listen_addr: SocketAddr,

    /// Cluster metadata log, rescanned for every request that needs topic metadata.
    #[arg(
        long,
        default_value = "/tmp/kraft-combined-logs/__cluster_metadata-0/00000000000000000000.log"
    )]
    pub metadata_log: PathBuf,

    /// Root of the per-partition data logs (`<topic>-<partition>/`).
    #[arg(long, default_value = "/tmp/kraft-combined-logs")]
    pub log_dir: PathBuf,

    /// API key under which DescribeTopicPartitions is served.
    #[arg(long, default_value_t = 75)]
    pub describe_topic_partitions_key: i16,

    /// Largest request frame accepted, in bytes.
    #[arg(long, default_value_t = MAX_FRAME_SIZE)]
    pub max_frame_size: usize,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    pub log_level: Level,

    /// Broker properties file. Accepted for launcher compatibility; its contents are not read.
    pub properties: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["kraft-wire"]).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9092".parse().unwrap());
        assert_eq!(
            config.metadata_log,
            PathBuf::from("/tmp/kraft-combined-logs/__cluster_metadata-0/00000000000000000000.log")
        );
        assert_eq!(config.log_dir, PathBuf::from("/tmp/kraft-combined-logs"));
        assert_eq!(config.describe_topic_partitions_key, 75);
        assert_eq!(config.max_frame_size, 100 * 1024 * 1024);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.properties, None);
    }

    #[test]
    fn overrides_and_properties_path() {
        let config = Config::try_parse_from([
            "kraft-wire",
            "--listen-addr",
            "0.0.0.0:19092",
            "--describe-topic-partitions-key",
            "76",
            "--log-level",
            "debug",
            "/tmp/server.properties",
        ])
        .unwrap();
        assert_eq!(config.listen_addr.port(), 19092);
        assert_eq!(config.describe_topic_partitions_key, 76);
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.properties, Some(PathBuf::from("/tmp/server.properties")));
    }
}
