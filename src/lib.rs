//! A broker speaking a subset of the Kafka wire protocol, answering from a KRaft
//! cluster-metadata log.

pub mod config;
pub mod logic;
pub mod protocol;
pub mod server;
