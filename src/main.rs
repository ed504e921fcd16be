use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::FmtSubscriber;

use kraft_wire::config::Config;
use kraft_wire::logic::Broker;
use kraft_wire::server;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::parse();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.log_level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!(
        listen_addr = %config.listen_addr,
        metadata_log = %config.metadata_log.display(),
        log_dir = %config.log_dir.display(),
        "starting broker"
    );

    let broker = Arc::new(Broker::from_config(&config));
    server::serve(config.listen_addr, broker, config.max_frame_size).await
}
