//! Accept loop and per-connection request handling.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::logic::Broker;
use crate::protocol::frame::{FrameReader, MessageReader, MessageWriter};
use crate::protocol::{ErrorCode, ProtocolError};

/// Accepts connections forever, serving each one from its own task.
pub async fn run(listener: TcpListener, broker: Arc<Broker>, max_frame_size: usize) -> Result<()> {
    info!(addr = %listener.local_addr()?, "listening");

    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!(error = %e, "failed to accept connection");
                continue;
            }
        };
        info!(%peer, "accepted new connection");

        let broker = Arc::clone(&broker);
        tokio::spawn(async move {
            match handle_connection(stream, broker, max_frame_size).await {
                Ok(()) => info!(%peer, "connection closed"),
                Err(e) => warn!(%peer, error = %format!("{e:#}"), "connection closed on error"),
            }
        });
    }
}

/// Serves requests from one client until it disconnects.
///
/// Requests are answered strictly in arrival order. Requests for an unregistered
/// (api key, api version) pair get an error frame and the connection stays open; any
/// other framing or decoding failure closes it.
pub async fn handle_connection<S>(stream: S, broker: Arc<Broker>, max_frame_size: usize) -> Result<()>
where
    S: AsyncRead + AsyncWrite,
{
    let (read_half, write_half) = tokio::io::split(stream);
    let mut reader = MessageReader::new(
        FrameReader::with_max_frame_size(read_half, max_frame_size),
        Arc::clone(broker.registry()),
    );
    let mut writer = MessageWriter::new(write_half);

    loop {
        let request = match reader.next_request().await {
            Ok(request) => request,
            Err(ProtocolError::EndOfStream) => return Ok(()),
            Err(e) => match e.correlation_id() {
                Some(correlation_id) => {
                    debug!(correlation_id, error = %e, "answering with error frame");
                    writer
                        .send_error(correlation_id, e.error_code())
                        .await
                        .context("write error frame")?;
                    continue;
                }
                None => return Err(e).context("read request"),
            },
        };

        let correlation_id = request.correlation_id();
        match broker.process(request).await {
            Ok(response) => writer
                .send_response(&response)
                .await
                .context("write response")?,
            Err(e) => {
                error!(correlation_id, error = %format!("{e:#}"), "failed to process request");
                writer
                    .send_error(correlation_id, ErrorCode::UnknownServerError)
                    .await
                    .context("write error frame")?;
            }
        }
    }
}

/// Binds `addr` and serves `broker` on it.
pub async fn serve(addr: SocketAddr, broker: Arc<Broker>, max_frame_size: usize) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind {addr}"))?;
    run(listener, broker, max_frame_size).await
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    use super::*;
    use crate::protocol::dispatch::Registry;
    use crate::protocol::frame::MAX_FRAME_SIZE;

    fn spawn_connection(dir: &TempDir) -> (DuplexStream, tokio::task::JoinHandle<Result<()>>) {
        let broker = Arc::new(Broker::new(
            Arc::new(Registry::default()),
            dir.path().join("missing.log"),
            dir.path().to_path_buf(),
        ));
        let (client, server) = tokio::io::duplex(4096);
        let handle = tokio::spawn(handle_connection(server, broker, MAX_FRAME_SIZE));
        (client, handle)
    }

    async fn read_frame(client: &mut DuplexStream) -> Vec<u8> {
        let len = client.read_u32().await.unwrap() as usize;
        let mut payload = vec![0; len];
        client.read_exact(&mut payload).await.unwrap();
        payload
    }

    const API_VERSIONS_REQUEST: &[u8] = b"\x00\x00\x00\x23\
        \x00\x12\x00\x04\x00\x00\x00\x07\
        \x00\x09kafka-cli\x00\
        \x0akafka-cli\x040.1\x00";

    #[tokio::test]
    async fn api_versions_end_to_end() {
        let dir = TempDir::new().unwrap();
        let (mut client, handle) = spawn_connection(&dir);

        client.write_all(API_VERSIONS_REQUEST).await.unwrap();
        let payload = read_frame(&mut client).await;

        // correlation id, error code, three api keys
        assert_eq!(&payload[..7], &[0, 0, 0, 7, 0, 0, 0x04]);
        // throttle time and tagged fields close the body
        assert_eq!(&payload[payload.len() - 5..], &[0, 0, 0, 0, 0]);

        drop(client);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn unsupported_api_keeps_connection_open() {
        let dir = TempDir::new().unwrap();
        let (mut client, handle) = spawn_connection(&dir);

        // api key 99, version 0, correlation id 42, null client id, no tagged fields
        client
            .write_all(&[0, 0, 0, 11, 0, 99, 0, 0, 0, 0, 0, 42, 0xff, 0xff, 0])
            .await
            .unwrap();
        assert_eq!(read_frame(&mut client).await, vec![0, 0, 0, 42, 0, 35]);

        client.write_all(API_VERSIONS_REQUEST).await.unwrap();
        assert_eq!(&read_frame(&mut client).await[..4], &[0, 0, 0, 7]);

        drop(client);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn missing_metadata_log_answers_unknown_server_error() {
        let dir = TempDir::new().unwrap();
        let (mut client, handle) = spawn_connection(&dir);

        // DescribeTopicPartitions v0 for "foo", correlation id 5
        client
            .write_all(b"\x00\x00\x00\x17\x00\x4b\x00\x00\x00\x00\x00\x05\xff\xff\x00\x02\x04foo\x00\x00\x00\x00\x64\xff\x00")
            .await
            .unwrap();
        assert_eq!(read_frame(&mut client).await, vec![0, 0, 0, 5, 0xff, 0xff]);

        drop(client);
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn truncated_frame_closes_connection() {
        let dir = TempDir::new().unwrap();
        let (mut client, handle) = spawn_connection(&dir);

        client.write_all(&[0, 0, 0, 10, 0, 18]).await.unwrap();
        drop(client);
        assert!(handle.await.unwrap().is_err());
    }
}
