//! redlite TCP server
//!
//! One tokio task per connection. Requests are decoded incrementally from a
//! per-connection buffer, so partial and pipelined requests are both handled.

use crate::{
    config::Config,
    dispatcher::Dispatcher,
    error::{RedliteError, Result},
    protocol::{Frame, RequestDecoder},
    snapshot::SnapshotScanner,
    store::MemoryStore,
};
use bytes::{Buf, BytesMut};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::{
    io::{AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter},
    net::{TcpListener, TcpStream},
    sync::broadcast,
};
use tracing::Instrument;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub dir: String,
    pub dbfilename: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let params = Config::default();
        Self {
            bind_addr: "0.0.0.0:6379".to_string(),
            dir: params.dir,
            dbfilename: params.dbfilename,
        }
    }
}

impl ServerConfig {
    /// Load a JSON config file; missing fields take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            RedliteError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config: ServerConfig = serde_json::from_str(&data)?;
        Ok(config)
    }

    /// The parameters served by `CONFIG GET`
    pub fn params(&self) -> Config {
        Config::new(self.dir.clone(), self.dbfilename.clone())
    }
}

/// redlite TCP server
pub struct RedliteServer {
    config: ServerConfig,
    dispatcher: Dispatcher,
    shutdown_tx: broadcast::Sender<()>,
}

impl RedliteServer {
    /// Create a new server instance. The snapshot is opened here, once.
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let params = config.params();
        let snapshot = SnapshotScanner::open(params.snapshot_path()).await;

        let dispatcher = Dispatcher::new(
            Arc::new(MemoryStore::new()),
            Arc::new(params),
            Arc::new(snapshot),
        );

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            dispatcher,
            shutdown_tx,
        })
    }

    /// Start the server
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        tracing::info!(
            addr = %self.config.bind_addr,
            dir = %self.config.dir,
            dbfilename = %self.config.dbfilename,
            "redlite server listening"
        );

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            tracing::debug!(peer = %addr, "accepted connection");
                            let dispatcher = self.dispatcher.clone();
                            let shutdown_rx = self.shutdown_tx.subscribe();
                            let span = tracing::info_span!("connection", peer = %addr);

                            tokio::spawn(
                                async move {
                                    if let Err(e) = Self::handle_client(stream, dispatcher, shutdown_rx).await {
                                        tracing::warn!(error = %e, "connection closed with error");
                                    }
                                    tracing::debug!("client disconnected");
                                }
                                .instrument(span),
                            );
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to accept connection");
                        }
                    }
                }

                _ = shutdown_rx.recv() => {
                    tracing::info!("shutdown signal received, stopping server");
                    break;
                }
            }
        }

        tracing::info!("server stopped");
        Ok(())
    }

    /// Serve one connection until EOF, an I/O error, a malformed frame or
    /// shutdown
    async fn handle_client(
        stream: TcpStream,
        dispatcher: Dispatcher,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        let (mut reader, writer) = stream.into_split();
        let mut writer = BufWriter::new(writer);
        let mut buffer = BytesMut::with_capacity(4096);
        let mut decoder = RequestDecoder::new();

        loop {
            let keep_open =
                Self::drain_requests(&mut buffer, &mut decoder, &dispatcher, &mut writer).await?;
            writer.flush().await?;
            if !keep_open {
                return Ok(());
            }

            tokio::select! {
                result = reader.read_buf(&mut buffer) => {
                    if result? == 0 {
                        if !buffer.is_empty() {
                            tracing::debug!(pending = buffer.len(), "client closed mid-request");
                        }
                        return Ok(());
                    }
                }

                _ = shutdown_rx.recv() => {
                    tracing::debug!("shutdown signal received, closing client connection");
                    return Ok(());
                }
            }
        }
    }

    /// Answer every complete request in `buffer`. Returns `false` when the
    /// stream is malformed and cannot be resynchronized.
    async fn drain_requests<W>(
        buffer: &mut BytesMut,
        decoder: &mut RequestDecoder,
        dispatcher: &Dispatcher,
        writer: &mut W,
    ) -> Result<bool>
    where
        W: AsyncWrite + Unpin,
    {
        loop {
            match decoder.decode(&buffer[..]) {
                Ok(Some((frame, consumed))) => {
                    buffer.advance(consumed);
                    let reply = dispatcher.handle_frame(frame).await;
                    writer.write_all(&reply.to_bytes()).await?;
                }
                Ok(None) => return Ok(true),
                Err(e) => {
                    tracing::warn!(error = %e, "malformed request, closing connection");
                    writer.write_all(&Frame::error(&e).to_bytes()).await?;
                    return Ok(false);
                }
            }
        }
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown_tx.send(()).map_err(|_| {
            RedliteError::Server("Failed to send shutdown signal".to_string())
        })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_dispatcher() -> Dispatcher {
        Dispatcher::new(
            Arc::new(MemoryStore::new()),
            Arc::new(Config::default()),
            Arc::new(SnapshotScanner::empty()),
        )
    }

    #[tokio::test]
    async fn test_server_creation() {
        let dir = tempdir().unwrap();
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            dir: dir.path().to_string_lossy().to_string(),
            dbfilename: "missing.rdb".to_string(),
        };

        let server = RedliteServer::new(config).await.unwrap();
        // No receivers yet, so the send may fail
        let _ = server.shutdown();
    }

    #[tokio::test]
    async fn test_drain_pipelined_and_partial_requests() {
        let dispatcher = test_dispatcher();
        let mut buffer = BytesMut::from(
            &b"*3\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n*2\r\n$3\r\nGET\r\n$1\r\nk\r\n*1\r\n$4\r\nPI"[..],
        );
        let mut decoder = RequestDecoder::new();
        let mut out: Vec<u8> = Vec::new();

        let keep_open =
            RedliteServer::drain_requests(&mut buffer, &mut decoder, &dispatcher, &mut out)
                .await
                .unwrap();
        assert!(keep_open);
        assert_eq!(out, b"+OK\r\n$1\r\nv\r\n");
        assert_eq!(&buffer[..], b"*1\r\n$4\r\nPI");

        buffer.extend_from_slice(b"NG\r\n");
        out.clear();
        RedliteServer::drain_requests(&mut buffer, &mut decoder, &dispatcher, &mut out)
            .await
            .unwrap();
        assert_eq!(out, b"+PONG\r\n");
        assert!(buffer.is_empty());
    }

    #[tokio::test]
    async fn test_command_errors_keep_connection_open() {
        let dispatcher = test_dispatcher();
        let mut buffer = BytesMut::from(&b"*1\r\n$3\r\nFOO\r\n*1\r\n$4\r\nPING\r\n"[..]);
        let mut decoder = RequestDecoder::new();
        let mut out: Vec<u8> = Vec::new();

        let keep_open =
            RedliteServer::drain_requests(&mut buffer, &mut decoder, &dispatcher, &mut out)
                .await
                .unwrap();
        assert!(keep_open);
        assert_eq!(out, b"-ERR invalid command\r\n+PONG\r\n");
    }

    #[tokio::test]
    async fn test_malformed_frame_closes_connection() {
        let dispatcher = test_dispatcher();
        let nested = b"*1\r\n".repeat(100_000);
        let cases: Vec<&[u8]> = vec![
            &b"PING\r\n"[..],
            &nested[..],
            &b"*2\r\n$3\r\nGET\r\n*1\r\n$1\r\na\r\n"[..],
            &b"*-5\r\n"[..],
            &b"*-1\r\n"[..],
            &b"*1\r\n$999999999999\r\n"[..],
            &b"*1\r\n:1\r\n"[..],
        ];

        for case in cases {
            let mut buffer = BytesMut::from(case);
            let mut decoder = RequestDecoder::new();
            let mut out: Vec<u8> = Vec::new();

            let keep_open =
                RedliteServer::drain_requests(&mut buffer, &mut decoder, &dispatcher, &mut out)
                    .await
                    .unwrap();
            assert!(!keep_open, "{:?}", String::from_utf8_lossy(&case[..case.len().min(32)]));
            assert!(out.starts_with(b"-ERR "));
        }
    }

    #[tokio::test]
    async fn test_request_validated_across_reads() {
        let dispatcher = test_dispatcher();
        let request = b"*3\r\n$3\r\nSET\r\n$3\r\nkey\r\n$5\r\nvalue\r\n";
        let mut buffer = BytesMut::new();
        let mut decoder = RequestDecoder::new();
        let mut out: Vec<u8> = Vec::new();

        for byte in request.iter() {
            buffer.extend_from_slice(&[*byte]);
            let keep_open =
                RedliteServer::drain_requests(&mut buffer, &mut decoder, &dispatcher, &mut out)
                    .await
                    .unwrap();
            assert!(keep_open);
        }
        assert_eq!(out, b"+OK\r\n");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("redlite.json");
        std::fs::write(&path, r#"{ "dir": "/data", "bind_addr": "127.0.0.1:7000" }"#).unwrap();

        let config = ServerConfig::from_file(&path).unwrap();
        assert_eq!(config.dir, "/data");
        assert_eq!(config.bind_addr, "127.0.0.1:7000");
        assert_eq!(config.dbfilename, "dump.rdb");

        assert!(ServerConfig::from_file(dir.path().join("nope.json")).is_err());
    }
}
