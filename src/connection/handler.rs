//! Connection Handler Module
//!
//! This module handles individual client connections. Each client gets its
//! own handler task that runs in a loop, reading requests and sending
//! responses.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  Read bytes from socket      │
//!    │              │               │
//!    │              ▼               │
//!    │  Parse request frame         │
//!    │              │               │
//!    │              ▼               │
//!    │  Execute command             │
//!    │              │               │
//!    │              ▼               │
//!    │  Send response               │
//!    │              │               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / framing error
//!        │
//!        ▼
//! 5. Handler task ends
//! ```
//!
//! ## Buffer Management
//!
//! Incoming data accumulates in a `BytesMut` buffer. TCP is a stream, so a
//! read may end inside a frame or carry several frames; bytes are only
//! consumed once a whole request has been parsed.
//!
//! A framing error closes the connection without a response: once a length
//! header is wrong there is no reliable way to find the next frame.

use crate::commands::CommandHandler;
use crate::protocol::{FrameParser, ParseError, Request, Response};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, error, info, trace, warn};

/// Maximum size for the read buffer (64 MB), and so for a single request
const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }

    /// Emits the counters as one log event.
    pub fn log_summary(&self) {
        info!(
            connections = self.connections_accepted.load(Ordering::Relaxed),
            active = self.active_connections.load(Ordering::Relaxed),
            commands = self.commands_processed.load(Ordering::Relaxed),
            bytes_read = self.bytes_read.load(Ordering::Relaxed),
            bytes_written = self.bytes_written.load(Ordering::Relaxed),
            "Connection statistics"
        );
    }
}

/// Handles a single client connection.
///
/// Generic over the transport so it runs the same over a `TcpStream` or an
/// in-memory stream.
pub struct ConnectionHandler<S> {
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    command_handler: CommandHandler,

    parser: FrameParser,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            parser: FrameParser::with_max_part_size(MAX_BUFFER_SIZE),
            stats,
        }
    }

    /// Runs the connection until the client disconnects or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(ConnectionError::ClientDisconnected) => {
                info!(client = %self.addr, "Client disconnected")
            }
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection closed on error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The read-execute-respond loop. Requests are answered strictly in
    /// arrival order.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(request) = self.try_parse_request()? {
                let response = self.command_handler.execute(&request);
                self.stats.command_processed();
                self.send_response(&response).await?;
            }

            self.read_more_data().await?;
        }
    }

    fn try_parse_request(&mut self) -> Result<Option<Request>, ConnectionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.parser.parse_request(&self.buffer)? {
            Some((request, consumed)) => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.addr,
                    command = %request.command,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Parsed request"
                );
                Ok(Some(request))
            }
            None => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete request, need more data"
                );
                Ok(None)
            }
        }
    }

    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            error!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            return if self.buffer.is_empty() {
                Err(ConnectionError::ClientDisconnected)
            } else {
                // Stream ended inside a frame
                Err(ConnectionError::UnexpectedEof)
            };
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    async fn send_response(&mut self, response: &Response) -> Result<(), ConnectionError> {
        let bytes = response.encode();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(client = %self.addr, bytes = bytes.len(), "Sent response");
        Ok(())
    }
}

/// Errors that can occur while handling a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed request framing
    #[error("framing error: {0}")]
    Parse(#[from] ParseError),

    /// Client disconnected between requests
    #[error("client disconnected")]
    ClientDisconnected,

    /// Client disconnected in the middle of a request
    #[error("unexpected end of stream inside a request")]
    UnexpectedEof,

    #[error("buffer size limit exceeded")]
    BufferFull,
}

/// Creates a [`ConnectionHandler`] and runs it to completion.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    // Already logged by run()
    let _ = handler.run().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::parse_response;
    use crate::storage::StorageEngine;
    use tokio::net::{TcpListener, TcpStream};
    use tokio_test::io::Builder;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn request(parts: &[&str]) -> Vec<u8> {
        Request::new(parts[0], parts[1..].iter().copied())
            .unwrap()
            .encode()
    }

    fn handler_over<S>(stream: S) -> (ConnectionHandler<S>, Arc<ConnectionStats>)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let stats = Arc::new(ConnectionStats::new());
        let commands = CommandHandler::new(Arc::new(StorageEngine::new()));
        let handler = ConnectionHandler::new(stream, test_addr(), commands, Arc::clone(&stats));
        (handler, stats)
    }

    #[tokio::test]
    async fn test_request_split_across_reads() {
        let mock = Builder::new()
            .read(b"2\r\n5\r\nGE")
            .read(b"T\r\n6\r\nna")
            .read(b"me\r\n")
            .write(b"OK\r\n1\r\n6\r\nnull\r\n")
            .build();

        let (handler, stats) = handler_over(mock);
        let result = handler.run().await;

        assert!(matches!(result, Err(ConnectionError::ClientDisconnected)));
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_pipelined_requests_answered_in_order() {
        let mut input = request(&["SET", "k", "v"]);
        input.extend_from_slice(&request(&["GET", "k"]));
        input.extend_from_slice(&request(&["NOPE"]));

        let mock = Builder::new()
            .read(&input)
            .write(b"OK\r\n1\r\n3\r\n1\r\n")
            .write(b"OK\r\n1\r\n5\r\n\"v\"\r\n")
            .write(b"ERR\r\n1\r\n28\r\nERR unknown command 'NOPE'\r\n")
            .build();

        let (handler, stats) = handler_over(mock);
        handler.run().await.unwrap_err();

        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_framing_error_closes_without_reply() {
        let mock = Builder::new().read(b"1\r\nsix\r\nPING\r\n").build();

        let (handler, stats) = handler_over(mock);
        let result = handler.run().await;

        assert!(matches!(
            result,
            Err(ConnectionError::Parse(ParseError::InvalidLength(_)))
        ));
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_eof_inside_request() {
        let mock = Builder::new().read(b"2\r\n5\r\nGET\r\n").build();

        let (handler, _) = handler_over(mock);
        let result = handler.run().await;

        assert!(matches!(result, Err(ConnectionError::UnexpectedEof)));
    }

    async fn create_test_server() -> (SocketAddr, Arc<StorageEngine>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let storage = Arc::new(StorageEngine::new());
        let stats = Arc::new(ConnectionStats::new());

        let storage_clone = Arc::clone(&storage);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let handler = CommandHandler::new(Arc::clone(&storage_clone));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, handler, stats));
            }
        });

        (addr, storage, stats)
    }

    /// Sends one request and reads back one full response.
    async fn call(client: &mut TcpStream, parts: &[&str]) -> Response {
        client.write_all(&request(parts)).await.unwrap();

        let mut buf = Vec::new();
        loop {
            if let Some((response, _)) = parse_response(&buf).unwrap() {
                return response;
            }
            let mut chunk = [0u8; 256];
            let n = client.read(&mut chunk).await.unwrap();
            assert!(n > 0, "server closed the connection");
            buf.extend_from_slice(&chunk[..n]);
        }
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        let response = call(&mut client, &["PING"]).await;
        assert!(response.is_ok());
        assert_eq!(response.values, vec!["\"PONG\""]);
    }

    #[tokio::test]
    async fn test_set_get_over_tcp() {
        let (addr, storage, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        assert_eq!(call(&mut client, &["SET", "name", "Ariz"]).await.values, vec!["1"]);
        assert_eq!(call(&mut client, &["GET", "name"]).await.values, vec!["\"Ariz\""]);
        assert!(storage.exists("name"));

        let response = call(&mut client, &["LPUSH", "name", "x"]).await;
        assert!(response.is_err());

        // Still usable after a command error
        assert!(call(&mut client, &["PING"]).await.is_ok());
    }

    #[tokio::test]
    async fn test_clients_share_storage() {
        let (addr, _, _) = create_test_server().await;
        let mut first = TcpStream::connect(addr).await.unwrap();
        let mut second = TcpStream::connect(addr).await.unwrap();

        call(&mut first, &["HSET", "h", "f", "v"]).await;
        let response = call(&mut second, &["HGETALL", "h"]).await;
        assert_eq!(response.values, vec![r#"{"f":"v"}"#]);
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();
        call(&mut client, &["PING"]).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);
        assert!(stats.commands_processed.load(Ordering::Relaxed) >= 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);

        drop(client);
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
