//! TCP client implementation.

use super::framing::MessageCodec;
use crate::error::TransportError;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use hubnet_core::{DEFAULT_MAX_PACKAGE_SIZE, Message};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

/// Configuration for TCP client.
#[derive(Debug, Clone)]
pub struct TcpClientConfig {
    /// Server address to connect to.
    pub server_addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Maximum accepted payload size in bytes.
    pub max_package_size: u32,
    /// Enable TCP_NODELAY.
    pub tcp_nodelay: bool,
}

impl Default for TcpClientConfig {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([127, 0, 0, 1], 8999)),
            connect_timeout: Duration::from_secs(5),
            max_package_size: DEFAULT_MAX_PACKAGE_SIZE,
            tcp_nodelay: true,
        }
    }
}

impl TcpClientConfig {
    /// Creates a new client config with the specified server address.
    #[must_use]
    pub fn new(server_addr: SocketAddr) -> Self {
        Self {
            server_addr,
            ..Default::default()
        }
    }

    /// Sets the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the maximum package size.
    #[must_use]
    pub fn max_package_size(mut self, size: u32) -> Self {
        self.max_package_size = size;
        self
    }

    /// Sets TCP_NODELAY option.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}

/// TCP client speaking the hubnet wire format.
pub struct TcpClient {
    framed: Framed<TcpStream, MessageCodec>,
    peer_addr: SocketAddr,
}

impl TcpClient {
    /// Connects to a server with the given configuration.
    ///
    /// # Errors
    /// Returns `TransportError` if connection fails or times out.
    pub async fn connect(config: TcpClientConfig) -> Result<Self, TransportError> {
        let stream = tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect(config.server_addr),
        )
        .await
        .map_err(|_| TransportError::ConnectTimeout)?
        .map_err(TransportError::Io)?;

        stream.set_nodelay(config.tcp_nodelay)?;

        let peer_addr = stream.peer_addr()?;
        let framed = Framed::new(stream, MessageCodec::new(config.max_package_size));
        tracing::debug!(peer = %peer_addr, "client connected");

        Ok(Self { framed, peer_addr })
    }

    /// Sends a message to the server.
    ///
    /// # Arguments
    /// * `id` - Message id
    /// * `payload` - Message body
    ///
    /// # Errors
    /// Returns `TransportError` if send fails.
    pub async fn send(&mut self, id: u32, payload: impl Into<Bytes>) -> Result<(), TransportError> {
        self.framed.send(Message::new(id, payload)).await
    }

    /// Writes raw bytes to the socket, bypassing the codec.
    ///
    /// # Errors
    /// Returns `TransportError` if the write fails.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        let stream = self.framed.get_mut();
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Receives a message from the server.
    ///
    /// # Returns
    /// `Ok(Some(message))` if a message was received, `Ok(None)` if connection closed.
    ///
    /// # Errors
    /// Returns `TransportError` if receive or decode fails.
    pub async fn recv(&mut self) -> Result<Option<Message>, TransportError> {
        self.framed.next().await.transpose()
    }

    /// Returns the peer address.
    #[must_use]
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Closes the connection.
    pub async fn close(mut self) -> Result<(), TransportError> {
        SinkExt::<Message>::close(&mut self.framed).await
    }
}
