//! TCP listener wrapper.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

/// Configuration for [`TcpAcceptor`].
#[derive(Debug, Clone)]
pub struct TcpAcceptorConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// Enable TCP_NODELAY on accepted sockets.
    pub tcp_nodelay: bool,
}

impl Default for TcpAcceptorConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8999)),
            tcp_nodelay: true,
        }
    }
}

impl TcpAcceptorConfig {
    /// Creates a new acceptor config with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Sets TCP_NODELAY option.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }
}

/// Bound TCP listener handing out configured sockets.
pub struct TcpAcceptor {
    listener: TcpListener,
    config: Arc<TcpAcceptorConfig>,
}

impl TcpAcceptor {
    /// Binds to the configured address.
    ///
    /// # Errors
    /// Returns IO error if binding fails.
    pub async fn bind(config: TcpAcceptorConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        Ok(Self {
            listener,
            config: Arc::new(config),
        })
    }

    /// Accepts a new connection.
    ///
    /// # Returns
    /// The accepted stream and the peer address.
    ///
    /// # Errors
    /// Returns IO error if accept fails.
    pub async fn accept(&self) -> std::io::Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await?;
        stream.set_nodelay(self.config.tcp_nodelay)?;
        Ok((stream, addr))
    }

    /// Returns the local address the acceptor is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}
