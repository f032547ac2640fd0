//! Server configuration.

use crate::error::ServerError;
use hubnet_core::DEFAULT_MAX_PACKAGE_SIZE;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Configuration recognized by [`crate::Server`].
///
/// Loading it (from a file, the environment, ...) is left to the caller; the
/// serde derives accept any serde format and fill missing fields with defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server name, used in log output.
    pub name: String,
    /// Address to listen on.
    pub bind_addr: SocketAddr,
    /// Largest accepted payload in bytes, `0` disables the check.
    pub max_package_size: u32,
    /// Number of dispatch workers.
    pub worker_pool_size: usize,
    /// Capacity of each worker's task queue.
    pub worker_queue_capacity: usize,
    /// Capacity of each connection's buffered outbound queue.
    pub outbound_queue_capacity: usize,
    /// Maximum concurrent connections, `0` means unlimited.
    pub max_connections: usize,
    /// Enable TCP_NODELAY on accepted sockets.
    pub tcp_nodelay: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "hubnet".to_string(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8999)),
            max_package_size: DEFAULT_MAX_PACKAGE_SIZE,
            worker_pool_size: 10,
            worker_queue_capacity: 1024,
            outbound_queue_capacity: 1024,
            max_connections: 12000,
            tcp_nodelay: true,
        }
    }
}

impl ServerConfig {
    /// Creates a new config with the specified bind address.
    #[must_use]
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    /// Sets the server name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the bind address.
    #[must_use]
    pub fn bind(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Sets the maximum package size.
    #[must_use]
    pub fn max_package_size(mut self, size: u32) -> Self {
        self.max_package_size = size;
        self
    }

    /// Sets the number of dispatch workers.
    #[must_use]
    pub fn worker_pool_size(mut self, size: usize) -> Self {
        self.worker_pool_size = size;
        self
    }

    /// Sets the per-worker queue capacity.
    #[must_use]
    pub fn worker_queue_capacity(mut self, capacity: usize) -> Self {
        self.worker_queue_capacity = capacity;
        self
    }

    /// Sets the per-connection outbound queue capacity.
    #[must_use]
    pub fn outbound_queue_capacity(mut self, capacity: usize) -> Self {
        self.outbound_queue_capacity = capacity;
        self
    }

    /// Sets the maximum number of connections.
    #[must_use]
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Sets TCP_NODELAY option.
    #[must_use]
    pub fn tcp_nodelay(mut self, enabled: bool) -> Self {
        self.tcp_nodelay = enabled;
        self
    }

    /// Checks the values a running server cannot work with.
    ///
    /// # Errors
    /// Returns [`ServerError::InvalidConfig`] for a zero-sized worker pool or
    /// a zero-capacity queue.
    pub fn validate(&self) -> Result<(), ServerError> {
        if self.worker_pool_size == 0 {
            return Err(ServerError::invalid_config("worker_pool_size must be at least 1"));
        }
        if self.worker_queue_capacity == 0 {
            return Err(ServerError::invalid_config(
                "worker_queue_capacity must be at least 1",
            ));
        }
        if self.outbound_queue_capacity == 0 {
            return Err(ServerError::invalid_config(
                "outbound_queue_capacity must be at least 1",
            ));
        }
        Ok(())
    }
}
