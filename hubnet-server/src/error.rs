//! Error types for server operations.

use std::net::SocketAddr;
use thiserror::Error;

/// Error type for server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport error.
    #[error("transport error: {0}")]
    Transport(#[from] hubnet_transport::TransportError),

    /// Frame could not be packed.
    #[error("codec error: {0}")]
    Codec(#[from] hubnet_core::Error),

    /// Operation attempted on a connection that is closing or closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Outbound queue is at capacity. Recoverable: retry or drop.
    #[error("outbound queue full")]
    QueueFull,

    /// No property stored under the key.
    #[error("property not found: {key}")]
    PropertyNotFound {
        /// Requested key.
        key: String,
    },

    /// Property exists but holds a value of another type.
    #[error("property {key} holds a value of a different type")]
    PropertyType {
        /// Requested key.
        key: String,
    },

    /// A router is already registered for the message id.
    #[error("duplicate route for message id {id}")]
    DuplicateRoute {
        /// Message id.
        id: u32,
    },

    /// No router is registered for the message id.
    #[error("no route for message id {id}")]
    NoRoute {
        /// Message id.
        id: u32,
    },

    /// A router panicked while handling a message.
    #[error("handler for message id {id} panicked: {message}")]
    HandlerPanic {
        /// Message id.
        id: u32,
        /// Panic payload, if it was a string.
        message: String,
    },

    /// Binding the listener failed.
    #[error("failed to listen on {addr}: {source}")]
    Startup {
        /// Configured bind address.
        addr: SocketAddr,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The server or connection was already started.
    #[error("already started")]
    AlreadyStarted,

    /// Configuration rejected by validation.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    /// Server shutdown.
    #[error("server shutdown")]
    Shutdown,
}

impl ServerError {
    /// Creates an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }
}
