//! Error types for transport operations.

use thiserror::Error;

/// Error type for transport operations.
#[derive(Debug, Error)]
pub enum TransportError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame could not be packed or unpacked.
    #[error("codec error: {0}")]
    Codec(#[from] hubnet_core::Error),

    /// Connection timeout.
    #[error("connection timeout")]
    ConnectTimeout,

    /// Connection closed.
    #[error("connection closed")]
    ConnectionClosed,

    /// Address parse error.
    #[error("address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
}

impl TransportError {
    /// Returns true if the error means the byte stream can no longer be trusted.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Codec(hubnet_core::Error::Decode(_)))
    }
}
