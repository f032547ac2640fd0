//! TCP transport module.
//!
//! Provides the listener, client and message framing used over TCP streams.

pub mod client;
pub mod framing;
pub mod server;

pub use client::{TcpClient, TcpClientConfig};
pub use framing::MessageCodec;
pub use server::{TcpAcceptor, TcpAcceptorConfig};
