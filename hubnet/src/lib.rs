//! # hubnet
//!
//! Lightweight TCP server framework for length-prefixed binary messages.
//!
//! Every frame on the wire is an 8-byte header (payload length and message
//! id, both little-endian `u32`) followed by the payload. The server reads
//! frames per connection, routes each one by message id to a registered
//! [`Router`](server::Router), and runs routers on a fixed pool of workers
//! that preserves per-connection order.
//!
//! ## Features
//!
//! - **Id routing** - one router per message id, with pre/handle/post hooks
//! - **Ordered dispatch** - a connection always maps to the same worker
//! - **Connection lifecycle** - start/stop hooks and a typed property store
//! - **Backpressure** - bounded worker and outbound queues
//!
//! ## Quick Start
//!
//! ```ignore
//! use hubnet::prelude::*;
//!
//! struct Ping;
//!
//! #[async_trait::async_trait]
//! impl Router for Ping {
//!     async fn handle(&self, request: &Request) {
//!         let _ = request.connection().send_buffered(0, &b"pong"[..]);
//!     }
//! }
//!
//! let server = Server::new(ServerConfig::default());
//! server.add_router(0, Ping)?;
//! server.serve().await?;
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`] - Message type, frame header and the `DataPack` codec
//! - [`transport`] - Tokio framing codec, TCP acceptor and client
//! - [`server`] - Server, connections, routing and the worker pool

pub mod prelude;

/// Message type and binary codec.
pub mod core {
    pub use hubnet_core::*;
}

/// Network transport layer.
pub mod transport {
    pub use hubnet_transport::*;
}

/// Server-side engine.
pub mod server {
    pub use hubnet_server::*;
}

pub use hubnet_core::{DataPack, Message};
pub use hubnet_server::{Server, ServerConfig};
