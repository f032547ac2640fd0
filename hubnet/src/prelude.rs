//! Prelude module for convenient imports.
//!
//! ```ignore
//! use hubnet::prelude::*;
//! ```

// Core types
pub use hubnet_core::error::{DecodeError, Error as CoreError, Result as CoreResult};
pub use hubnet_core::{DataPack, FrameHeader, Message};

// Transport types
pub use hubnet_transport::TransportError;
pub use hubnet_transport::tcp::{TcpClient, TcpClientConfig};

// Server types
pub use hubnet_server::{
    Connection, ConnectionState, FnRouter, Request, Router, Server, ServerConfig, ServerError,
};
