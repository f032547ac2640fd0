//! # hubnet transport
//!
//! Network transport layer for hubnet.
//!
//! This crate provides:
//! - [`tcp::MessageCodec`] - tokio-util framing on top of [`hubnet_core::DataPack`]
//! - [`tcp::TcpAcceptor`] - listener wrapper used by the server's accept loop
//! - [`tcp::TcpClient`] - a small client speaking the same wire format

pub mod error;
pub mod tcp;

pub use error::TransportError;
