//! # hubnet core
//!
//! Wire-level building blocks shared by the hubnet transport and server.
//!
//! This crate provides:
//! - [`Message`] - the decoded unit passed between codec, connections and routers
//! - [`FrameHeader`] - the fixed 8-byte frame prefix
//! - [`DataPack`] - stateless pack/unpack of frames with a maximum package size guard
//! - Error types for encoding/decoding operations
//!
//! Nothing in here performs I/O. Callers read [`DataPack::header_len`] bytes,
//! decode the header, then read exactly `payload_len` more bytes.

pub mod codec;
pub mod error;
pub mod header;
pub mod message;

pub use codec::{DEFAULT_MAX_PACKAGE_SIZE, DataPack};
pub use error::{DecodeError, Error, Result};
pub use header::FrameHeader;
pub use message::Message;
