//! Error types for hubnet codec operations.

use thiserror::Error;

/// Core error type for packing and unpacking frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Payload length does not fit the 32-bit length field.
    #[error("encode error: payload of {len} bytes does not fit a 32-bit length field")]
    Encode {
        /// Actual payload length in bytes.
        len: usize,
    },

    /// Frame could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
}

/// Reasons a frame fails to decode.
///
/// Every decode error is fatal for the stream it came from: once a length
/// field cannot be trusted there is no way to find the next frame boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Fewer bytes were supplied than the frame requires.
    #[error("truncated frame: required {required} bytes, available {available} bytes")]
    Truncated {
        /// Required size in bytes.
        required: usize,
        /// Available size in bytes.
        available: usize,
    },

    /// Header announces a payload larger than the configured maximum.
    #[error("package too large: {size} bytes exceeds maximum {max} bytes")]
    TooLarge {
        /// Announced payload length.
        size: u32,
        /// Configured maximum package size.
        max: u32,
    },
}

/// Result type alias for hubnet core operations.
pub type Result<T> = std::result::Result<T, Error>;
