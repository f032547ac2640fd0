//! Frame header type.
//!
//! Every frame on the wire starts with a fixed 8-byte header:
//!
//! ```text
//! +0: payloadLen  (u32, little-endian)
//! +4: msgId       (u32, little-endian)
//! +8: payload     (payloadLen bytes)
//! ```
//!
//! There is no padding and no checksum.

use crate::error::DecodeError;
use bytes::{Buf, BufMut};

/// Fixed-size prefix of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameHeader {
    /// Length of the payload that follows the header, in bytes.
    pub payload_len: u32,
    /// Message identifier.
    pub msg_id: u32,
}

impl FrameHeader {
    /// Encoded length of the frame header in bytes.
    pub const ENCODED_LENGTH: usize = 8;

    /// Creates a new frame header.
    ///
    /// # Arguments
    /// * `payload_len` - Length of the payload in bytes
    /// * `msg_id` - Message identifier
    #[must_use]
    pub const fn new(payload_len: u32, msg_id: u32) -> Self {
        Self {
            payload_len,
            msg_id,
        }
    }

    /// Decodes a header from the start of `buffer`.
    ///
    /// Bytes past [`Self::ENCODED_LENGTH`] are ignored.
    ///
    /// # Errors
    /// Returns [`DecodeError::Truncated`] if fewer than 8 bytes are supplied.
    pub fn decode(buffer: &[u8]) -> Result<Self, DecodeError> {
        if buffer.len() < Self::ENCODED_LENGTH {
            return Err(DecodeError::Truncated {
                required: Self::ENCODED_LENGTH,
                available: buffer.len(),
            });
        }

        let mut src = &buffer[..Self::ENCODED_LENGTH];
        let payload_len = src.get_u32_le();
        let msg_id = src.get_u32_le();
        Ok(Self::new(payload_len, msg_id))
    }

    /// Appends the encoded header to `dst`.
    #[inline]
    pub fn encode<B: BufMut>(&self, dst: &mut B) {
        dst.put_u32_le(self.payload_len);
        dst.put_u32_le(self.msg_id);
    }

    /// Returns the total frame size (header + payload).
    #[must_use]
    pub const fn frame_size(&self) -> usize {
        Self::ENCODED_LENGTH + self.payload_len as usize
    }
}
