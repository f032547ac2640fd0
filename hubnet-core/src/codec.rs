//! Stateless frame packing and unpacking.
//!
//! [`DataPack`] turns a [`Message`] into one contiguous frame and back. The
//! only tunable is the maximum package size, which bounds every allocation
//! driven by a length field received from a peer.

use crate::error::{DecodeError, Error, Result};
use crate::header::FrameHeader;
use crate::message::Message;
use bytes::{BufMut, Bytes, BytesMut};

/// Default maximum payload size in bytes.
pub const DEFAULT_MAX_PACKAGE_SIZE: u32 = 4096;

/// Packs and unpacks length-prefixed frames.
///
/// Frame format: `[4-byte payloadLen][4-byte msgId][payload]`, little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataPack {
    max_package_size: u32,
}

impl DataPack {
    /// Creates a codec with the given maximum package size.
    ///
    /// # Arguments
    /// * `max_package_size` - Largest accepted payload in bytes, `0` disables the check
    #[must_use]
    pub const fn new(max_package_size: u32) -> Self {
        Self { max_package_size }
    }

    /// Returns the header length in bytes (always 8).
    #[inline]
    #[must_use]
    pub const fn header_len(&self) -> usize {
        FrameHeader::ENCODED_LENGTH
    }

    /// Returns the configured maximum package size.
    #[must_use]
    pub const fn max_package_size(&self) -> u32 {
        self.max_package_size
    }

    /// Packs a message into a single contiguous frame.
    ///
    /// # Errors
    /// Returns [`Error::Encode`] if the payload length does not fit in 32 bits.
    pub fn pack(&self, msg: &Message) -> Result<Bytes> {
        let mut dst = BytesMut::with_capacity(self.header_len() + msg.payload_len());
        self.pack_into(msg, &mut dst)?;
        Ok(dst.freeze())
    }

    /// Appends a packed frame to `dst`.
    ///
    /// # Errors
    /// Returns [`Error::Encode`] if the payload length does not fit in 32 bits.
    pub fn pack_into(&self, msg: &Message, dst: &mut BytesMut) -> Result<()> {
        let payload_len = u32::try_from(msg.payload_len()).map_err(|_| Error::Encode {
            len: msg.payload_len(),
        })?;

        dst.reserve(self.header_len() + msg.payload_len());
        FrameHeader::new(payload_len, msg.id()).encode(dst);
        dst.put_slice(msg.payload());
        Ok(())
    }

    /// Decodes a frame header and validates the announced payload length.
    ///
    /// The payload itself is not read; callers fetch exactly
    /// `header.payload_len` further bytes once this succeeds.
    ///
    /// # Errors
    /// Returns [`DecodeError::Truncated`] if fewer than 8 bytes are supplied, or
    /// [`DecodeError::TooLarge`] if the payload length exceeds the maximum.
    pub fn unpack_header(&self, buffer: &[u8]) -> Result<FrameHeader> {
        let header = FrameHeader::decode(buffer)?;
        self.check_len(header.payload_len)?;
        Ok(header)
    }

    /// Decodes a complete frame (header + payload) from `buffer`.
    ///
    /// # Errors
    /// Returns a decode error if the header is invalid or the payload is
    /// shorter than announced.
    pub fn unpack(&self, buffer: &[u8]) -> Result<Message> {
        let header = self.unpack_header(buffer)?;
        let frame_size = header.frame_size();
        if buffer.len() < frame_size {
            return Err(DecodeError::Truncated {
                required: frame_size,
                available: buffer.len(),
            }
            .into());
        }

        let payload = Bytes::copy_from_slice(&buffer[self.header_len()..frame_size]);
        Ok(Message::new(header.msg_id, payload))
    }

    fn check_len(&self, payload_len: u32) -> std::result::Result<(), DecodeError> {
        if self.max_package_size > 0 && payload_len > self.max_package_size {
            return Err(DecodeError::TooLarge {
                size: payload_len,
                max: self.max_package_size,
            });
        }
        Ok(())
    }
}

impl Default for DataPack {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PACKAGE_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_len() {
        assert_eq!(DataPack::default().header_len(), 8);
    }

    #[test]
    fn test_pack_layout() {
        let pack = DataPack::default();
        let frame = pack.pack(&Message::new(1, &b"hi"[..])).unwrap();

        assert_eq!(frame.len(), 10);
        assert_eq!(&frame[0..4], &2u32.to_le_bytes());
        assert_eq!(&frame[4..8], &1u32.to_le_bytes());
        assert_eq!(&frame[8..], b"hi");
    }

    #[test]
    fn test_pack_unpack() {
        let pack = DataPack::default();
        let cases = [
            Message::new(0, &b"hello"[..]),
            Message::new(u32::MAX, Vec::<u8>::new()),
            Message::new(42, vec![0xAB; 4096]),
        ];

        for msg in cases {
            let frame = pack.pack(&msg).unwrap();
            assert_eq!(pack.unpack(&frame).unwrap(), msg);
        }
    }

    #[test]
    fn test_pack_into_appends() {
        let pack = DataPack::default();
        let mut buf = BytesMut::new();
        pack.pack_into(&Message::new(1, &b"a"[..]), &mut buf).unwrap();
        pack.pack_into(&Message::new(2, &b"bc"[..]), &mut buf).unwrap();

        assert_eq!(buf.len(), 9 + 10);
        assert_eq!(pack.unpack(&buf).unwrap(), Message::new(1, &b"a"[..]));
        assert_eq!(pack.unpack(&buf[9..]).unwrap(), Message::new(2, &b"bc"[..]));
    }

    #[test]
    fn test_unpack_header_truncated() {
        let pack = DataPack::default();
        for len in 0..8 {
            let result = pack.unpack_header(&vec![0u8; len]);
            assert!(matches!(
                result,
                Err(Error::Decode(DecodeError::Truncated { .. }))
            ));
        }
    }

    #[test]
    fn test_unpack_header_too_large() {
        let pack = DataPack::new(16);
        let mut buf = Vec::new();
        FrameHeader::new(17, 1).encode(&mut buf);

        assert_eq!(
            pack.unpack_header(&buf),
            Err(Error::Decode(DecodeError::TooLarge { size: 17, max: 16 }))
        );

        buf.clear();
        FrameHeader::new(16, 1).encode(&mut buf);
        assert_eq!(pack.unpack_header(&buf).unwrap().payload_len, 16);
    }

    #[test]
    fn test_unpack_header_unlimited() {
        let pack = DataPack::new(0);
        let mut buf = Vec::new();
        FrameHeader::new(u32::MAX, 1).encode(&mut buf);

        assert_eq!(pack.unpack_header(&buf).unwrap().payload_len, u32::MAX);
    }

    #[test]
    fn test_unpack_truncated_payload() {
        let pack = DataPack::default();
        let frame = pack.pack(&Message::new(3, &b"hello"[..])).unwrap();

        let result = pack.unpack(&frame[..frame.len() - 1]);
        assert_eq!(
            result,
            Err(Error::Decode(DecodeError::Truncated {
                required: 13,
                available: 12,
            }))
        );
    }
}
