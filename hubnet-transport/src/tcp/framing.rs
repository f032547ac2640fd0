//! Message framing codec for TCP.
//!
//! Decoding happens in two phases: first the fixed header is read and its
//! length validated, then exactly `payload_len` bytes are awaited. An
//! oversized length is rejected before any payload buffer is reserved, and
//! the read buffer never grows more than [`MAX_RESERVE_AHEAD`] bytes past
//! what the peer has actually sent.

use crate::error::TransportError;
use bytes::{Buf, BytesMut};
use hubnet_core::{DataPack, FrameHeader, Message};
use tokio_util::codec::{Decoder, Encoder};

/// Upper bound on buffer space reserved ahead of received payload bytes.
pub const MAX_RESERVE_AHEAD: usize = 64 * 1024;

/// Length-prefixed framing codec for hubnet messages.
///
/// Frame format: `[4-byte payloadLen][4-byte msgId][payload]` (little-endian)
#[derive(Debug, Clone, Default)]
pub struct MessageCodec {
    pack: DataPack,
    pending: Option<FrameHeader>,
}

impl MessageCodec {
    /// Creates a new codec with the specified maximum package size.
    ///
    /// # Arguments
    /// * `max_package_size` - Maximum allowed payload size in bytes
    #[must_use]
    pub fn new(max_package_size: u32) -> Self {
        Self::with_pack(DataPack::new(max_package_size))
    }

    /// Creates a new codec around an existing [`DataPack`].
    #[must_use]
    pub fn with_pack(pack: DataPack) -> Self {
        Self {
            pack,
            pending: None,
        }
    }

    /// Returns the maximum package size.
    #[must_use]
    pub fn max_package_size(&self) -> u32 {
        self.pack.max_package_size()
    }
}

impl Decoder for MessageCodec {
    type Item = Message;
    type Error = TransportError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let header = match self.pending {
            Some(header) => header,
            None => {
                if src.len() < self.pack.header_len() {
                    return Ok(None);
                }

                let header = self.pack.unpack_header(&src[..])?;
                src.advance(self.pack.header_len());
                self.pending = Some(header);
                header
            }
        };

        let payload_len = header.payload_len as usize;
        if src.len() < payload_len {
            src.reserve((payload_len - src.len()).min(MAX_RESERVE_AHEAD));
            return Ok(None);
        }

        self.pending = None;
        let payload = src.split_to(payload_len).freeze();
        Ok(Some(Message::new(header.msg_id, payload)))
    }
}

impl Encoder<Message> for MessageCodec {
    type Error = TransportError;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        <Self as Encoder<&Message>>::encode(self, &item, dst)
    }
}

impl Encoder<&Message> for MessageCodec {
    type Error = TransportError;

    fn encode(&mut self, item: &Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        self.pack.pack_into(item, dst)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    #[test]
    fn test_encode_decode() {
        let mut codec = MessageCodec::new(1024);
        let mut buf = BytesMut::new();

        codec.encode(Message::new(5, &b"hello"[..]), &mut buf).unwrap();
        assert_eq!(buf.len(), 8 + 5);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, Message::new(5, &b"hello"[..]));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_partial_frame() {
        let mut codec = MessageCodec::new(1024);
        let mut buf = BytesMut::new();

        // Partial header
        buf.put_u32_le(10);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        // Complete header, no payload yet
        buf.put_u32_le(7);
        assert!(codec.decode(&mut buf).unwrap().is_none());

        // Payload split across reads
        buf.put_slice(&[1u8; 4]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.put_slice(&[2u8; 6]);

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.id(), 7);
        assert_eq!(decoded.payload_len(), 10);
        assert_eq!(&decoded.payload()[..4], &[1u8; 4]);
    }

    #[test]
    fn test_unbounded_length_reserves_in_chunks() {
        let mut codec = MessageCodec::new(0);
        let mut buf = BytesMut::new();
        buf.put_u32_le(u32::MAX);
        buf.put_u32_le(1);
        buf.put_slice(&[0u8; 16]);

        assert!(codec.decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 16);
        assert!(buf.capacity() < 1 << 20);
    }

    #[test]
    fn test_frame_too_large_rejected_before_payload() {
        let mut codec = MessageCodec::new(100);
        let mut buf = BytesMut::new();
        buf.put_u32_le(200);
        buf.put_u32_le(1);

        let err = codec.decode(&mut buf).unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn test_empty_payload() {
        let mut codec = MessageCodec::new(16);
        let mut buf = BytesMut::new();
        codec.encode(Message::new(3, Vec::<u8>::new()), &mut buf).unwrap();

        let decoded = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded.id(), 3);
        assert_eq!(decoded.payload_len(), 0);
    }

    #[test]
    fn test_multiple_frames() {
        let mut codec = MessageCodec::new(1024);
        let mut buf = BytesMut::new();

        codec.encode(&Message::new(1, &b"frame1"[..]), &mut buf).unwrap();
        codec.encode(&Message::new(2, &b"frame2"[..]), &mut buf).unwrap();
        codec.encode(&Message::new(3, &b"frame3"[..]), &mut buf).unwrap();

        for id in 1..=3u32 {
            let msg = codec.decode(&mut buf).unwrap().unwrap();
            assert_eq!(msg.id(), id);
            assert_eq!(msg.payload().as_ref(), format!("frame{id}").as_bytes());
        }
        assert!(codec.decode(&mut buf).unwrap().is_none());
    }
}
