//! The message type carried by every frame.

use bytes::Bytes;

/// One logical unit of application data: a numeric id and a byte payload.
///
/// The payload length is always derived from the payload itself, so a
/// `Message` can never disagree with the length written into its header.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Message {
    id: u32,
    payload: Bytes,
}

impl Message {
    /// Creates a new message.
    ///
    /// # Arguments
    /// * `id` - Message identifier used for routing
    /// * `payload` - Message body
    #[must_use]
    pub fn new(id: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    /// Returns the message id.
    #[must_use]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Returns the payload bytes.
    #[must_use]
    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Returns the payload length in bytes.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.payload.len()
    }

    /// Consumes the message and returns its payload.
    #[must_use]
    pub fn into_payload(self) -> Bytes {
        self.payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_new() {
        let msg = Message::new(7, &b"hello"[..]);
        assert_eq!(msg.id(), 7);
        assert_eq!(msg.payload().as_ref(), b"hello");
        assert_eq!(msg.payload_len(), 5);
    }

    #[test]
    fn test_message_payload_len_follows_payload() {
        let msg = Message::new(1, Vec::<u8>::new());
        assert_eq!(msg.payload_len(), 0);

        let msg = Message::new(1, vec![0u8; 300]);
        assert_eq!(msg.payload_len(), 300);
        assert_eq!(msg.into_payload().len(), 300);
    }
}
