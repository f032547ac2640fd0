//! Request type handed to routers.

use crate::connection::Connection;
use bytes::Bytes;
use hubnet_core::Message;
use std::sync::Arc;

/// A decoded message paired with the connection it arrived on.
///
/// Created once per frame by the connection's read loop and dropped once
/// the router triple for it has run.
#[derive(Debug, Clone)]
pub struct Request {
    conn: Arc<Connection>,
    msg: Message,
}

impl Request {
    /// Creates a new request.
    #[must_use]
    pub fn new(conn: Arc<Connection>, msg: Message) -> Self {
        Self { conn, msg }
    }

    /// Returns the connection the message arrived on.
    #[must_use]
    pub fn connection(&self) -> &Arc<Connection> {
        &self.conn
    }

    /// Returns the message id.
    #[must_use]
    pub fn msg_id(&self) -> u32 {
        self.msg.id()
    }

    /// Returns the message payload.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        self.msg.payload()
    }

    /// Returns the full message.
    #[must_use]
    pub fn message(&self) -> &Message {
        &self.msg
    }
}
