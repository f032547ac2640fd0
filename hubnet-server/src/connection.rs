//! A single accepted TCP connection.
//!
//! A connection runs two tasks once started: a read loop that decodes frames
//! and hands them to the worker pool, and a write loop that drains the
//! buffered outbound queue. A third task waits for both to exit and then runs
//! the cleanup: on-stop hook, property store cleared, socket released,
//! registry entry removed.
//!
//! ```text
//! Created --start()--> Running --first of {read error, write error, stop()}--> Closing --cleanup--> Closed
//! ```

use crate::error::ServerError;
use crate::hooks::LifecycleHooks;
use crate::manager::ConnectionManager;
use crate::request::Request;
use crate::worker::WorkerPool;
use bytes::Bytes;
use futures::StreamExt;
use hubnet_core::{DataPack, Message};
use hubnet_transport::tcp::MessageCodec;
use parking_lot::{Mutex, RwLock};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Weak};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;

/// Value stored in a connection's property store.
pub type Property = Arc<dyn Any + Send + Sync>;

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum ConnectionState {
    /// Constructed, loops not running yet.
    Created = 0,
    /// Read and write loops are running.
    Running = 1,
    /// Shutdown requested, cleanup pending.
    Closing = 2,
    /// Cleanup done.
    Closed = 3,
}

impl ConnectionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Created,
            1 => Self::Running,
            2 => Self::Closing,
            _ => Self::Closed,
        }
    }
}

/// Server-owned collaborators a connection needs.
#[derive(Clone)]
pub(crate) struct ConnectionContext {
    pub(crate) manager: Arc<ConnectionManager>,
    pub(crate) hooks: Arc<LifecycleHooks>,
    pub(crate) workers: WorkerPool,
    pub(crate) pack: DataPack,
    pub(crate) outbound_capacity: usize,
}

/// One accepted socket and its per-connection state.
pub struct Connection {
    id: u64,
    remote_addr: SocketAddr,
    state: AtomicU8,
    this: Weak<Connection>,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: tokio::sync::Mutex<Option<OwnedWriteHalf>>,
    outbound_tx: mpsc::Sender<Bytes>,
    outbound_rx: Mutex<Option<mpsc::Receiver<Bytes>>>,
    properties: RwLock<HashMap<String, Property>>,
    close_signal: CancellationToken,
    closed: CancellationToken,
    ctx: ConnectionContext,
}

impl Connection {
    pub(crate) fn new(
        id: u64,
        stream: TcpStream,
        remote_addr: SocketAddr,
        ctx: ConnectionContext,
    ) -> Arc<Self> {
        let (reader, writer) = stream.into_split();
        let (outbound_tx, outbound_rx) = mpsc::channel(ctx.outbound_capacity);

        Arc::new_cyclic(|this| Self {
            id,
            remote_addr,
            state: AtomicU8::new(ConnectionState::Created as u8),
            this: this.clone(),
            reader: Mutex::new(Some(reader)),
            writer: tokio::sync::Mutex::new(Some(writer)),
            outbound_tx,
            outbound_rx: Mutex::new(Some(outbound_rx)),
            properties: RwLock::new(HashMap::new()),
            close_signal: CancellationToken::new(),
            closed: CancellationToken::new(),
            ctx,
        })
    }

    /// Returns the connection id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the peer address.
    #[must_use]
    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns true once the connection is closing or closed.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state() >= ConnectionState::Closing
    }

    /// Waits until cleanup has finished and the connection is closed.
    pub async fn closed(&self) {
        self.closed.cancelled().await;
    }

    /// Starts the connection on its own task.
    ///
    /// The task runs the on-start hook, then the read and write loops. The hook
    /// may already use [`Connection::send`]; frames it queues with
    /// [`Connection::send_buffered`] go out first once the write loop runs.
    ///
    /// # Errors
    /// Returns [`ServerError::AlreadyStarted`] if called twice, or
    /// [`ServerError::ConnectionClosed`] if the connection was stopped first.
    pub fn start(&self) -> Result<(), ServerError> {
        if let Err(current) = self.state.compare_exchange(
            ConnectionState::Created as u8,
            ConnectionState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            return match ConnectionState::from_u8(current) {
                ConnectionState::Running => Err(ServerError::AlreadyStarted),
                _ => Err(ServerError::ConnectionClosed),
            };
        }

        let (Some(conn), Some(reader), Some(outbound)) = (
            self.this.upgrade(),
            self.reader.lock().take(),
            self.outbound_rx.lock().take(),
        ) else {
            return Err(ServerError::AlreadyStarted);
        };

        tracing::debug!(conn_id = self.id, peer = %self.remote_addr, "connection started");

        tokio::spawn(async move {
            conn.ctx.hooks.call_on_start(&conn).await;

            let read_task = tokio::spawn(Arc::clone(&conn).read_loop(reader));
            let write_task = tokio::spawn(Arc::clone(&conn).write_loop(outbound));
            let _ = read_task.await;
            let _ = write_task.await;
            conn.finish().await;
        });

        Ok(())
    }

    /// Stops the connection. Safe to call any number of times.
    ///
    /// Both loops unwind, then the on-stop hook runs exactly once while the
    /// property store is still readable.
    pub fn stop(&self) {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            let state = ConnectionState::from_u8(current);
            if state >= ConnectionState::Closing {
                return;
            }

            match self.state.compare_exchange(
                current,
                ConnectionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    tracing::debug!(conn_id = self.id, "connection stopping");
                    self.close_signal.cancel();
                    // never started: no loop task will run the cleanup
                    if state == ConnectionState::Created
                        && let Some(conn) = self.this.upgrade()
                    {
                        tokio::spawn(conn.finish());
                    }
                    return;
                }
                Err(actual) => current = actual,
            }
        }
    }

    /// Packs a message and writes it straight to the socket.
    ///
    /// Waits until the bytes are handed to the OS.
    ///
    /// # Errors
    /// Returns [`ServerError::ConnectionClosed`] if the connection is or
    /// becomes closed, [`ServerError::Codec`] if the payload cannot be packed,
    /// or [`ServerError::Io`] if the write fails (the connection is stopped).
    pub async fn send(&self, id: u32, payload: impl Into<Bytes>) -> Result<(), ServerError> {
        if self.is_closed() {
            return Err(ServerError::ConnectionClosed);
        }

        let frame = self.ctx.pack.pack(&Message::new(id, payload))?;
        let result = self.write_frame(&frame).await;
        if matches!(result, Err(ServerError::Io(_))) {
            self.stop();
        }
        result
    }

    /// Packs a message and queues it for the write loop.
    ///
    /// Never waits on socket I/O.
    ///
    /// # Errors
    /// Returns [`ServerError::QueueFull`] if the outbound queue is at
    /// capacity, or [`ServerError::ConnectionClosed`] if the connection is closed.
    pub fn send_buffered(&self, id: u32, payload: impl Into<Bytes>) -> Result<(), ServerError> {
        if self.is_closed() {
            return Err(ServerError::ConnectionClosed);
        }

        let frame = self.ctx.pack.pack(&Message::new(id, payload))?;
        self.outbound_tx.try_send(frame).map_err(|e| match e {
            TrySendError::Full(_) => ServerError::QueueFull,
            TrySendError::Closed(_) => ServerError::ConnectionClosed,
        })
    }

    /// Stores a property, replacing any previous value under the key.
    pub fn set_property<V: Any + Send + Sync>(&self, key: impl Into<String>, value: V) {
        self.properties.write().insert(key.into(), Arc::new(value));
    }

    /// Returns a clone of the property stored under `key`.
    ///
    /// # Errors
    /// Returns [`ServerError::PropertyNotFound`] if nothing is stored under the
    /// key, or [`ServerError::PropertyType`] if the value is not a `V`.
    pub fn get_property<V: Any + Clone>(&self, key: &str) -> Result<V, ServerError> {
        let value = self
            .property(key)
            .ok_or_else(|| ServerError::PropertyNotFound {
                key: key.to_string(),
            })?;

        value
            .downcast_ref::<V>()
            .cloned()
            .ok_or_else(|| ServerError::PropertyType {
                key: key.to_string(),
            })
    }

    /// Returns the raw property stored under `key`.
    #[must_use]
    pub fn property(&self, key: &str) -> Option<Property> {
        self.properties.read().get(key).cloned()
    }

    /// Returns true if a property is stored under `key`.
    #[must_use]
    pub fn has_property(&self, key: &str) -> bool {
        self.properties.read().contains_key(key)
    }

    /// Removes a property, returning it if it was present.
    pub fn remove_property(&self, key: &str) -> Option<Property> {
        self.properties.write().remove(key)
    }

    async fn read_loop(self: Arc<Self>, reader: OwnedReadHalf) {
        let mut frames = FramedRead::new(reader, MessageCodec::with_pack(self.ctx.pack));

        loop {
            let frame = tokio::select! {
                _ = self.close_signal.cancelled() => break,
                frame = frames.next() => frame,
            };

            match frame {
                Some(Ok(msg)) => {
                    tracing::debug!(conn_id = self.id, msg_id = msg.id(), len = msg.payload_len(), "frame received");
                    let request = Request::new(Arc::clone(&self), msg);
                    let submitted = tokio::select! {
                        _ = self.close_signal.cancelled() => break,
                        result = self.ctx.workers.submit(request) => result,
                    };
                    if let Err(e) = submitted {
                        tracing::warn!(conn_id = self.id, error = %e, "dispatch unavailable");
                        break;
                    }
                }
                Some(Err(e)) if e.is_decode() => {
                    tracing::warn!(conn_id = self.id, peer = %self.remote_addr, error = %e, "malformed frame, closing connection");
                    break;
                }
                Some(Err(e)) => {
                    tracing::error!(conn_id = self.id, error = %e, "read error");
                    break;
                }
                None => {
                    tracing::debug!(conn_id = self.id, "peer closed connection");
                    break;
                }
            }
        }

        self.stop();
    }

    async fn write_loop(self: Arc<Self>, mut outbound: mpsc::Receiver<Bytes>) {
        loop {
            let frame = tokio::select! {
                biased;
                _ = self.close_signal.cancelled() => break,
                frame = outbound.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };

            if let Err(e) = self.write_frame(&frame).await {
                if !matches!(e, ServerError::ConnectionClosed) {
                    tracing::error!(conn_id = self.id, error = %e, "write error");
                }
                break;
            }
        }

        self.stop();
    }

    async fn write_frame(&self, frame: &[u8]) -> Result<(), ServerError> {
        let mut writer = tokio::select! {
            _ = self.close_signal.cancelled() => return Err(ServerError::ConnectionClosed),
            writer = self.writer.lock() => writer,
        };
        let Some(stream) = writer.as_mut() else {
            return Err(ServerError::ConnectionClosed);
        };

        tokio::select! {
            _ = self.close_signal.cancelled() => Err(ServerError::ConnectionClosed),
            result = stream.write_all(frame) => result.map_err(ServerError::from),
        }
    }

    async fn finish(self: Arc<Self>) {
        if let Some(mut stream) = self.writer.lock().await.take() {
            let _ = stream.shutdown().await;
        }
        self.reader.lock().take();

        self.ctx.hooks.call_on_stop(&self).await;
        self.properties.write().clear();
        self.state
            .store(ConnectionState::Closed as u8, Ordering::Release);
        self.ctx.manager.remove(self.id);
        self.closed.cancel();

        tracing::info!(conn_id = self.id, peer = %self.remote_addr, "connection closed");
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("remote_addr", &self.remote_addr)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
