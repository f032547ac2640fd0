//! Helpers for unit tests that need a live connection.

use crate::connection::{Connection, ConnectionContext};
use crate::dispatcher::MessageDispatcher;
use crate::hooks::LifecycleHooks;
use crate::manager::ConnectionManager;
use crate::worker::WorkerPool;
use hubnet_core::DataPack;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

/// A server-side connection with the client socket on the other end.
pub(crate) struct TestConnection {
    pub(crate) conn: Arc<Connection>,
    pub(crate) peer: TcpStream,
    pub(crate) manager: Arc<ConnectionManager>,
    pub(crate) hooks: Arc<LifecycleHooks>,
}

/// Builds a registered, not yet started connection over a loopback socket.
pub(crate) async fn connection(
    id: u64,
    workers: WorkerPool,
    outbound_capacity: usize,
) -> TestConnection {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (peer, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
    let peer = peer.unwrap();
    let (stream, remote_addr) = accepted.unwrap();

    let manager = Arc::new(ConnectionManager::new());
    let hooks = Arc::new(LifecycleHooks::new());
    let ctx = ConnectionContext {
        manager: Arc::clone(&manager),
        hooks: Arc::clone(&hooks),
        workers,
        pack: DataPack::default(),
        outbound_capacity,
    };

    let conn = Connection::new(id, stream, remote_addr, ctx);
    manager.add(Arc::clone(&conn));

    TestConnection {
        conn,
        peer,
        manager,
        hooks,
    }
}

/// A single worker with no routes.
pub(crate) fn idle_workers() -> WorkerPool {
    let (pool, _) = WorkerPool::start(
        Arc::new(MessageDispatcher::new()),
        1,
        16,
        CancellationToken::new(),
    );
    pool
}
