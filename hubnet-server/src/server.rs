//! The server: accept loop, connection registry and worker pool wired together.

use crate::config::ServerConfig;
use crate::connection::{Connection, ConnectionContext};
use crate::dispatcher::MessageDispatcher;
use crate::error::ServerError;
use crate::hooks::{LifecycleHooks, conn_hook};
use crate::manager::ConnectionManager;
use crate::router::Router;
use crate::worker::WorkerPool;
use hubnet_core::DataPack;
use hubnet_transport::tcp::{TcpAcceptor, TcpAcceptorConfig};
use parking_lot::Mutex;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Time workers get to drain their queues on stop before they are aborted.
const WORKER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(5);
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

/// A TCP server dispatching framed messages to registered routers.
///
/// `Server` is a cheap handle; clones share the same server. Configure routes
/// and hooks, then call [`Server::serve`] (or [`Server::start`] to get the
/// bound address without blocking) and [`Server::stop`] from anywhere.
#[derive(Clone)]
pub struct Server {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    config: ServerConfig,
    dispatcher: Mutex<MessageDispatcher>,
    duplicate_routes: Mutex<Vec<u32>>,
    hooks: Arc<LifecycleHooks>,
    connections: Arc<ConnectionManager>,
    started: AtomicBool,
    stopping: AtomicBool,
    accept_shutdown: CancellationToken,
    worker_shutdown: CancellationToken,
    stopped: CancellationToken,
    local_addr: OnceLock<SocketAddr>,
    accept_task: Mutex<Option<JoinHandle<()>>>,
    worker_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Server {
    /// Creates a stopped server with the given configuration.
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self {
            inner: Arc::new(ServerInner {
                config,
                dispatcher: Mutex::new(MessageDispatcher::new()),
                duplicate_routes: Mutex::new(Vec::new()),
                hooks: Arc::new(LifecycleHooks::new()),
                connections: Arc::new(ConnectionManager::new()),
                started: AtomicBool::new(false),
                stopping: AtomicBool::new(false),
                accept_shutdown: CancellationToken::new(),
                worker_shutdown: CancellationToken::new(),
                stopped: CancellationToken::new(),
                local_addr: OnceLock::new(),
                accept_task: Mutex::new(None),
                worker_tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Sets the hook run for each accepted connection before its loops start.
    ///
    /// The hook runs on the connection's own task, so a slow hook never holds
    /// up accepting other clients.
    pub fn set_on_conn_start<F, Fut>(&self, hook: F)
    where
        F: Fn(Arc<Connection>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.hooks.set_on_start(conn_hook(hook));
    }

    /// Sets the hook run once per connection after it has shut down.
    pub fn set_on_conn_stop<F, Fut>(&self, hook: F)
    where
        F: Fn(Arc<Connection>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.inner.hooks.set_on_stop(conn_hook(hook));
    }

    /// Registers a router for a message id.
    ///
    /// A rejected duplicate is remembered, and [`Server::start`] refuses to
    /// run until the server is rebuilt without it.
    ///
    /// # Errors
    /// Returns [`ServerError::DuplicateRoute`] if the id already has a router,
    /// or [`ServerError::AlreadyStarted`] once the server is running.
    pub fn add_router<R: Router + 'static>(&self, id: u32, router: R) -> Result<(), ServerError> {
        if self.inner.started.load(Ordering::Acquire) {
            return Err(ServerError::AlreadyStarted);
        }

        let result = self.inner.dispatcher.lock().register(id, router);
        match &result {
            Ok(()) => tracing::debug!(msg_id = id, "router registered"),
            Err(e) => {
                tracing::warn!(msg_id = id, error = %e, "router rejected");
                self.inner.duplicate_routes.lock().push(id);
            }
        }
        result
    }

    /// Binds the listener, starts the workers and the accept loop.
    ///
    /// Returns once the server is accepting, with the bound address.
    ///
    /// # Errors
    /// Returns [`ServerError::InvalidConfig`] for a bad configuration,
    /// [`ServerError::DuplicateRoute`] if a duplicate router was added,
    /// [`ServerError::AlreadyStarted`] on a second call,
    /// [`ServerError::Shutdown`] if the server was already stopped, or
    /// [`ServerError::Startup`] if the address cannot be bound.
    pub async fn start(&self) -> Result<SocketAddr, ServerError> {
        let inner = &self.inner;
        inner.config.validate()?;

        if let Some(&id) = inner.duplicate_routes.lock().first() {
            return Err(ServerError::DuplicateRoute { id });
        }
        if inner.stopping.load(Ordering::Acquire) {
            return Err(ServerError::Shutdown);
        }
        if inner.started.swap(true, Ordering::AcqRel) {
            return Err(ServerError::AlreadyStarted);
        }

        let (acceptor, local_addr) = match self.bind().await {
            Ok(bound) => bound,
            Err(e) => {
                inner.started.store(false, Ordering::Release);
                return Err(e);
            }
        };
        if inner.stopping.load(Ordering::Acquire) {
            return Err(ServerError::Shutdown);
        }
        let _ = inner.local_addr.set(local_addr);

        let dispatcher = Arc::new(std::mem::take(&mut *inner.dispatcher.lock()));
        let (workers, worker_tasks) = WorkerPool::start(
            dispatcher,
            inner.config.worker_pool_size,
            inner.config.worker_queue_capacity,
            inner.worker_shutdown.clone(),
        );

        let ctx = ConnectionContext {
            manager: Arc::clone(&inner.connections),
            hooks: Arc::clone(&inner.hooks),
            workers,
            pack: DataPack::new(inner.config.max_package_size),
            outbound_capacity: inner.config.outbound_queue_capacity,
        };
        *inner.worker_tasks.lock() = worker_tasks;
        *inner.accept_task.lock() =
            Some(tokio::spawn(accept_loop(Arc::clone(inner), acceptor, ctx)));

        tracing::info!(
            name = %inner.config.name,
            addr = %local_addr,
            workers = inner.config.worker_pool_size,
            max_package_size = inner.config.max_package_size,
            "server listening"
        );
        Ok(local_addr)
    }

    async fn bind(&self) -> Result<(TcpAcceptor, SocketAddr), ServerError> {
        let config = &self.inner.config;
        let acceptor_config =
            TcpAcceptorConfig::new(config.bind_addr).tcp_nodelay(config.tcp_nodelay);
        let acceptor = TcpAcceptor::bind(acceptor_config)
            .await
            .map_err(|source| ServerError::Startup {
                addr: config.bind_addr,
                source,
            })?;
        let local_addr = acceptor.local_addr()?;
        Ok((acceptor, local_addr))
    }

    /// Starts the server and waits until [`Server::stop`] has completed.
    ///
    /// # Errors
    /// Returns any error from [`Server::start`].
    pub async fn serve(&self) -> Result<(), ServerError> {
        self.start().await?;
        self.inner.stopped.cancelled().await;
        Ok(())
    }

    /// Stops accepting, closes every connection and shuts the workers down.
    ///
    /// Returns once the registry is empty and the workers are gone. Workers
    /// get a short grace period to finish queued requests; a worker still
    /// busy after that, such as one stuck in a handler that never returns,
    /// is aborted. Idempotent; concurrent callers all return once shutdown
    /// is complete.
    pub async fn stop(&self) {
        let inner = &self.inner;
        if inner.stopping.swap(true, Ordering::AcqRel) {
            inner.stopped.cancelled().await;
            return;
        }

        tracing::info!(name = %inner.config.name, "server stopping");
        inner.accept_shutdown.cancel();

        // accept loop first, so no connection is added behind stop_all
        let accept = inner.accept_task.lock().take();
        if let Some(accept) = accept {
            let _ = accept.await;
        }

        inner.connections.stop_all();
        inner.connections.wait_empty().await;

        inner.worker_shutdown.cancel();
        let mut workers = std::mem::take(&mut *inner.worker_tasks.lock());
        let drained = tokio::time::timeout(WORKER_DRAIN_TIMEOUT, async {
            for worker in workers.iter_mut() {
                let _ = worker.await;
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                timeout = ?WORKER_DRAIN_TIMEOUT,
                "workers still busy after stop, aborting"
            );
            for worker in &workers {
                worker.abort();
            }
        }

        inner.stopped.cancel();
        tracing::info!(name = %inner.config.name, "server stopped");
    }

    /// Returns the bound address once the server has started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.local_addr.get().copied()
    }

    /// Returns the number of live connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.inner.connections.len()
    }

    /// Returns a live connection by id.
    #[must_use]
    pub fn connection(&self, conn_id: u64) -> Option<Arc<Connection>> {
        self.inner.connections.get(conn_id)
    }

    /// Returns true while the server is accepting connections.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner.started.load(Ordering::Acquire) && !self.inner.stopping.load(Ordering::Acquire)
    }
}

async fn accept_loop(inner: Arc<ServerInner>, acceptor: TcpAcceptor, ctx: ConnectionContext) {
    let max_connections = inner.config.max_connections;
    let mut accept_errors = 0u32;

    loop {
        let accepted = tokio::select! {
            _ = inner.accept_shutdown.cancelled() => break,
            accepted = acceptor.accept() => accepted,
        };

        let (stream, peer) = match accepted {
            Ok(accepted) => {
                accept_errors = 0;
                accepted
            }
            Err(e) => {
                accept_errors = accept_errors.saturating_add(1);
                let delay = accept_backoff(accept_errors);
                tracing::error!(error = %e, retry_in = ?delay, "accept error");
                let stopped = tokio::select! {
                    _ = inner.accept_shutdown.cancelled() => true,
                    _ = tokio::time::sleep(delay) => false,
                };
                if stopped {
                    break;
                }
                continue;
            }
        };

        if max_connections > 0 && inner.connections.len() >= max_connections {
            tracing::warn!(%peer, max_connections, "connection limit reached, rejecting");
            drop(stream);
            continue;
        }

        let conn_id = inner.connections.next_id();
        let conn = Connection::new(conn_id, stream, peer, ctx.clone());
        inner.connections.add(Arc::clone(&conn));
        tracing::info!(conn_id, %peer, connections = inner.connections.len(), "connection accepted");

        if let Err(e) = conn.start() {
            tracing::debug!(conn_id, error = %e, "connection not started");
        }
    }

    tracing::debug!("accept loop stopped");
}

/// Delay before accepting again after `consecutive` failed accepts.
fn accept_backoff(consecutive: u32) -> Duration {
    let factor = 1u32 << consecutive.saturating_sub(1).min(8);
    ACCEPT_BACKOFF_MIN
        .saturating_mul(factor)
        .min(ACCEPT_BACKOFF_MAX)
}
