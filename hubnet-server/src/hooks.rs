//! Connection lifecycle hooks.

use crate::connection::Connection;
use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Async callable invoked with a connection on a lifecycle transition.
pub type ConnHook = Arc<dyn Fn(Arc<Connection>) -> BoxFuture<'static, ()> + Send + Sync>;

/// Boxes an async closure into a [`ConnHook`].
pub fn conn_hook<F, Fut>(hook: F) -> ConnHook
where
    F: Fn(Arc<Connection>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move |conn: Arc<Connection>| -> BoxFuture<'static, ()> { hook(conn).boxed() })
}

/// The on-start and on-stop hooks of one server.
///
/// At most one hook of each kind is active; setting a new one replaces the old.
#[derive(Default)]
pub struct LifecycleHooks {
    on_start: RwLock<Option<ConnHook>>,
    on_stop: RwLock<Option<ConnHook>>,
}

impl LifecycleHooks {
    /// Creates an empty hook set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hook run on the connection's own task before its loops start.
    pub fn set_on_start(&self, hook: ConnHook) {
        *self.on_start.write() = Some(hook);
    }

    /// Sets the hook run once a connection has shut down.
    pub fn set_on_stop(&self, hook: ConnHook) {
        *self.on_stop.write() = Some(hook);
    }

    pub(crate) async fn call_on_start(&self, conn: &Arc<Connection>) {
        let hook = self.on_start.read().clone();
        if let Some(hook) = hook {
            call_hook("on_start", &hook, conn).await;
        }
    }

    pub(crate) async fn call_on_stop(&self, conn: &Arc<Connection>) {
        let hook = self.on_stop.read().clone();
        if let Some(hook) = hook {
            call_hook("on_stop", &hook, conn).await;
        }
    }
}

async fn call_hook(kind: &'static str, hook: &ConnHook, conn: &Arc<Connection>) {
    let run = AssertUnwindSafe(async { hook(Arc::clone(conn)).await });
    if run.catch_unwind().await.is_err() {
        tracing::error!(conn_id = conn.id(), hook = kind, "connection hook panicked");
    }
}
