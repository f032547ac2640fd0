//! Message dispatcher for routing requests to routers.

use crate::error::ServerError;
use crate::request::Request;
use crate::router::Router;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Routing table from message id to [`Router`].
///
/// Filled before the server starts and read-only afterwards.
#[derive(Default)]
pub struct MessageDispatcher {
    routes: HashMap<u32, Arc<dyn Router>>,
}

impl MessageDispatcher {
    /// Creates a new empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a router for a message id.
    ///
    /// # Errors
    /// Returns [`ServerError::DuplicateRoute`] if the id already has a router;
    /// the existing router is kept.
    pub fn register<R: Router + 'static>(&mut self, id: u32, router: R) -> Result<(), ServerError> {
        self.register_arc(id, Arc::new(router))
    }

    /// Registers a shared router for a message id.
    ///
    /// # Errors
    /// Returns [`ServerError::DuplicateRoute`] if the id already has a router.
    pub fn register_arc(&mut self, id: u32, router: Arc<dyn Router>) -> Result<(), ServerError> {
        if self.routes.contains_key(&id) {
            return Err(ServerError::DuplicateRoute { id });
        }
        self.routes.insert(id, router);
        Ok(())
    }

    /// Returns true if a router is registered for the given id.
    #[must_use]
    pub fn has_route(&self, id: u32) -> bool {
        self.routes.contains_key(&id)
    }

    /// Returns the number of registered routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no routes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Runs the router triple for one request.
    ///
    /// Panics raised by the router are caught here and turned into
    /// [`ServerError::HandlerPanic`].
    ///
    /// # Errors
    /// Returns [`ServerError::NoRoute`] if no router is registered for the
    /// message id, or [`ServerError::HandlerPanic`] if the router panicked.
    pub async fn dispatch(&self, request: &Request) -> Result<(), ServerError> {
        let id = request.msg_id();
        let router = self.routes.get(&id).ok_or(ServerError::NoRoute { id })?;

        AssertUnwindSafe(async {
            router.pre_handle(request).await;
            router.handle(request).await;
            router.post_handle(request).await;
        })
        .catch_unwind()
        .await
        .map_err(|panic| ServerError::HandlerPanic {
            id,
            message: panic_message(&*panic),
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
