//! Router trait.

use crate::request::Request;
use async_trait::async_trait;

/// Handler bound to one message id.
///
/// For each request the dispatch worker runs `pre_handle`, `handle` and
/// `post_handle` in that order. Only `handle` is required. None of them is
/// retried, and a panic in one skips the rest of the triple for that request.
#[async_trait]
pub trait Router: Send + Sync {
    /// Called before [`Router::handle`].
    async fn pre_handle(&self, _request: &Request) {}

    /// Handles the request.
    ///
    /// Replies should normally go through
    /// [`Connection::send_buffered`](crate::Connection::send_buffered) so the
    /// worker never waits on socket I/O. The connection may already be closed;
    /// the resulting error is not fatal.
    async fn handle(&self, request: &Request);

    /// Called after [`Router::handle`].
    async fn post_handle(&self, _request: &Request) {}
}

/// Wrapper to turn a closure into a [`Router`].
pub struct FnRouter<F> {
    handler: F,
}

impl<F> FnRouter<F>
where
    F: Fn(&Request) + Send + Sync,
{
    /// Creates a new function router.
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> Router for FnRouter<F>
where
    F: Fn(&Request) + Send + Sync,
{
    async fn handle(&self, request: &Request) {
        (self.handler)(request);
    }
}
