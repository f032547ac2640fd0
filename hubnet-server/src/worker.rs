//! Fixed-size pool of dispatch workers.
//!
//! Each worker owns its own bounded queue. A request from connection `id`
//! always goes to worker `id % size`, so messages from one connection are
//! handled by one worker in the order they were read.

use crate::dispatcher::MessageDispatcher;
use crate::error::ServerError;
use crate::request::Request;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Submission handle for the dispatch workers.
///
/// Cloning is cheap; all clones feed the same workers.
#[derive(Clone)]
pub struct WorkerPool {
    queues: Arc<[mpsc::Sender<Request>]>,
}

impl WorkerPool {
    /// Spawns `size` workers, each with a queue of `capacity` requests.
    ///
    /// Workers exit once `shutdown` is cancelled and their queue is empty, or
    /// once every submission handle has been dropped.
    ///
    /// # Panics
    /// Panics if `size` or `capacity` is zero, or if called outside a tokio runtime.
    #[must_use]
    pub fn start(
        dispatcher: Arc<MessageDispatcher>,
        size: usize,
        capacity: usize,
        shutdown: CancellationToken,
    ) -> (Self, Vec<JoinHandle<()>>) {
        assert!(size > 0, "worker pool needs at least one worker");

        let mut queues = Vec::with_capacity(size);
        let mut handles = Vec::with_capacity(size);

        for index in 0..size {
            let (tx, rx) = mpsc::channel(capacity);
            queues.push(tx);
            handles.push(tokio::spawn(run_worker(
                index,
                rx,
                Arc::clone(&dispatcher),
                shutdown.clone(),
            )));
        }

        tracing::debug!(workers = size, capacity, "worker pool started");
        (
            Self {
                queues: queues.into(),
            },
            handles,
        )
    }

    /// Returns the number of workers.
    #[must_use]
    pub fn size(&self) -> usize {
        self.queues.len()
    }

    /// Returns the index of the worker serving a connection.
    #[inline]
    #[must_use]
    pub fn worker_index(&self, conn_id: u64) -> usize {
        (conn_id % self.queues.len() as u64) as usize
    }

    /// Hands a request to the worker serving its connection.
    ///
    /// Waits while that worker's queue is full.
    ///
    /// # Errors
    /// Returns [`ServerError::Shutdown`] if the worker has exited.
    pub async fn submit(&self, request: Request) -> Result<(), ServerError> {
        let index = self.worker_index(request.connection().id());
        self.queues[index]
            .send(request)
            .await
            .map_err(|_| ServerError::Shutdown)
    }
}

async fn run_worker(
    index: usize,
    mut queue: mpsc::Receiver<Request>,
    dispatcher: Arc<MessageDispatcher>,
    shutdown: CancellationToken,
) {
    loop {
        let request = tokio::select! {
            biased;
            request = queue.recv() => match request {
                Some(request) => request,
                None => break,
            },
            _ = shutdown.cancelled() => break,
        };

        let conn_id = request.connection().id();
        let msg_id = request.msg_id();
        match dispatcher.dispatch(&request).await {
            Ok(()) => {}
            Err(ServerError::NoRoute { .. }) => {
                tracing::warn!(worker = index, conn_id, msg_id, "no router registered for message");
            }
            Err(e) => {
                tracing::error!(worker = index, conn_id, msg_id, error = %e, "handler failed");
            }
        }
    }

    tracing::debug!(worker = index, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::{FnRouter, Router};
    use crate::test_util;
    use async_trait::async_trait;
    use hubnet_core::Message;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    struct Recording {
        events: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Router for Recording {
        async fn pre_handle(&self, request: &Request) {
            self.events.lock().push(format!("pre:{}", tag(request)));
        }

        async fn handle(&self, request: &Request) {
            // yield so an out-of-order worker would have a chance to interleave
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.events.lock().push(format!("handle:{}", tag(request)));
        }

        async fn post_handle(&self, request: &Request) {
            self.events.lock().push(format!("post:{}", tag(request)));
        }
    }

    fn tag(request: &Request) -> String {
        String::from_utf8_lossy(request.data()).into_owned()
    }

    struct Blocking;

    #[async_trait]
    impl Router for Blocking {
        async fn handle(&self, _request: &Request) {
            std::future::pending::<()>().await;
        }
    }

    fn pool(dispatcher: MessageDispatcher, size: usize) -> WorkerPool {
        let (pool, _handles) =
            WorkerPool::start(Arc::new(dispatcher), size, 16, CancellationToken::new());
        pool
    }

    #[tokio::test]
    async fn test_worker_index() {
        let pool = pool(MessageDispatcher::new(), 4);
        assert_eq!(pool.size(), 4);
        assert_eq!(pool.worker_index(0), 0);
        assert_eq!(pool.worker_index(5), 1);
        assert_eq!(pool.worker_index(7), 3);
        assert_eq!(pool.worker_index(8), 0);
    }

    #[tokio::test]
    async fn test_same_connection_is_ordered() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut dispatcher = MessageDispatcher::new();
        dispatcher
            .register(
                1,
                Recording {
                    events: events.clone(),
                },
            )
            .unwrap();
        let pool = pool(dispatcher, 4);
        let pair = test_util::connection(1, pool.clone(), 4).await;

        for tag in ["A", "B", "C"] {
            pool.submit(Request::new(pair.conn.clone(), Message::new(1, tag)))
                .await
                .unwrap();
        }

        tokio::time::timeout(Duration::from_secs(5), async {
            while events.lock().len() < 9 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let expected: Vec<String> = ["A", "B", "C"]
            .iter()
            .flat_map(|t| [format!("pre:{t}"), format!("handle:{t}"), format!("post:{t}")])
            .collect();
        assert_eq!(*events.lock(), expected);
    }

    #[tokio::test]
    async fn test_blocked_worker_does_not_stall_others() {
        let delivered = Arc::new(Notify::new());
        let delivered_clone = delivered.clone();

        let mut dispatcher = MessageDispatcher::new();
        dispatcher.register(1, Blocking).unwrap();
        dispatcher
            .register(2, FnRouter::new(move |_| delivered_clone.notify_one()))
            .unwrap();
        let pool = pool(dispatcher, 2);

        // ids 2 and 3 land on different workers
        let x = test_util::connection(2, pool.clone(), 4).await;
        let y = test_util::connection(3, pool.clone(), 4).await;
        assert_ne!(pool.worker_index(2), pool.worker_index(3));

        pool.submit(Request::new(x.conn.clone(), Message::new(1, &b""[..])))
            .await
            .unwrap();
        pool.submit(Request::new(y.conn.clone(), Message::new(2, &b""[..])))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), delivered.notified())
            .await
            .expect("message on the other worker was delayed");
    }

    #[tokio::test]
    async fn test_worker_survives_panic() {
        struct Panicking;

        #[async_trait]
        impl Router for Panicking {
            async fn handle(&self, _request: &Request) {
                panic!("handler failure");
            }
        }

        let delivered = Arc::new(Notify::new());
        let delivered_clone = delivered.clone();

        let mut dispatcher = MessageDispatcher::new();
        dispatcher.register(1, Panicking).unwrap();
        dispatcher
            .register(2, FnRouter::new(move |_| delivered_clone.notify_one()))
            .unwrap();
        let pool = pool(dispatcher, 1);
        let pair = test_util::connection(1, pool.clone(), 4).await;

        pool.submit(Request::new(pair.conn.clone(), Message::new(1, &b""[..])))
            .await
            .unwrap();
        pool.submit(Request::new(pair.conn.clone(), Message::new(99, &b""[..])))
            .await
            .unwrap();
        pool.submit(Request::new(pair.conn.clone(), Message::new(2, &b""[..])))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(2), delivered.notified())
            .await
            .expect("worker stopped after panic");
        assert!(!pair.conn.is_closed());
    }

    #[tokio::test]
    async fn test_queued_request_runs_after_connection_closed() {
        struct Gate(Arc<Notify>);

        #[async_trait]
        impl Router for Gate {
            async fn handle(&self, _request: &Request) {
                self.0.notified().await;
            }
        }

        let gate = Arc::new(Notify::new());
        let outcome = Arc::new(Mutex::new(None));
        let outcome_clone = outcome.clone();

        let mut dispatcher = MessageDispatcher::new();
        dispatcher.register(1, Gate(gate.clone())).unwrap();
        dispatcher
            .register(
                2,
                FnRouter::new(move |request: &Request| {
                    let sent = request.connection().send_buffered(2, &b"late"[..]);
                    *outcome_clone.lock() = Some(sent);
                }),
            )
            .unwrap();
        let pool = pool(dispatcher, 1);
        let pair = test_util::connection(1, pool.clone(), 4).await;

        // the worker holds the first request at the gate while the second waits in its queue
        pool.submit(Request::new(pair.conn.clone(), Message::new(1, &b""[..])))
            .await
            .unwrap();
        pool.submit(Request::new(pair.conn.clone(), Message::new(2, &b""[..])))
            .await
            .unwrap();

        pair.conn.stop();
        assert!(pair.conn.is_closed());
        gate.notify_one();

        tokio::time::timeout(Duration::from_secs(2), async {
            while outcome.lock().is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("queued request was dropped");
        assert!(matches!(
            outcome.lock().take(),
            Some(Err(ServerError::ConnectionClosed))
        ));
    }

    #[tokio::test]
    async fn test_submit_after_shutdown() {
        let shutdown = CancellationToken::new();
        let (pool, handles) =
            WorkerPool::start(Arc::new(MessageDispatcher::new()), 1, 1, shutdown.clone());
        shutdown.cancel();
        for handle in handles {
            handle.await.unwrap();
        }

        let pair = test_util::connection(1, pool.clone(), 4).await;
        let err = pool
            .submit(Request::new(pair.conn.clone(), Message::new(1, &b""[..])))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Shutdown));
    }
}
