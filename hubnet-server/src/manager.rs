//! Connection registry.

use crate::connection::Connection;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Notify;

/// Owns every live connection of one server, keyed by connection id.
///
/// Inserted into by the accept loop and removed from by each connection's
/// cleanup task.
pub struct ConnectionManager {
    connections: RwLock<HashMap<u64, Arc<Connection>>>,
    next_id: AtomicU64,
    drained: Notify,
}

impl ConnectionManager {
    /// Creates a new, empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            drained: Notify::new(),
        }
    }

    /// Allocates the next connection id.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Registers a connection.
    pub fn add(&self, conn: Arc<Connection>) {
        let id = conn.id();
        self.connections.write().insert(id, conn);
        tracing::debug!(conn_id = id, count = self.len(), "connection registered");
    }

    /// Removes a connection.
    pub fn remove(&self, conn_id: u64) -> Option<Arc<Connection>> {
        let mut connections = self.connections.write();
        let removed = connections.remove(&conn_id);
        if connections.is_empty() {
            self.drained.notify_waiters();
        }
        removed
    }

    /// Gets a connection by id.
    #[must_use]
    pub fn get(&self, conn_id: u64) -> Option<Arc<Connection>> {
        self.connections.read().get(&conn_id).cloned()
    }

    /// Returns the number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    /// Returns true if no connection is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Returns all connection ids.
    #[must_use]
    pub fn ids(&self) -> Vec<u64> {
        self.connections.read().keys().copied().collect()
    }

    /// Calls [`Connection::stop`] on every registered connection.
    ///
    /// Connections leave the registry on their own once their cleanup ran.
    pub fn stop_all(&self) {
        let connections: Vec<_> = self.connections.read().values().cloned().collect();
        for conn in connections {
            conn.stop();
        }
    }

    /// Waits until the registry is empty.
    pub async fn wait_empty(&self) {
        loop {
            let drained = self.drained.notified();
            if self.is_empty() {
                return;
            }
            drained.await;
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util;
    use std::time::Duration;

    #[test]
    fn test_next_id_is_monotonic() {
        let manager = ConnectionManager::new();
        let id1 = manager.next_id();
        let id2 = manager.next_id();

        assert_eq!(id1, 1);
        assert!(id2 > id1);
    }

    #[tokio::test]
    async fn test_add_get_remove() {
        let manager = ConnectionManager::new();
        let pair = test_util::connection(7, test_util::idle_workers(), 4).await;

        manager.add(pair.conn.clone());
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.ids(), vec![7]);
        assert_eq!(manager.get(7).unwrap().id(), 7);

        assert!(manager.remove(7).is_some());
        assert!(manager.remove(7).is_none());
        assert!(manager.is_empty());
    }

    #[tokio::test]
    async fn test_wait_empty_returns_immediately() {
        let manager = ConnectionManager::new();
        tokio::time::timeout(Duration::from_secs(1), manager.wait_empty())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_stop_all_drains_registry() {
        let pair = test_util::connection(1, test_util::idle_workers(), 4).await;
        pair.conn.start().unwrap();
        assert_eq!(pair.manager.len(), 1);

        pair.manager.stop_all();
        tokio::time::timeout(Duration::from_secs(2), pair.manager.wait_empty())
            .await
            .unwrap();
        assert!(pair.conn.is_closed());
    }
}
