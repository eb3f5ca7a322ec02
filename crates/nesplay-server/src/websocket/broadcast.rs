//! Fan-out to connected WebSocket clients.

use std::collections::HashMap;
use std::sync::Arc;

use nesplay_core::{ConnectionId, FanOut};
use parking_lot::RwLock;
use tracing::{debug, trace};

use super::connection::ClientConnection;

/// Table of live connections, used by the dispatcher to deliver messages.
pub struct BroadcastManager {
    connections: RwLock<HashMap<ConnectionId, Arc<ClientConnection>>>,
}

impl BroadcastManager {
    /// Create an empty table.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a connection.
    pub fn add(&self, connection: Arc<ClientConnection>) {
        let _ = self
            .connections
            .write()
            .insert(connection.id.clone(), connection);
    }

    /// Unregister a connection. Unknown ids are ignored.
    pub fn remove(&self, id: &ConnectionId) {
        let _ = self.connections.write().remove(id);
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }
}

impl Default for BroadcastManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FanOut for BroadcastManager {
    fn send(&self, to: &ConnectionId, message: &str) -> bool {
        let Some(conn) = self.connections.read().get(to).cloned() else {
            trace!(conn_id = %to, "send to unknown connection");
            return false;
        };
        let sent = conn.send(Arc::from(message));
        if !sent {
            debug!(conn_id = %to, "outbound queue full or closed, message dropped");
        }
        sent
    }

    fn broadcast_except(&self, message: &str, excluded: &ConnectionId) -> usize {
        let message: Arc<str> = Arc::from(message);
        let conns = self.connections.read();
        let mut reached = 0;
        for conn in conns.values().filter(|c| &c.id != excluded) {
            if conn.send(Arc::clone(&message)) {
                reached += 1;
            } else {
                debug!(conn_id = %conn.id, "outbound queue full or closed, broadcast dropped");
            }
        }
        reached
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn connect(bm: &BroadcastManager, name: &str) -> (ConnectionId, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(8);
        let id = ConnectionId::from_raw(name);
        bm.add(Arc::new(ClientConnection::new(id.clone(), tx)));
        (id, rx)
    }

    #[test]
    fn add_and_remove() {
        let bm = BroadcastManager::new();
        let (a, _ra) = connect(&bm, "a");
        let (_b, _rb) = connect(&bm, "b");
        assert_eq!(bm.connection_count(), 2);
        bm.remove(&a);
        bm.remove(&a);
        assert_eq!(bm.connection_count(), 1);
    }

    #[test]
    fn send_targets_one_connection() {
        let bm = BroadcastManager::new();
        let (a, mut ra) = connect(&bm, "a");
        let (_b, mut rb) = connect(&bm, "b");

        assert!(bm.send(&a, "hi"));
        assert_eq!(&*ra.try_recv().unwrap(), "hi");
        assert!(rb.try_recv().is_err());
    }

    #[test]
    fn send_to_unknown_connection_is_silent() {
        let bm = BroadcastManager::new();
        assert!(!bm.send(&ConnectionId::from_raw("ghost"), "hi"));
    }

    #[test]
    fn broadcast_skips_excluded() {
        let bm = BroadcastManager::new();
        let (a, mut ra) = connect(&bm, "a");
        let (_b, mut rb) = connect(&bm, "b");
        let (_c, mut rc) = connect(&bm, "c");

        assert_eq!(bm.broadcast_except("news", &a), 2);
        assert!(ra.try_recv().is_err());
        assert_eq!(&*rb.try_recv().unwrap(), "news");
        assert_eq!(&*rc.try_recv().unwrap(), "news");
    }

    #[test]
    fn broadcast_counts_only_delivered() {
        let bm = BroadcastManager::new();
        let (a, _ra) = connect(&bm, "a");
        let (_b, rb) = connect(&bm, "b");
        drop(rb);
        assert_eq!(bm.broadcast_except("news", &a), 0);
    }
}
