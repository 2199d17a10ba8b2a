//! Every connection held by this process, joined or not.
//!
//! The liveness monitor walks this set rather than the channel registry, so
//! connections that never send a join are still pinged and evicted.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{ConnectionHandle, ConnectionId};

/// Set of live local connections keyed by id.
#[derive(Debug, Default)]
pub struct ConnectionTracker {
    connections: RwLock<HashMap<ConnectionId, ConnectionHandle>>,
}

impl ConnectionTracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking a connection.
    pub async fn insert(&self, handle: ConnectionHandle) {
        self.connections.write().await.insert(handle.id(), handle);
    }

    /// Stops tracking a connection. Returns `false` if it was not tracked.
    pub async fn remove(&self, connection_id: ConnectionId) -> bool {
        self.connections.write().await.remove(&connection_id).is_some()
    }

    /// Returns a point-in-time copy of all tracked handles.
    pub async fn snapshot(&self) -> Vec<ConnectionHandle> {
        self.connections.read().await.values().cloned().collect()
    }

    /// Returns the number of tracked connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Returns `true` if no connection is tracked.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}
