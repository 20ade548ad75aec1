//! Tracks live consumer connections during broadcast.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// One registered consumer. The socket itself is owned by the connection
/// task; the registry only holds the send queue feeding it, so a connection
/// is either fully usable or absent.
pub(crate) struct ConnectionHandle {
    /// Peer address, best-effort, for logging.
    pub addr: SocketAddr,
    /// Bounded queue of encoded frames awaiting write.
    pub tx: mpsc::Sender<Bytes>,
    /// The task owning the socket; aborting it closes the socket.
    pub task: JoinHandle<()>,
}

/// Concurrency-safe set of live connections. The accept loop inserts,
/// the publish path and each connection task remove; removal is idempotent
/// and the socket is closed exactly once by its owning task.
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<HashMap<u64, ConnectionHandle>>>,
    next_id: Arc<AtomicU64>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a connection id. Ids are never reused.
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub(crate) async fn insert(&self, id: u64, handle: ConnectionHandle) {
        self.inner.lock().await.insert(id, handle);
    }

    /// Remove a connection. Returns `None` if another path already removed it.
    pub(crate) async fn remove(&self, id: u64) -> Option<ConnectionHandle> {
        self.inner.lock().await.remove(&id)
    }

    /// Snapshot of the current send queues; broadcast iterates this copy so
    /// insertion and removal can proceed concurrently.
    pub(crate) async fn snapshot(&self) -> Vec<(u64, mpsc::Sender<Bytes>)> {
        self.inner
            .lock()
            .await
            .iter()
            .map(|(id, h)| (*id, h.tx.clone()))
            .collect()
    }

    /// Drain every connection, for shutdown.
    pub(crate) async fn clear(&self) -> Vec<ConnectionHandle> {
        self.inner.lock().await.drain().map(|(_, h)| h).collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }
}
