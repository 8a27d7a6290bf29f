use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

pub mod events;
pub mod message_types;

/// Unique identifier for a live connection.
///
/// Each WebSocket session gets a fresh id when its handle is created. Teardown
/// passes the id back so a superseded connection cannot evict its successor's
/// registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Push to a registered handle failed: the receiving side is gone.
#[derive(Debug, Error)]
#[error("connection handle closed")]
pub struct TransportError;

/// Writable end of a live connection. Frames sent here are forwarded into the
/// owning WebSocket session's outbound stream.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sender: UnboundedSender<String>,
}

impl ConnectionHandle {
    pub fn new() -> (Self, UnboundedReceiver<String>) {
        let (tx, rx) = unbounded_channel();
        (
            Self {
                id: ConnectionId::new(),
                sender: tx,
            },
            rx,
        )
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn send(&self, frame: String) -> Result<(), TransportError> {
        self.sender.send(frame).map_err(|_| TransportError)
    }
}

/// Process-wide mapping from user id to active connection handle.
///
/// Single source of truth for "is user X currently reachable". Exactly one
/// entry per connected user; a second connection for the same user overwrites
/// the first (last connection wins). Entries are never persisted.
///
/// The lock guards O(1) map operations only; nothing awaits while holding it,
/// so register/unregister/lookup are callable from any connection task.
#[derive(Default, Clone)]
pub struct PresenceRegistry {
    inner: Arc<RwLock<HashMap<Uuid, ConnectionHandle>>>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent upsert; any prior entry for the user is replaced.
    pub fn register(&self, user_id: Uuid, handle: ConnectionHandle) {
        let mut guard = self.inner.write().expect("presence registry poisoned");
        guard.insert(user_id, handle);
        tracing::debug!(%user_id, online = guard.len(), "presence registered");
    }

    /// Remove the user's entry, but only if it still belongs to the given
    /// connection. Returns whether an entry was removed. A stale teardown
    /// (the user reconnected and the entry was overwritten) is a no-op.
    pub fn unregister(&self, user_id: Uuid, connection_id: ConnectionId) -> bool {
        let mut guard = self.inner.write().expect("presence registry poisoned");
        let owned = guard
            .get(&user_id)
            .map(|h| h.id() == connection_id)
            .unwrap_or(false);
        if owned {
            guard.remove(&user_id);
            tracing::debug!(%user_id, online = guard.len(), "presence unregistered");
        }
        owned
    }

    pub fn lookup(&self, user_id: Uuid) -> Option<ConnectionHandle> {
        self.inner
            .read()
            .expect("presence registry poisoned")
            .get(&user_id)
            .cloned()
    }

    pub fn is_online(&self, user_id: Uuid) -> bool {
        self.inner
            .read()
            .expect("presence registry poisoned")
            .contains_key(&user_id)
    }

    /// Snapshot of all current entries, for fan-out. Decoupled from the map
    /// itself: senders are cheap clones, no lock is held while pushing.
    pub fn entries(&self) -> Vec<(Uuid, ConnectionHandle)> {
        self.inner
            .read()
            .expect("presence registry poisoned")
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect()
    }

    pub fn online_count(&self) -> usize {
        self.inner.read().expect("presence registry poisoned").len()
    }
}
