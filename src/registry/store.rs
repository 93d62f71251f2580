//! Client registry implementation
//!
//! Three independent maps, one per transport, from client identity to
//! delivery handle. Locks are held only for membership changes and for
//! copying a snapshot; delivery always happens on the copy.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::task::AbortHandle;

use crate::message::TransportKind;

use super::entry::{ClientCounts, ClientEntry};
use super::handle::{ClientHandle, ClientId};

type ClientMap = RwLock<HashMap<ClientId, ClientEntry>>;

/// Central registry for all connected clients
///
/// Thread-safe without external locking. Each transport has its own lock, so
/// long-poll churn never contends with stream or socket registration.
pub struct ClientRegistry {
    sse: ClientMap,
    ws: ClientMap,
    lp: ClientMap,

    next_client_id: AtomicU64,
}

impl ClientRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sse: RwLock::new(HashMap::new()),
            ws: RwLock::new(HashMap::new()),
            lp: RwLock::new(HashMap::new()),
            next_client_id: AtomicU64::new(1),
        }
    }

    fn clients(&self, kind: TransportKind) -> &ClientMap {
        match kind {
            TransportKind::Sse => &self.sse,
            TransportKind::Ws => &self.ws,
            TransportKind::Lp => &self.lp,
        }
    }

    /// Allocate a fresh client identity
    pub fn next_id(&self) -> ClientId {
        ClientId(self.next_client_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Register a handle under a fresh identity
    pub fn register(&self, handle: ClientHandle) -> ClientId {
        let id = self.next_id();
        self.insert(id, handle);
        id
    }

    /// Register a handle and return a guard that unregisters it on drop
    pub fn register_guarded(self: &Arc<Self>, handle: ClientHandle) -> ClientGuard {
        let kind = handle.kind();
        let id = self.register(handle);
        ClientGuard {
            registry: Arc::clone(self),
            kind,
            id,
        }
    }

    /// Insert a handle under a known identity
    ///
    /// Returns `false` and leaves the existing entry untouched if the
    /// identity is already registered.
    pub fn insert(&self, id: ClientId, handle: ClientHandle) -> bool {
        let kind = handle.kind();
        let mut clients = self.clients(kind).write();

        if clients.contains_key(&id) {
            return false;
        }
        clients.insert(id, ClientEntry::new(handle));

        tracing::debug!(
            kind = %kind,
            client_id = %id,
            clients = clients.len(),
            "Client registered"
        );
        true
    }

    /// Remove a client and cancel its timer
    ///
    /// Returns whether the client was registered.
    pub fn unregister(&self, kind: TransportKind, id: ClientId) -> bool {
        let removed = self.clients(kind).write().remove(&id);

        match removed {
            Some(mut entry) => {
                entry.cancel_timer();
                tracing::debug!(kind = %kind, client_id = %id, "Client unregistered");
                true
            }
            None => false,
        }
    }

    /// Remove a client and hand back its handle, leaving any timer running
    ///
    /// Used by a timer task retiring its own client.
    pub fn take(&self, kind: TransportKind, id: ClientId) -> Option<ClientHandle> {
        self.clients(kind)
            .write()
            .remove(&id)
            .map(|entry| entry.handle)
    }

    /// Remove and return every client of a transport
    pub fn drain(&self, kind: TransportKind) -> Vec<(ClientId, ClientHandle)> {
        let drained: Vec<_> = self.clients(kind).write().drain().collect();

        drained
            .into_iter()
            .map(|(id, mut entry)| {
                entry.cancel_timer();
                (id, entry.handle)
            })
            .collect()
    }

    /// Copy the current clients of a transport
    ///
    /// The lock is released before this returns, so delivering to the copy
    /// never blocks registration or removal.
    pub fn snapshot(&self, kind: TransportKind) -> Vec<(ClientId, ClientHandle)> {
        self.clients(kind)
            .read()
            .iter()
            .map(|(id, entry)| (*id, entry.handle.clone()))
            .collect()
    }

    /// Look up one client's handle
    pub fn get(&self, kind: TransportKind, id: ClientId) -> Option<ClientHandle> {
        self.clients(kind)
            .read()
            .get(&id)
            .map(|entry| entry.handle.clone())
    }

    /// Check if a client is registered
    pub fn contains(&self, kind: TransportKind, id: ClientId) -> bool {
        self.clients(kind).read().contains_key(&id)
    }

    /// Attach a per-client timer
    ///
    /// If the client is already gone the timer is aborted immediately and
    /// `false` is returned.
    pub fn attach_timer(&self, kind: TransportKind, id: ClientId, timer: AbortHandle) -> bool {
        let mut clients = self.clients(kind).write();

        match clients.get_mut(&id) {
            Some(entry) => {
                entry.cancel_timer();
                entry.timer = Some(timer);
                true
            }
            None => {
                timer.abort();
                false
            }
        }
    }

    /// Whether a client has a per-client timer attached
    pub fn has_timer(&self, kind: TransportKind, id: ClientId) -> bool {
        self.clients(kind)
            .read()
            .get(&id)
            .map_or(false, ClientEntry::has_timer)
    }

    /// Number of clients of one transport
    pub fn len(&self, kind: TransportKind) -> usize {
        self.clients(kind).read().len()
    }

    /// Whether no clients of any transport are registered
    pub fn is_empty(&self) -> bool {
        self.counts().total() == 0
    }

    /// Client counts for every transport
    pub fn counts(&self) -> ClientCounts {
        ClientCounts {
            sse: self.len(TransportKind::Sse),
            ws: self.len(TransportKind::Ws),
            lp: self.len(TransportKind::Lp),
        }
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registration that ends when dropped
///
/// Connection tasks hold one for their lifetime; dropping it when the
/// connection closes is what removes the client from the registry.
pub struct ClientGuard {
    registry: Arc<ClientRegistry>,
    kind: TransportKind,
    id: ClientId,
}

impl ClientGuard {
    /// Identity of the guarded client
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Transport of the guarded client
    pub fn kind(&self) -> TransportKind {
        self.kind
    }
}

impl std::fmt::Debug for ClientGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientGuard")
            .field("kind", &self.kind)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for ClientGuard {
    fn drop(&mut self) {
        self.registry.unregister(self.kind, self.id);
    }
}
