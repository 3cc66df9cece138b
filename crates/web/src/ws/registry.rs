use std::sync::{Arc, Weak};

use dashmap::DashMap;

use super::{SocketId, WebSocket};

type Sockets = DashMap<SocketId, WebSocket>;

/// The open websockets of an application, keyed by id.
///
/// A socket is inserted once its handshake completes and removed when it starts closing.
/// Sockets only hold a weak handle back to the registry.
#[derive(Debug, Clone, Default)]
pub struct SocketRegistry {
    inner: Arc<Sockets>,
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &SocketId) -> Option<WebSocket> {
        self.inner.get(id).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, id: &SocketId) -> bool {
        self.inner.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// A snapshot of the registered sockets.
    pub fn sockets(&self) -> Vec<WebSocket> {
        self.inner.iter().map(|entry| entry.value().clone()).collect()
    }

    pub(crate) fn insert(&self, socket: WebSocket) {
        self.inner.insert(socket.id(), socket);
    }

    pub(crate) fn downgrade(&self) -> WeakRegistry {
        WeakRegistry { inner: Arc::downgrade(&self.inner) }
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct WeakRegistry {
    inner: Weak<Sockets>,
}

impl WeakRegistry {
    pub(crate) fn remove(&self, id: &SocketId) -> bool {
        self.inner.upgrade().is_some_and(|sockets| sockets.remove(id).is_some())
    }
}
