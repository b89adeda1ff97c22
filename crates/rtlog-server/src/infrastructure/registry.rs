//! The single authoritative set of live connections.
//!
//! Every accepted transport gets exactly one entry, keyed by its
//! [`ConnectionId`].  The entry's [`Role`] says whether it receives
//! broadcasts; there is no second "websocket set" to keep in sync.
//!
//! # Locking
//!
//! A `std::sync::Mutex` guards the map.  Critical sections are a handful of
//! map operations and never span an `.await`, so a blocking mutex is both
//! correct and cheaper than an async one here.  It also lets the host call
//! `stop()` from synchronous code.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::task::AbortHandle;
use tracing::debug;

use crate::domain::connection::{ConnectionId, Role};
use crate::infrastructure::outbound::OutboundSender;

/// Registry bookkeeping for one connection.
#[derive(Debug)]
struct Entry {
    peer: String,
    role: Role,
    /// Handle used to force-close the connection's task.
    task: Option<AbortHandle>,
    /// Present once the connection is upgraded.
    outbound: Option<OutboundSender>,
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<ConnectionId, Entry>,
    /// Set by [`ConnectionRegistry::shutdown_all`]; no new entries after that.
    closed: bool,
}

/// Shared, thread-safe connection registry.  One per running server.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    inner: Mutex<Inner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock cannot leave the map half-updated
        // (every operation is a single insert/remove), so poisoning is ignored.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Tracks a newly accepted connection as [`Role::Plain`].
    ///
    /// Returns `false` if the registry has already been shut down; the caller
    /// must then drop the transport.
    pub fn register(&self, id: ConnectionId, peer: impl Into<String>) -> bool {
        let mut inner = self.lock();
        if inner.closed {
            return false;
        }
        inner.entries.insert(
            id,
            Entry {
                peer: peer.into(),
                role: Role::Plain,
                task: None,
                outbound: None,
            },
        );
        true
    }

    /// Stores the abort handle of the task driving `id`.
    ///
    /// If the connection is already gone the handle is simply dropped; if the
    /// registry was shut down in the meantime the task is aborted right away.
    pub fn attach_task(&self, id: ConnectionId, handle: AbortHandle) {
        let mut inner = self.lock();
        if inner.closed {
            handle.abort();
            return;
        }
        if let Some(entry) = inner.entries.get_mut(&id) {
            entry.task = Some(handle);
        }
    }

    /// Switches `id` to [`Role::WebSocket`] so it receives broadcasts.
    ///
    /// Returns `false` when `id` is no longer tracked (the server is
    /// stopping), in which case the connection should close.
    pub fn promote(&self, id: ConnectionId, outbound: OutboundSender) -> bool {
        let mut inner = self.lock();
        match inner.entries.get_mut(&id) {
            Some(entry) => {
                entry.role = Role::WebSocket;
                entry.outbound = Some(outbound);
                true
            }
            None => false,
        }
    }

    /// Stops tracking `id`.  Returns its role if it was tracked.
    ///
    /// Called by a connection's own task as its last step, so the task is
    /// not aborted here.
    pub fn remove(&self, id: ConnectionId) -> Option<Role> {
        self.lock().entries.remove(&id).map(|entry| entry.role)
    }

    /// Stops broadcasting to `id` and tells its task to close as a slow
    /// consumer.
    ///
    /// The entry stays until the connection's own task removes it on the way
    /// out, so the transport is shut down normally.
    pub fn evict(&self, id: ConnectionId) {
        let mut inner = self.lock();
        let Some(entry) = inner.entries.get_mut(&id) else {
            return;
        };
        if let Some(outbound) = entry.outbound.take() {
            outbound.evict();
            debug!("websocket {id} ({}): evicted", entry.peer);
        }
    }

    /// Current role of `id`, if tracked.
    pub fn role(&self, id: ConnectionId) -> Option<Role> {
        self.lock().entries.get(&id).map(|entry| entry.role)
    }

    /// Snapshot of the outbound queues of every upgraded connection.
    ///
    /// The lock is released before the caller starts pushing frames.
    pub fn websocket_queues(&self) -> Vec<(ConnectionId, OutboundSender)> {
        self.lock()
            .entries
            .iter()
            .filter(|(_, entry)| entry.role == Role::WebSocket)
            .filter_map(|(id, entry)| entry.outbound.clone().map(|tx| (*id, tx)))
            .collect()
    }

    /// Number of tracked connections, plain and upgraded.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of upgraded connections still receiving broadcasts.
    pub fn websocket_count(&self) -> usize {
        self.lock()
            .entries
            .values()
            .filter(|entry| entry.role == Role::WebSocket && entry.outbound.is_some())
            .count()
    }

    /// Force-closes every tracked connection, clears the map and refuses
    /// further registrations.  Returns how many connections were closed.
    ///
    /// Idempotent: a second call finds nothing to close.
    pub fn shutdown_all(&self) -> usize {
        let drained: Vec<(ConnectionId, Entry)> = {
            let mut inner = self.lock();
            inner.closed = true;
            inner.entries.drain().collect()
        };
        for (_, entry) in &drained {
            if let Some(task) = &entry.task {
                task.abort();
            }
        }
        drained.len()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
