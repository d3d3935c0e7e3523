use std::collections::HashMap;

use chrono::{DateTime, Utc};
use courier_core::{ConnId, RelayError};
use parking_lot::Mutex;

/// What the registry knows about one live connection. Transport resources
/// (socket, outbound queue) stay in the hub; this is bookkeeping only.
#[derive(Clone, Debug)]
pub struct ConnectionRecord {
    pub conn_id: ConnId,
    pub remote_addr: String,
    pub connected_at: DateTime<Utc>,
    pub username: Option<String>,
}

#[derive(Default)]
struct RegistryInner {
    connections: HashMap<ConnId, ConnectionRecord>,
    identities: HashMap<String, ConnId>,
}

/// The authoritative connection ↔ identity bijection.
///
/// Invariants:
/// - each identity maps to at most one connection id and vice versa;
/// - an identity entry exists iff some connection record holds that binding.
///
/// Every compound operation (bind's check-then-insert, unregister's
/// read-then-delete, snapshot's copy) runs under one lock, so no caller can
/// observe a half-updated bijection and no two concurrent binds for the same
/// name can both succeed. Nothing here does I/O while holding the lock.
#[derive(Default)]
pub struct SessionRegistry {
    inner: Mutex<RegistryInner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an unbound connection record. Registering the same id twice is
    /// a programming error in the transport wiring, not a runtime condition.
    pub fn register(&self, conn_id: &ConnId, remote_addr: &str) {
        let mut inner = self.inner.lock();
        debug_assert!(
            !inner.connections.contains_key(conn_id),
            "connection registered twice: {conn_id}"
        );
        inner.connections.insert(
            conn_id.clone(),
            ConnectionRecord {
                conn_id: conn_id.clone(),
                remote_addr: remote_addr.to_owned(),
                connected_at: Utc::now(),
                username: None,
            },
        );
    }

    /// Atomically claim `username` for `conn_id`. The uniqueness check and
    /// both map inserts happen in a single critical section.
    pub fn bind(&self, conn_id: &ConnId, username: &str) -> Result<(), RelayError> {
        if username.trim().is_empty() {
            return Err(RelayError::InvalidIdentity);
        }

        let inner = &mut *self.inner.lock();
        let record = inner
            .connections
            .get_mut(conn_id)
            .ok_or(RelayError::Internal)?;
        if record.username.is_some() {
            return Err(RelayError::AlreadyIdentified);
        }
        if inner.identities.contains_key(username) {
            return Err(RelayError::DuplicateIdentity);
        }
        record.username = Some(username.to_owned());
        inner.identities.insert(username.to_owned(), conn_id.clone());
        Ok(())
    }

    /// Remove the connection and release its identity, if any. Returns the
    /// removed record (its `username` field carries the released name).
    /// Idempotent: a second call for the same id returns None.
    pub fn unregister(&self, conn_id: &ConnId) -> Option<ConnectionRecord> {
        let mut inner = self.inner.lock();
        let record = inner.connections.remove(conn_id)?;
        if let Some(username) = &record.username {
            inner.identities.remove(username);
        }
        Some(record)
    }

    /// Resolve an identity to its live connection.
    pub fn resolve(&self, username: &str) -> Option<ConnId> {
        self.inner.lock().identities.get(username).cloned()
    }

    /// Reverse lookup: the identity bound to a connection, if any.
    pub fn identity_of(&self, conn_id: &ConnId) -> Option<String> {
        self.inner
            .lock()
            .connections
            .get(conn_id)
            .and_then(|r| r.username.clone())
    }

    /// Point-in-time copy of all bound identities, sorted. Never exposes the
    /// live maps.
    pub fn snapshot(&self) -> Vec<String> {
        let mut users: Vec<String> = self.inner.lock().identities.keys().cloned().collect();
        users.sort();
        users
    }

    pub fn connection_count(&self) -> usize {
        self.inner.lock().connections.len()
    }

    pub fn identified_count(&self) -> usize {
        self.inner.lock().identities.len()
    }
}
