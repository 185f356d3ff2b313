//! Live session table.
//!
//! Injected through [`crate::AppState`] rather than held in a global.
//! Entries are added when a WebSocket session opens and removed when its
//! [`SessionGuard`] drops.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use scanlens_core::SessionId;

/// Bookkeeping for one open session.
#[derive(Clone, Debug)]
pub struct SessionInfo {
    /// When the upgrade completed.
    pub opened_at: Instant,
}

impl SessionInfo {
    /// Time since the session opened.
    pub fn age(&self) -> Duration {
        self.opened_at.elapsed()
    }
}

/// Concurrent map of open sessions.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionInfo>,
}

impl SessionRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `id` as open. The entry lives until the guard drops.
    pub fn register(self: &Arc<Self>, id: SessionId) -> SessionGuard {
        let _ = self.sessions.insert(
            id.clone(),
            SessionInfo {
                opened_at: Instant::now(),
            },
        );
        SessionGuard {
            registry: Arc::clone(self),
            id,
        }
    }

    /// Number of open sessions.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether no session is open.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Whether `id` is open.
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Info for `id`, if open.
    pub fn get(&self, id: &SessionId) -> Option<SessionInfo> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Snapshot of open session IDs.
    pub fn ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| entry.key().clone()).collect()
    }

    fn remove(&self, id: &SessionId) {
        let _ = self.sessions.remove(id);
    }
}

/// Removes its session from the registry on drop.
#[derive(Debug)]
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    id: SessionId,
}

impl SessionGuard {
    /// The guarded session.
    pub fn id(&self) -> &SessionId {
        &self.id
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.id);
    }
}
