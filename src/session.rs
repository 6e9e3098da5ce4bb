//! Session storage
//!
//! The store is the single owner of all live conversations. Callers work on
//! cloned snapshots and commit with a version check, so a session evicted or
//! changed while a turn was suspended is detected instead of resurrected.

mod reaper;

pub use reaper::ExpiryReaper;

use crate::dialog::ConversationState;
use crate::error::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// A conversation snapshot plus the version it was read at.
///
/// Versions are unique per store and only grow, so a session that was
/// deleted and recreated never matches a version read before the deletion.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEntry {
    pub state: ConversationState,
    pub version: u64,
}

/// Keyed storage for conversations
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Called once before the server accepts requests
    async fn init(&self) {}

    /// Called once on shutdown
    async fn shutdown(&self) {}

    /// Return the existing session or atomically insert a fresh one
    async fn get_or_create(&self, id: &str) -> SessionEntry;

    /// Look up a session without creating it
    async fn get(&self, id: &str) -> Option<SessionEntry>;

    /// Commit a state read at `expected_version`, returning the new version
    async fn save(&self, state: ConversationState, expected_version: u64)
        -> Result<u64, StoreError>;

    /// Remove a session; returns whether it existed
    async fn delete(&self, id: &str) -> bool;

    /// Remove a session only if nobody committed to it since `version`
    async fn delete_if_version(&self, id: &str, version: u64) -> bool;

    /// Point-in-time snapshot of every session
    async fn each(&self) -> Vec<SessionEntry>;

    /// Number of live sessions
    async fn len(&self) -> usize;
}

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn init(&self) {
        (**self).init().await;
    }

    async fn shutdown(&self) {
        (**self).shutdown().await;
    }

    async fn get_or_create(&self, id: &str) -> SessionEntry {
        (**self).get_or_create(id).await
    }

    async fn get(&self, id: &str) -> Option<SessionEntry> {
        (**self).get(id).await
    }

    async fn save(
        &self,
        state: ConversationState,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        (**self).save(state, expected_version).await
    }

    async fn delete(&self, id: &str) -> bool {
        (**self).delete(id).await
    }

    async fn delete_if_version(&self, id: &str, version: u64) -> bool {
        (**self).delete_if_version(id, version).await
    }

    async fn each(&self) -> Vec<SessionEntry> {
        (**self).each().await
    }

    async fn len(&self) -> usize {
        (**self).len().await
    }
}

// ============================================================================
// In-memory store
// ============================================================================

/// Process-local store backed by a `HashMap`
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, SessionEntry>>,
    last_version: AtomicU64,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&self) -> u64 {
        self.last_version.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn init(&self) {
        tracing::info!("In-memory session store ready");
    }

    async fn shutdown(&self) {
        let mut sessions = self.sessions.write().await;
        tracing::info!(dropped = sessions.len(), "Session store shutting down");
        sessions.clear();
    }

    async fn get_or_create(&self, id: &str) -> SessionEntry {
        if let Some(entry) = self.sessions.read().await.get(id) {
            return entry.clone();
        }

        // Re-check under the write lock; another task may have inserted meanwhile
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session_id = %id, "Creating session");
                SessionEntry {
                    state: ConversationState::new(id),
                    version: self.next_version(),
                }
            })
            .clone()
    }

    async fn get(&self, id: &str) -> Option<SessionEntry> {
        self.sessions.read().await.get(id).cloned()
    }

    async fn save(
        &self,
        state: ConversationState,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut sessions = self.sessions.write().await;
        let id = state.session_id.clone();

        match sessions.get(&id).map(|entry| entry.version) {
            None => return Err(StoreError::Evicted(id)),
            Some(found) if found != expected_version => {
                return Err(StoreError::VersionConflict {
                    id,
                    expected: expected_version,
                    found,
                });
            }
            Some(_) => {}
        }

        let version = self.next_version();
        sessions.insert(id, SessionEntry { state, version });
        Ok(version)
    }

    async fn delete(&self, id: &str) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    async fn delete_if_version(&self, id: &str, version: u64) -> bool {
        let mut sessions = self.sessions.write().await;
        match sessions.get(id) {
            Some(entry) if entry.version == version => {
                sessions.remove(id);
                true
            }
            _ => false,
        }
    }

    async fn each(&self) -> Vec<SessionEntry> {
        self.sessions.read().await.values().cloned().collect()
    }

    async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
