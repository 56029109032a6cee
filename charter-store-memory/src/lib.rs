//! In-memory [`PersistenceAdapter`] implementation: a [`Snapshot`] per
//! session id, held behind a [`tokio::sync::RwLock`].
//!
//! Suitable for tests and short-lived local processes. No eviction, no
//! durability across process restarts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use charter_protocol::{PersistError, PersistenceAdapter, SessionSummary, Snapshot};
use tokio::sync::RwLock;

/// An in-memory [`PersistenceAdapter`] backed by a concurrent hash map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    snapshots: Arc<RwLock<HashMap<String, Snapshot>>>,
}

impl MemoryStore {
    /// Create a new, empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PersistenceAdapter for MemoryStore {
    async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistError> {
        let mut map = self.snapshots.write().await;
        map.insert(snapshot.session_id.clone(), snapshot.clone());
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<Snapshot, PersistError> {
        let map = self.snapshots.read().await;
        map.get(session_id)
            .cloned()
            .ok_or_else(|| PersistError::NotFound(session_id.to_string()))
    }

    async fn list(&self) -> Result<Vec<SessionSummary>, PersistError> {
        let map = self.snapshots.read().await;
        Ok(map
            .values()
            .map(|snapshot| SessionSummary {
                session_id: snapshot.session_id.clone(),
                charter_name: snapshot.charter_name.clone(),
                created_at: snapshot.created_at,
                updated_at: snapshot.updated_at,
            })
            .collect())
    }

    async fn delete(&self, session_id: &str) -> Result<(), PersistError> {
        let mut map = self.snapshots.write().await;
        map.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn snapshot(session_id: &str) -> Snapshot {
        let now: DateTime<Utc> = DateTime::from_timestamp(0, 0).unwrap();
        Snapshot {
            session_id: session_id.to_string(),
            charter_name: "test-charter".to_string(),
            data: serde_json::json!({ "ok": true }),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = MemoryStore::new();
        store.save(&snapshot("s-1")).await.unwrap();
        let loaded = store.load("s-1").await.unwrap();
        assert_eq!(loaded.charter_name, "test-charter");
    }

    #[tokio::test]
    async fn load_missing_session_errors() {
        let store = MemoryStore::new();
        let err = store.load("nope").await.unwrap_err();
        assert!(matches!(err, PersistError::NotFound(_)));
    }

    #[tokio::test]
    async fn list_and_delete() {
        let store = MemoryStore::new();
        store.save(&snapshot("s-1")).await.unwrap();
        store.save(&snapshot("s-2")).await.unwrap();

        let summaries = store.list().await.unwrap();
        assert_eq!(summaries.len(), 2);

        store.delete("s-1").await.unwrap();
        let summaries = store.list().await.unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].session_id, "s-2");

        // Deleting again is a no-op, not an error.
        store.delete("s-1").await.unwrap();
    }
}
