//! In-memory snapshot store

use async_trait::async_trait;
use dashmap::DashMap;

use crate::snapshot::{SessionSnapshot, SnapshotSummary};
use crate::store::SnapshotStore;
use crate::{Result, StateError};

/// Non-durable store used by tests and ephemeral missions
///
/// Sessions vanish when the process exits.
#[derive(Default)]
pub struct InMemorySnapshotStore {
    sessions: DashMap<String, SessionSnapshot>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[async_trait]
impl SnapshotStore for InMemorySnapshotStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let mut stored = snapshot.clone();
        if let Some(existing) = self.sessions.get(&snapshot.session_id) {
            stored.created_at = existing.created_at;
        }
        self.sessions.insert(stored.session_id.clone(), stored);
        tracing::debug!(session_id = %snapshot.session_id, "saved snapshot to memory store");
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<SessionSnapshot> {
        self.sessions
            .get(session_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| StateError::not_found(session_id))
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<SnapshotSummary>> {
        let mut summaries: Vec<SnapshotSummary> = self
            .sessions
            .iter()
            .map(|entry| {
                let snapshot = entry.value();
                SnapshotSummary {
                    session_id: snapshot.session_id.clone(),
                    created_at: snapshot.created_at,
                    updated_at: snapshot.updated_at,
                    message_count: snapshot.messages.len(),
                    agent_count: snapshot.agents.len(),
                }
            })
            .collect();

        summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(summaries.into_iter().skip(offset).take(limit).collect())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        self.sessions
            .remove(session_id)
            .ok_or_else(|| StateError::not_found(session_id))?;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use squadnet_channel::Message;

    fn snapshot(session_id: &str) -> SessionSnapshot {
        SessionSnapshot::new(
            session_id,
            vec![Message::user("user", "radio check")],
            vec![],
        )
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let store = InMemorySnapshotStore::new();
        store.save(&snapshot("m1")).await.unwrap();

        let loaded = store.load("m1").await.unwrap();
        assert_eq!(loaded.session_id, "m1");
        assert_eq!(loaded.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_load_missing() {
        let store = InMemorySnapshotStore::new();
        assert!(matches!(
            store.load("nope").await,
            Err(StateError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_upsert_preserves_created_at() {
        let store = InMemorySnapshotStore::new();
        let first = snapshot("m1");
        store.save(&first).await.unwrap();

        let mut second = snapshot("m1");
        second.created_at = first.created_at + chrono::Duration::hours(1);
        store.save(&second).await.unwrap();

        let loaded = store.load("m1").await.unwrap();
        assert_eq!(loaded.created_at, first.created_at);
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let store = InMemorySnapshotStore::new();
        store.save(&snapshot("m1")).await.unwrap();
        store.save(&snapshot("m2")).await.unwrap();

        let listed = store.list(10, 0).await.unwrap();
        assert_eq!(listed.len(), 2);

        store.delete("m1").await.unwrap();
        assert!(matches!(store.delete("m1").await, Err(StateError::NotFound(_))));
        assert_eq!(store.len(), 1);
    }
}
