//! SQLite-backed snapshot store

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

use crate::snapshot::{SessionSnapshot, SnapshotSummary};
use crate::store::SnapshotStore;
use crate::{Result, StateError};

/// Durable snapshot store in a single SQLite file
///
/// The schema is created at open; WAL mode keeps concurrent readers
/// off the writer's back. Concurrent writers to the same session are
/// serialized by the database with last-writer-wins.
#[derive(Clone)]
pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    /// Open (or create) the store at `db_path`
    pub async fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StateError::storage(format!(
                        "failed to create snapshot directory {}: {e}",
                        parent.display()
                    ))
                })?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", db_path.display()))
            .map_err(|e| StateError::storage(format!("invalid database path: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| StateError::storage(format!("failed to open database: {e}")))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                message_count INTEGER NOT NULL,
                agent_count INTEGER NOT NULL,
                payload TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| StateError::storage(format!("failed to create schema: {e}")))?;

        sqlx::query("PRAGMA journal_mode = WAL")
            .execute(&pool)
            .await
            .map_err(|e| StateError::storage(format!("failed to set WAL mode: {e}")))?;

        tracing::info!(path = %db_path.display(), "snapshot database ready");

        Ok(Self { pool })
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .map_err(|e| StateError::storage(format!("bad timestamp in store: {e}")))
    }
}

#[async_trait]
impl SnapshotStore for SqliteSnapshotStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()> {
        let payload = serde_json::to_string(snapshot)?;

        sqlx::query(
            "INSERT INTO sessions
                (session_id, created_at, updated_at, message_count, agent_count, payload)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(session_id) DO UPDATE SET
                updated_at = excluded.updated_at,
                message_count = excluded.message_count,
                agent_count = excluded.agent_count,
                payload = excluded.payload",
        )
        .bind(&snapshot.session_id)
        .bind(snapshot.created_at.to_rfc3339())
        .bind(snapshot.updated_at.to_rfc3339())
        .bind(snapshot.messages.len() as i64)
        .bind(snapshot.agents.len() as i64)
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|e| StateError::storage(format!("failed to save session: {e}")))?;

        tracing::debug!(session_id = %snapshot.session_id, "saved snapshot");
        Ok(())
    }

    async fn load(&self, session_id: &str) -> Result<SessionSnapshot> {
        let row = sqlx::query("SELECT created_at, updated_at, payload FROM sessions WHERE session_id = ?1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StateError::storage(format!("failed to load session: {e}")))?
            .ok_or_else(|| StateError::not_found(session_id))?;

        let payload: String = row.get("payload");
        let mut snapshot: SessionSnapshot = serde_json::from_str(&payload)?;

        // row timestamps are authoritative across upserts
        snapshot.created_at = Self::parse_timestamp(row.get::<&str, _>("created_at"))?;
        snapshot.updated_at = Self::parse_timestamp(row.get::<&str, _>("updated_at"))?;

        Ok(snapshot)
    }

    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<SnapshotSummary>> {
        let rows = sqlx::query(
            "SELECT session_id, created_at, updated_at, message_count, agent_count
             FROM sessions ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
        )
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StateError::storage(format!("failed to list sessions: {e}")))?;

        rows.into_iter()
            .map(|row| {
                Ok(SnapshotSummary {
                    session_id: row.get("session_id"),
                    created_at: Self::parse_timestamp(row.get::<&str, _>("created_at"))?,
                    updated_at: Self::parse_timestamp(row.get::<&str, _>("updated_at"))?,
                    message_count: row.get::<i64, _>("message_count") as usize,
                    agent_count: row.get::<i64, _>("agent_count") as usize,
                })
            })
            .collect()
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM sessions WHERE session_id = ?1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(|e| StateError::storage(format!("failed to delete session: {e}")))?;

        if result.rows_affected() == 0 {
            return Err(StateError::not_found(session_id));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use squadnet_channel::Message;

    async fn store() -> (SqliteSnapshotStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteSnapshotStore::new(dir.path().join("sessions.db"))
            .await
            .unwrap();
        (store, dir)
    }

    fn snapshot(session_id: &str, message_count: usize) -> SessionSnapshot {
        let messages = (0..message_count)
            .map(|i| Message::user("user", format!("message {i}")))
            .collect();
        SessionSnapshot::new(session_id, messages, vec![])
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let (store, _dir) = store().await;
        let original = snapshot("m1", 3);
        store.save(&original).await.unwrap();

        let loaded = store.load("m1").await.unwrap();
        assert_eq!(loaded.messages.len(), 3);
        // order and ids preserved
        for (a, b) in original.messages.iter().zip(loaded.messages.iter()) {
            assert_eq!(a.id, b.id);
            assert_eq!(a.content, b.content);
        }
    }

    #[tokio::test]
    async fn test_load_unknown_session() {
        let (store, _dir) = store().await;
        assert!(matches!(
            store.load("ghost").await,
            Err(StateError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_upsert_keeps_created_at() {
        let (store, _dir) = store().await;
        let first = snapshot("m1", 1);
        store.save(&first).await.unwrap();

        let mut second = snapshot("m1", 2);
        second.created_at = first.created_at + chrono::Duration::hours(2);
        second.updated_at = second.created_at;
        store.save(&second).await.unwrap();

        let loaded = store.load("m1").await.unwrap();
        assert_eq!(loaded.created_at.timestamp(), first.created_at.timestamp());
        assert_eq!(loaded.messages.len(), 2);
    }

    #[tokio::test]
    async fn test_list_newest_first_with_paging() {
        let (store, _dir) = store().await;
        for i in 0..3 {
            let mut snap = snapshot(&format!("m{i}"), i);
            snap.created_at = Utc::now() + chrono::Duration::seconds(i as i64);
            store.save(&snap).await.unwrap();
        }

        let listed = store.list(2, 0).await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].session_id, "m2");
        assert_eq!(listed[1].session_id, "m1");

        let paged = store.list(2, 2).await.unwrap();
        assert_eq!(paged.len(), 1);
        assert_eq!(paged[0].session_id, "m0");
    }

    #[tokio::test]
    async fn test_delete() {
        let (store, _dir) = store().await;
        store.save(&snapshot("m1", 1)).await.unwrap();

        store.delete("m1").await.unwrap();
        assert!(matches!(store.delete("m1").await, Err(StateError::NotFound(_))));
    }
}
