//! Snapshot storage trait definition

use async_trait::async_trait;

use crate::snapshot::{SessionSnapshot, SnapshotSummary};
use crate::Result;

/// Trait for snapshot storage backends
///
/// One row per session id with last-writer-wins upsert semantics; no
/// cross-row transactions are required.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Upsert the snapshot under its session id
    ///
    /// An existing row keeps its original `created_at`.
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<()>;

    /// Load the full snapshot for a session
    async fn load(&self, session_id: &str) -> Result<SessionSnapshot>;

    /// List stored sessions, newest first
    async fn list(&self, limit: usize, offset: usize) -> Result<Vec<SnapshotSummary>>;

    /// Delete a session; `NotFound` when the id is unknown
    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Name of this store (for logs)
    fn name(&self) -> &str;
}
