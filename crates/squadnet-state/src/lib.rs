//! Squadnet State
//!
//! Durable session snapshots: message history plus per-agent memory,
//! keyed by session id in a key/value store. Restoration rebuilds the
//! traffic log with identical ordering and each agent's scratchpad;
//! tool-server sessions are never part of a snapshot.

pub mod error;
pub mod manager;
pub mod memory;
pub mod snapshot;
pub mod sqlite;
pub mod store;

pub use error::{Result, StateError};
pub use manager::{ExportFormat, SnapshotManager};
pub use memory::InMemorySnapshotStore;
pub use snapshot::{AgentSnapshot, SessionSnapshot, SnapshotSummary};
pub use sqlite::SqliteSnapshotStore;
pub use store::SnapshotStore;
