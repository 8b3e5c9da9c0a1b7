//! Error types for snapshot persistence

/// Result type for snapshot operations
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors raised by the snapshot store
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Session id unknown
    #[error("Session not found: {0}")]
    NotFound(String),

    /// Persistence failure
    #[error("Snapshot storage error: {0}")]
    Storage(String),

    /// Snapshot payload could not be (de)serialized
    #[error("Snapshot serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StateError {
    /// Create a storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Create a not-found error
    pub fn not_found<S: Into<String>>(session_id: S) -> Self {
        Self::NotFound(session_id.into())
    }
}
