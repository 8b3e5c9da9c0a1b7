//! Error types for orchestration

use squadnet_core::CoreError;
use squadnet_state::StateError;

/// Result type for orchestration operations
pub type Result<T> = std::result::Result<T, CoordinationError>;

/// Errors raised by the orchestrator
#[derive(Debug, thiserror::Error)]
pub enum CoordinationError {
    /// Invalid roster or missing start-up requirements
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Snapshot persistence failure
    #[error(transparent)]
    State(#[from] StateError),

    /// The roster is at its configured capacity
    #[error("Roster is full ({max} agents)")]
    RosterFull { max: usize },

    /// An agent with this id is already registered
    #[error("Agent already registered: {0}")]
    DuplicateAgent(String),
}
