//! Squadnet Coordination
//!
//! The orchestrator: owns the shared channel and the agent roster,
//! routes each user message to responders under the voice-net
//! addressing rules, dispatches their turns in parallel with a
//! response cap, and integrates session snapshots and shutdown.

pub mod error;
pub mod orchestrator;

pub use error::{CoordinationError, Result};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
