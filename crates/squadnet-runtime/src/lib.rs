//! Squadnet Runtime
//!
//! The per-agent engine: decides whether an agent speaks, assembles its
//! layered prompt and transcript, drives the bounded tool-use loop
//! against the LLM and the tool federation, and extracts in-band memory
//! commands from the final utterance.

pub mod agent;
pub mod criteria;
pub mod error;
pub mod prompt;

pub use agent::NetAgent;
pub use criteria::SpeakingCriteria;
pub use error::{Result, RuntimeError};
