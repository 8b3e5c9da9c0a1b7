//! Session snapshot model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use squadnet_channel::Message;
use squadnet_memory::Scratchpad;

/// Persisted view of one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: String,
    pub callsign: String,
    pub role: String,
    pub model: String,
    pub memory: Scratchpad,
}

/// Full durable record of a session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Message log contents, in log order
    pub messages: Vec<Message>,
    pub agents: Vec<AgentSnapshot>,
}

impl SessionSnapshot {
    pub fn new(
        session_id: impl Into<String>,
        messages: Vec<Message>,
        agents: Vec<AgentSnapshot>,
    ) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            created_at: now,
            updated_at: now,
            messages,
            agents,
        }
    }
}

/// Listing entry without the full payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
    pub agent_count: usize,
}
