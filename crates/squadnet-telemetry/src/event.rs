//! Telemetry event types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of an observed operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Error,
    Timeout,
    Cancelled,
}

/// Events emitted by the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum NetEvent {
    /// An agent joined the net and is ready to take turns
    AgentInitialized {
        agent_id: String,
        callsign: String,
        timestamp: DateTime<Utc>,
    },

    /// An agent turn started
    TurnStarted {
        agent_id: String,
        timestamp: DateTime<Utc>,
    },

    /// An agent turn finished
    TurnCompleted {
        agent_id: String,
        outcome: Outcome,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A tool call was dispatched to a server
    ToolCallStarted {
        agent_id: String,
        tool_name: String,
        server_name: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool call returned or failed
    ToolCallCompleted {
        agent_id: String,
        tool_name: String,
        server_name: String,
        outcome: Outcome,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A circuit breaker changed state
    BreakerStateChanged {
        server_name: String,
        from: String,
        to: String,
        timestamp: DateTime<Utc>,
    },

    /// The retry engine scheduled another attempt
    RetryAttempted {
        operation: String,
        attempt: usize,
        delay_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A tool server connected and its tools were discovered
    ServerConnected {
        server_name: String,
        tool_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// An agent scratchpad was updated
    MemoryUpdated {
        agent_id: String,
        category: String,
        timestamp: DateTime<Utc>,
    },

    /// A session snapshot was written
    SessionSaved {
        session_id: String,
        message_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A session snapshot was restored
    SessionLoaded {
        session_id: String,
        message_count: usize,
        timestamp: DateTime<Utc>,
    },
}

impl NetEvent {
    pub fn agent_initialized(agent_id: impl Into<String>, callsign: impl Into<String>) -> Self {
        Self::AgentInitialized {
            agent_id: agent_id.into(),
            callsign: callsign.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn turn_started(agent_id: impl Into<String>) -> Self {
        Self::TurnStarted {
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn turn_completed(agent_id: impl Into<String>, outcome: Outcome, duration_ms: u64) -> Self {
        Self::TurnCompleted {
            agent_id: agent_id.into(),
            outcome,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn tool_call_started(
        agent_id: impl Into<String>,
        tool_name: impl Into<String>,
        server_name: impl Into<String>,
    ) -> Self {
        Self::ToolCallStarted {
            agent_id: agent_id.into(),
            tool_name: tool_name.into(),
            server_name: server_name.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn tool_call_completed(
        agent_id: impl Into<String>,
        tool_name: impl Into<String>,
        server_name: impl Into<String>,
        outcome: Outcome,
        duration_ms: u64,
    ) -> Self {
        Self::ToolCallCompleted {
            agent_id: agent_id.into(),
            tool_name: tool_name.into(),
            server_name: server_name.into(),
            outcome,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn breaker_state_changed(
        server_name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        Self::BreakerStateChanged {
            server_name: server_name.into(),
            from: from.into(),
            to: to.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn retry_attempted(operation: impl Into<String>, attempt: usize, delay_ms: u64) -> Self {
        Self::RetryAttempted {
            operation: operation.into(),
            attempt,
            delay_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn server_connected(server_name: impl Into<String>, tool_count: usize) -> Self {
        Self::ServerConnected {
            server_name: server_name.into(),
            tool_count,
            timestamp: Utc::now(),
        }
    }

    pub fn memory_updated(agent_id: impl Into<String>, category: impl Into<String>) -> Self {
        Self::MemoryUpdated {
            agent_id: agent_id.into(),
            category: category.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn session_saved(session_id: impl Into<String>, message_count: usize) -> Self {
        Self::SessionSaved {
            session_id: session_id.into(),
            message_count,
            timestamp: Utc::now(),
        }
    }

    pub fn session_loaded(session_id: impl Into<String>, message_count: usize) -> Self {
        Self::SessionLoaded {
            session_id: session_id.into(),
            message_count,
            timestamp: Utc::now(),
        }
    }

    /// Dotted event-class name used in structured logs
    pub fn class(&self) -> &'static str {
        match self {
            Self::AgentInitialized { .. } => "agent.initialized",
            Self::TurnStarted { .. } => "agent.turn.start",
            Self::TurnCompleted { .. } => "agent.turn.end",
            Self::ToolCallStarted { .. } => "tool.call.start",
            Self::ToolCallCompleted { .. } => "tool.call.end",
            Self::BreakerStateChanged { .. } => "breaker.state_change",
            Self::RetryAttempted { .. } => "retry.attempt",
            Self::ServerConnected { .. } => "mcp.connect",
            Self::MemoryUpdated { .. } => "memory.update",
            Self::SessionSaved { .. } => "session.save",
            Self::SessionLoaded { .. } => "session.load",
        }
    }

    /// Timestamp of this event
    pub fn timestamp(&self) -> &DateTime<Utc> {
        match self {
            Self::AgentInitialized { timestamp, .. } => timestamp,
            Self::TurnStarted { timestamp, .. } => timestamp,
            Self::TurnCompleted { timestamp, .. } => timestamp,
            Self::ToolCallStarted { timestamp, .. } => timestamp,
            Self::ToolCallCompleted { timestamp, .. } => timestamp,
            Self::BreakerStateChanged { timestamp, .. } => timestamp,
            Self::RetryAttempted { timestamp, .. } => timestamp,
            Self::ServerConnected { timestamp, .. } => timestamp,
            Self::MemoryUpdated { timestamp, .. } => timestamp,
            Self::SessionSaved { timestamp, .. } => timestamp,
            Self::SessionLoaded { timestamp, .. } => timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_classes() {
        let event = NetEvent::tool_call_started("a1", "search_airports", "aero");
        assert_eq!(event.class(), "tool.call.start");

        let event = NetEvent::breaker_state_changed("aero", "closed", "open");
        assert_eq!(event.class(), "breaker.state_change");
    }

    #[test]
    fn test_event_serialization() {
        let event = NetEvent::turn_completed("a1", Outcome::Ok, 42);
        let json = serde_json::to_string(&event).unwrap();
        let back: NetEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back.class(), "agent.turn.end");
    }
}
