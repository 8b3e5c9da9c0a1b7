//! Error types for tool operations

use squadnet_resilience::{BreakerRejection, RetryableError};

/// Result type for tool operations
pub type Result<T> = std::result::Result<T, ToolError>;

/// Errors that can occur resolving, connecting to, or calling tools
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Tool name did not resolve in the registry
    #[error("Tool not found: {tool}")]
    NotFound { tool: String },

    /// The server's circuit breaker is open
    #[error("Circuit open for server '{server}', retry in {retry_after_secs:.0}s")]
    CircuitOpen {
        server: String,
        retry_after_secs: f64,
    },

    /// The per-call timeout elapsed
    #[error("Tool '{tool}' timed out after {timeout_secs}s on server '{server}'")]
    Timeout {
        tool: String,
        server: String,
        timeout_secs: u64,
    },

    /// Transport failure or structured server-side tool failure
    #[error("Tool '{tool}' failed on server '{server}': {message}")]
    Execution {
        tool: String,
        server: String,
        message: String,
    },

    /// Failed to spawn or connect to a server
    #[error("Failed to connect to server '{server}': {message}")]
    Connect { server: String, message: String },

    /// Tool discovery failed during connection
    #[error("Tool discovery failed on server '{server}': {message}")]
    Discovery { server: String, message: String },

    /// Malformed wire traffic from a server
    #[error("Protocol error from server '{server}': {message}")]
    Protocol { server: String, message: String },
}

impl ToolError {
    pub fn execution(
        tool: impl Into<String>,
        server: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Execution {
            tool: tool.into(),
            server: server.into(),
            message: message.into(),
        }
    }

    pub fn connect(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connect {
            server: server.into(),
            message: message.into(),
        }
    }

    pub fn protocol(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            server: server.into(),
            message: message.into(),
        }
    }

    /// Short classification label surfaced in tool results
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "tool_not_found",
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Timeout { .. } => "tool_timeout",
            Self::Execution { .. } => "tool_execution_error",
            Self::Connect { .. } | Self::Discovery { .. } | Self::Protocol { .. } => "unexpected",
        }
    }
}

impl RetryableError for ToolError {
    /// Timeouts and execution failures are worth retrying; an unknown
    /// tool or an open circuit will not get better by asking again
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout { .. } | Self::Execution { .. })
    }
}

impl From<BreakerRejection> for ToolError {
    fn from(rejection: BreakerRejection) -> Self {
        Self::CircuitOpen {
            server: rejection.name,
            retry_after_secs: rejection.retry_after.as_secs_f64(),
        }
    }
}
