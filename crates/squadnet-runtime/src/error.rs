//! Error types for agent turns

use squadnet_llm::LLMError;

/// Result type for agent runtime operations
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Errors that abort an agent's turn
///
/// Tool failures never appear here: they flow back to the model as
/// error tool results and the turn continues.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// The tool-use loop exceeded its iteration bound
    #[error("Tool-use loop exceeded {0} iterations")]
    ToolLoopOverflow(usize),

    /// The LLM call failed (timeout, rate limit after retries, error)
    #[error("Agent response failed: {0}")]
    Response(#[from] LLMError),

    /// The turn was cancelled
    #[error("Turn cancelled")]
    Cancelled,
}

impl RuntimeError {
    /// Failure class reported to the channel, never the full error
    pub fn failure_class(&self) -> &'static str {
        match self {
            Self::ToolLoopOverflow(_) => "tool-use limit exceeded",
            Self::Response(_) => "response generation failed",
            Self::Cancelled => "turn cancelled",
        }
    }
}
