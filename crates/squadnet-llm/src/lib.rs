//! Squadnet LLM
//!
//! Provider abstraction for chat models with tool use. A request
//! carries a system prompt, a transcript of content-block messages, and
//! an optional tool catalog; the completion reports a stop reason and
//! an ordered list of text / tool-use blocks.

pub mod anthropic;
pub mod error;
pub mod provider;
pub mod types;

pub use anthropic::AnthropicProvider;
pub use error::{LLMError, Result};
pub use provider::ChatProvider;
pub use types::{
    ChatMessage, ChatRequest, Completion, ContentBlock, Role, StopReason, ToolDefinition,
};
