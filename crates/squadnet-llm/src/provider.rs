//! Chat provider trait definition

use async_trait::async_trait;

use crate::{ChatRequest, Completion, Result};

/// Trait for chat-model providers
///
/// Implementations translate the engine's content-block request into a
/// vendor API call and back. The orchestration layer injects mocks in
/// tests through this seam.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Generate one completion for the request
    ///
    /// Returns the stop reason and ordered content blocks; a stop
    /// reason of `ToolUse` means the caller must execute the tool-use
    /// blocks and continue the transcript with their results.
    async fn generate(&self, request: ChatRequest) -> Result<Completion>;

    /// Provider name (for routing and logs)
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChatMessage, ContentBlock, StopReason};

    struct MockProvider;

    #[async_trait]
    impl ChatProvider for MockProvider {
        async fn generate(&self, request: ChatRequest) -> Result<Completion> {
            Ok(Completion {
                stop_reason: StopReason::EndTurn,
                content: vec![ContentBlock::text(format!(
                    "echo: {}",
                    request.messages.last().map(|m| m.text()).unwrap_or_default()
                ))],
                model: request.model,
            })
        }

        fn name(&self) -> &str {
            "mock"
        }
    }

    #[tokio::test]
    async fn test_mock_provider() {
        let provider = MockProvider;
        let request = ChatRequest {
            system: "test".to_string(),
            messages: vec![ChatMessage::user("hello")],
            tools: vec![],
            model: "mock-model".to_string(),
            temperature: 1.0,
            max_tokens: 64,
        };

        let completion = provider.generate(request).await.unwrap();
        assert_eq!(completion.stop_reason, StopReason::EndTurn);
        assert_eq!(completion.text(), "echo: hello");
    }
}
