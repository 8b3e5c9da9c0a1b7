//! Anthropic (Claude) provider implementation

use async_trait::async_trait;
use backoff::{future::retry, ExponentialBackoff};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{
    error::{LLMError, Result},
    provider::ChatProvider,
    types::{ChatMessage, ChatRequest, Completion, ContentBlock, StopReason},
};

const ANTHROPIC_API_BASE: &str = "https://api.anthropic.com/v1";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Environment variable holding the API credential
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

/// Anthropic (Claude) API provider
pub struct AnthropicProvider {
    client: Client,
    api_key: String,
    timeout: Duration,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(LLMError::config_error("Anthropic API key cannot be empty"));
        }

        Ok(Self {
            client: Client::new(),
            api_key,
            timeout: Duration::from_secs(120),
        })
    }

    /// Create a provider from `ANTHROPIC_API_KEY`
    ///
    /// Fails fast when the credential is absent so misconfiguration is
    /// caught at start-up rather than on the first turn.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .map_err(|_| LLMError::config_error(format!("{API_KEY_ENV} is not set")))?;
        Self::new(api_key)
    }

    /// Set request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Make a retryable API request
    async fn make_request(&self, request_body: &AnthropicRequest<'_>) -> Result<AnthropicResponse> {
        let operation = || async {
            let response = self
                .client
                .post(format!("{ANTHROPIC_API_BASE}/messages"))
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("Content-Type", "application/json")
                .timeout(self.timeout)
                .json(request_body)
                .send()
                .await
                .map_err(|e| {
                    if e.is_timeout() {
                        backoff::Error::Permanent(LLMError::Timeout)
                    } else {
                        backoff::Error::Transient {
                            err: LLMError::HttpError(e),
                            retry_after: None,
                        }
                    }
                })?;

            let status = response.status();

            // Rate limiting is retryable, honoring retry-after
            if status == StatusCode::TOO_MANY_REQUESTS {
                let retry_after_secs: Option<u64> = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok());

                return Err(backoff::Error::Transient {
                    err: LLMError::RateLimited(retry_after_secs),
                    retry_after: retry_after_secs.map(Duration::from_secs),
                });
            }

            // Server errors are retryable
            if status.is_server_error() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(backoff::Error::Transient {
                    err: LLMError::api_error(format!("Server error: {error_text}")),
                    retry_after: None,
                });
            }

            // Client errors are not
            if status.is_client_error() {
                let error_text = response.text().await.unwrap_or_default();
                return Err(backoff::Error::Permanent(LLMError::api_error(format!(
                    "Client error ({status}): {error_text}"
                ))));
            }

            response
                .json::<AnthropicResponse>()
                .await
                .map_err(|e| backoff::Error::Permanent(LLMError::parse_error(e.to_string())))
        };

        let backoff_config = ExponentialBackoff {
            max_elapsed_time: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        retry(backoff_config, operation).await
    }
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    async fn generate(&self, request: ChatRequest) -> Result<Completion> {
        let tools: Vec<serde_json::Value> = request
            .tools
            .iter()
            .map(|tool| {
                serde_json::json!({
                    "name": tool.name,
                    "description": tool.description,
                    "input_schema": tool.input_schema,
                })
            })
            .collect();

        let body = AnthropicRequest {
            model: &request.model,
            system: &request.system,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            tools: if tools.is_empty() { None } else { Some(tools) },
        };

        let response = self.make_request(&body).await?;

        if response.content.is_empty() {
            return Err(LLMError::parse_error("No content in response"));
        }

        Ok(Completion {
            stop_reason: match response.stop_reason.as_deref() {
                Some("end_turn") | None => StopReason::EndTurn,
                Some("tool_use") => StopReason::ToolUse,
                Some("max_tokens") => StopReason::MaxTokens,
                Some(other) => StopReason::Other(other.to_string()),
            },
            content: response.content,
            model: response.model,
        })
    }

    fn name(&self) -> &str {
        "anthropic"
    }
}

#[derive(Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: &'a [ChatMessage],
    max_tokens: u32,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    model: String,
    stop_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_api_key_rejected() {
        let result = AnthropicProvider::new("");
        assert!(matches!(result, Err(LLMError::ConfigError(_))));
    }

    #[test]
    fn test_provider_name() {
        let provider = AnthropicProvider::new("test-key").unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn test_request_serialization_skips_empty_tools() {
        let body = AnthropicRequest {
            model: "claude-sonnet-4-5",
            system: "You are ALPHA-ONE.",
            messages: &[ChatMessage::user("status, over")],
            max_tokens: 256,
            temperature: 1.0,
            tools: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("tools").is_none());
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
    }

    #[test]
    fn test_response_block_parsing() {
        let raw = serde_json::json!({
            "model": "claude-sonnet-4-5",
            "stop_reason": "tool_use",
            "content": [
                {"type": "text", "text": "Checking airports."},
                {"type": "tool_use", "id": "tu_1", "name": "search_airports",
                 "input": {"query": "San Francisco"}}
            ]
        });
        let response: AnthropicResponse = serde_json::from_value(raw).unwrap();
        assert_eq!(response.content.len(), 2);
        assert!(matches!(response.content[1], ContentBlock::ToolUse { .. }));
    }
}
