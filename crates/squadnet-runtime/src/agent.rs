//! Agent implementation
//!
//! One `NetAgent` per roster entry. A turn assembles the context
//! window and layered prompt, then drives the bounded tool-use loop:
//! the model may keep requesting tool calls, each guarded by the
//! retry engine and the server's breaker, until it produces text or
//! exhausts the iteration budget. Tool failures are data to the model;
//! LLM failures abort the turn.

use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use squadnet_channel::TrafficLog;
use squadnet_core::{AgentProfile, AgentRole, OrchestrationConfig};
use squadnet_llm::{ChatMessage, ChatProvider, ChatRequest, Completion, ContentBlock, LLMError, StopReason, ToolDefinition};
use squadnet_memory::{self as memory, Scratchpad};
use squadnet_resilience::{RetryEngine, RetryError};
use squadnet_telemetry::{NetEvent, Outcome, TelemetryCollector};
use squadnet_tools::{ToolClientPool, ToolDescriptor};

use crate::criteria::SpeakingCriteria;
use crate::error::{Result, RuntimeError};
use crate::prompt;

/// How many recent messages the speaking criteria examine
const CRITERIA_LOOKBACK: usize = 10;

/// An agent on the net
pub struct NetAgent {
    profile: AgentProfile,
    criteria: SpeakingCriteria,
    provider: Arc<dyn ChatProvider>,
    tools: Option<Arc<ToolClientPool>>,
    retry: RetryEngine,
    memory: Mutex<Scratchpad>,
    collector: Option<TelemetryCollector>,
    context_window: usize,
    max_tool_iterations: usize,
    llm_timeout: Duration,
    tool_timeout: Duration,
}

impl std::fmt::Debug for NetAgent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetAgent")
            .field("profile", &self.profile)
            .field("context_window", &self.context_window)
            .field("max_tool_iterations", &self.max_tool_iterations)
            .field("llm_timeout", &self.llm_timeout)
            .field("tool_timeout", &self.tool_timeout)
            .finish()
    }
}

impl NetAgent {
    /// Create an agent from its validated profile
    pub fn new(
        profile: AgentProfile,
        provider: Arc<dyn ChatProvider>,
        config: &OrchestrationConfig,
    ) -> Self {
        let criteria = SpeakingCriteria::from_specs(&profile.criteria, profile.role);
        Self {
            criteria,
            provider,
            tools: None,
            retry: RetryEngine::new(config.retry.clone()),
            memory: Mutex::new(Scratchpad::new()),
            collector: None,
            context_window: config.context_window,
            max_tool_iterations: config.max_tool_iterations,
            llm_timeout: config.llm_timeout(),
            tool_timeout: config.tool_timeout(),
            profile,
        }
    }

    /// Give the agent access to the tool federation
    pub fn with_tools(mut self, pool: Arc<ToolClientPool>) -> Self {
        self.tools = Some(pool);
        self
    }

    /// Attach a telemetry collector
    pub fn with_events(mut self, collector: TelemetryCollector) -> Self {
        self.retry = self.retry.with_events(collector.clone());
        self.collector = Some(collector);
        self
    }

    pub fn agent_id(&self) -> &str {
        &self.profile.agent_id
    }

    pub fn callsign(&self) -> &str {
        &self.profile.callsign
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn is_squad_leader(&self) -> bool {
        self.profile.role == AgentRole::SquadLeader
    }

    /// Copy of the current scratchpad
    pub fn memory_snapshot(&self) -> Scratchpad {
        self.memory.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the scratchpad (snapshot restoration)
    pub fn restore_memory(&self, scratchpad: Scratchpad) {
        *self.memory.lock().unwrap_or_else(|e| e.into_inner()) = scratchpad;
    }

    /// Apply one structured memory update
    pub fn update_memory(
        &self,
        category: memory::MemoryCategory,
        payload: &str,
    ) -> memory::Result<()> {
        self.memory
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .update(category, payload)?;
        if let Some(collector) = &self.collector {
            collector.emit(NetEvent::memory_updated(
                &self.profile.agent_id,
                category.as_str(),
            ));
        }
        Ok(())
    }

    /// Should this agent respond to the latest traffic?
    pub fn should_respond(&self, log: &TrafficLog) -> bool {
        let recent = log.recent(CRITERIA_LOOKBACK);
        self.criteria
            .evaluate(&self.profile.agent_id, &self.profile.callsign, &recent)
    }

    /// Run one turn against the channel
    ///
    /// Returns the agent's utterance, or `None` when the agent
    /// declines (empty model output). Tool failures are folded into
    /// the transcript; only LLM failures, loop overflow, and
    /// cancellation surface as errors.
    pub async fn take_turn(
        &self,
        log: &TrafficLog,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let agent_id = self.profile.agent_id.clone();
        let started = Instant::now();
        if let Some(collector) = &self.collector {
            collector.emit(NetEvent::turn_started(&agent_id));
        }

        let result = self.run_turn(log, cancel).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        let outcome = match &result {
            Ok(_) => Outcome::Ok,
            Err(RuntimeError::Cancelled) => Outcome::Cancelled,
            Err(_) => Outcome::Error,
        };
        if let Some(collector) = &self.collector {
            collector.emit(NetEvent::turn_completed(&agent_id, outcome, duration_ms));
        }
        tracing::info!(%agent_id, duration_ms, outcome = ?outcome, "turn finished");

        result
    }

    async fn run_turn(
        &self,
        log: &TrafficLog,
        cancel: &CancellationToken,
    ) -> Result<Option<String>> {
        let window = log.context_window(&self.profile.callsign, self.context_window);

        let catalog: Vec<ToolDescriptor> = self
            .tools
            .as_ref()
            .map(|pool| pool.registry().list_all())
            .unwrap_or_default();
        let tool_definitions: Vec<ToolDefinition> = catalog
            .iter()
            .map(|descriptor| ToolDefinition {
                name: descriptor.name.clone(),
                description: descriptor.description.clone(),
                input_schema: descriptor.input_schema.clone(),
            })
            .collect();

        let system = {
            let memory = self.memory.lock().unwrap_or_else(|e| e.into_inner());
            prompt::build_system_prompt(&self.profile, &memory, &catalog)
        };

        let mut messages =
            prompt::build_transcript(&self.profile.agent_id, &self.profile.callsign, &window);

        let mut reply = self
            .generate(&system, messages.clone(), tool_definitions.clone(), cancel)
            .await?;

        let mut iterations = 0;
        while reply.stop_reason == StopReason::ToolUse {
            iterations += 1;
            if iterations > self.max_tool_iterations {
                tracing::error!(
                    agent_id = %self.profile.agent_id,
                    limit = self.max_tool_iterations,
                    "tool-use loop exceeded iteration bound"
                );
                return Err(RuntimeError::ToolLoopOverflow(self.max_tool_iterations));
            }

            let tool_uses: Vec<(String, String, Value)> = reply
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            // results keep the order of the tool_use blocks
            let mut results = Vec::with_capacity(tool_uses.len());
            for (id, name, input) in tool_uses {
                if cancel.is_cancelled() {
                    return Err(RuntimeError::Cancelled);
                }
                let (content, is_error) = self.execute_tool(&name, input, cancel).await?;
                results.push(ContentBlock::tool_result(id, content, is_error));
            }

            messages.push(ChatMessage::assistant_blocks(reply.content.clone()));
            messages.push(ChatMessage::tool_results(results));

            reply = self
                .generate(&system, messages.clone(), tool_definitions.clone(), cancel)
                .await?;
        }

        let text = reply.text().trim().to_string();

        let report = {
            let mut memory = self.memory.lock().unwrap_or_else(|e| e.into_inner());
            memory::apply_response(&mut memory, &text)
        };
        if report.applied > 0 {
            tracing::info!(
                agent_id = %self.profile.agent_id,
                applied = report.applied,
                rejected = report.rejected,
                "memory commands applied"
            );
        }
        if let Some(collector) = &self.collector {
            for category in &report.categories {
                collector.emit(NetEvent::memory_updated(
                    &self.profile.agent_id,
                    category.as_str(),
                ));
            }
        }

        if text.is_empty() {
            Ok(None)
        } else {
            Ok(Some(text))
        }
    }

    /// One LLM request under timeout and cancellation
    async fn generate(
        &self,
        system: &str,
        messages: Vec<ChatMessage>,
        tools: Vec<ToolDefinition>,
        cancel: &CancellationToken,
    ) -> Result<Completion> {
        if cancel.is_cancelled() {
            return Err(RuntimeError::Cancelled);
        }

        let request = ChatRequest {
            system: system.to_string(),
            messages,
            tools,
            model: self.profile.model.clone(),
            temperature: self.profile.temperature,
            max_tokens: self.profile.max_tokens,
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RuntimeError::Cancelled),
            result = tokio::time::timeout(self.llm_timeout, self.provider.generate(request)) => {
                match result {
                    Ok(Ok(completion)) => Ok(completion),
                    Ok(Err(err)) => Err(RuntimeError::Response(err)),
                    Err(_) => Err(RuntimeError::Response(LLMError::Timeout)),
                }
            }
        }
    }

    /// Execute one tool call through retries; failures become error
    /// tool results instead of aborting the turn
    async fn execute_tool(
        &self,
        tool_name: &str,
        arguments: Value,
        cancel: &CancellationToken,
    ) -> Result<(String, bool)> {
        let Some(pool) = &self.tools else {
            return Ok((
                format!("tool error (tool_not_found): no tool servers connected for '{tool_name}'"),
                true,
            ));
        };

        let operation = format!("tool:{tool_name}");
        let result = self
            .retry
            .run(&operation, cancel, || {
                pool.call_tool(
                    &self.profile.agent_id,
                    tool_name,
                    arguments.clone(),
                    self.tool_timeout,
                )
            })
            .await;

        match result {
            Ok(output) => Ok((output, false)),
            Err(RetryError::Cancelled) => Err(RuntimeError::Cancelled),
            Err(RetryError::Operation(err)) => {
                tracing::warn!(
                    agent_id = %self.profile.agent_id,
                    tool_name,
                    kind = err.kind(),
                    error = %err,
                    "tool call failed, surfacing as error result"
                );
                Ok((format!("tool error ({}): {err}", err.kind()), true))
            }
        }
    }
}
