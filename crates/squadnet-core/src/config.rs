//! Validated configuration structs consumed by the engine
//!
//! Front-ends own file loading and schema validation; the engine only
//! accepts these already-validated parameter structs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{CoreError, Result};

/// Tuning knobs for the orchestration engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationConfig {
    /// Maximum messages retained in the shared channel
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// Messages visible to an agent when generating a response
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Maximum agents that may speak in one broadcast turn
    #[serde(default = "default_max_responses")]
    pub max_responses: usize,

    /// Maximum agents on the net
    #[serde(default = "default_max_agents")]
    pub max_agents: usize,

    /// Tool-use loop iteration bound per agent turn
    #[serde(default = "default_max_tool_iterations")]
    pub max_tool_iterations: usize,

    /// Per-request LLM timeout in seconds
    #[serde(default = "default_llm_timeout_secs")]
    pub llm_timeout_secs: u64,

    /// Per-call tool timeout in seconds
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Retry tuning for tool calls
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Circuit breaker tuning, one breaker per tool server
    #[serde(default)]
    pub breaker: BreakerPolicy,
}

impl OrchestrationConfig {
    /// Per-request LLM timeout
    pub fn llm_timeout(&self) -> Duration {
        Duration::from_secs(self.llm_timeout_secs)
    }

    /// Per-call tool timeout
    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

/// Exponential backoff parameters for the retry engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    #[serde(default = "default_retry_attempts")]
    pub max_attempts: usize,

    /// Delay before the first retry, in milliseconds
    #[serde(default = "default_retry_initial_ms")]
    pub initial_delay_ms: u64,

    /// Ceiling on any single delay, in milliseconds
    #[serde(default = "default_retry_max_ms")]
    pub max_delay_ms: u64,

    /// Exponential base
    #[serde(default = "default_retry_base")]
    pub base: f64,

    /// Multiply each delay by a uniform factor in [0.5, 1.5]
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl RetryPolicy {
    /// Delay before the first retry
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Ceiling on any single delay
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_retry_attempts(),
            initial_delay_ms: default_retry_initial_ms(),
            max_delay_ms: default_retry_max_ms(),
            base: default_retry_base(),
            jitter: true,
        }
    }
}

/// Circuit breaker thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerPolicy {
    /// Consecutive failures before the circuit opens
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: usize,

    /// Consecutive half-open successes before the circuit closes
    #[serde(default = "default_success_threshold")]
    pub success_threshold: usize,

    /// Seconds the circuit stays open before a recovery probe
    #[serde(default = "default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,
}

impl BreakerPolicy {
    /// Open-state hold time before a recovery probe is allowed
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            success_threshold: default_success_threshold(),
            recovery_timeout_secs: default_recovery_timeout_secs(),
        }
    }
}

/// Launch descriptor for one tool server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolServerSpec {
    /// Unique server name used for provenance and breaker identity
    pub name: String,

    /// Command to launch the server process
    pub command: String,

    /// Arguments for the command
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables injected into the server process
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Role of an agent on the net
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Domain specialist; speaks when its criteria fire
    Specialist,
    /// Coordinates the net and backstops unanswered traffic
    SquadLeader,
}

/// Declarative speaking-criteria specification for an agent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CriteriaSpec {
    /// Speak when the latest message is addressed to this callsign
    DirectAddress,
    /// Speak when the latest message contains any of these keywords
    Keywords { keywords: Vec<String> },
    /// Speak when the latest message is a question
    Question,
    /// Squad-leader coordination triggers
    SquadLeader {
        #[serde(default)]
        coordination_keywords: Vec<String>,
    },
}

/// Validated roster entry for one agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentProfile {
    /// Unique agent identifier
    pub agent_id: String,

    /// Radio callsign used for addressing
    pub callsign: String,

    /// Role on the net
    #[serde(default = "default_role")]
    pub role: AgentRole,

    /// Model identifier passed to the provider
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Response token budget
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Role description prepended to the layered system prompt
    pub system_prompt: String,

    /// Speaking criteria, OR-composed
    #[serde(default)]
    pub criteria: Vec<CriteriaSpec>,
}

impl AgentProfile {
    /// Validate invariants the engine relies on
    pub fn validate(&self) -> Result<()> {
        if self.agent_id.trim().is_empty() {
            return Err(CoreError::config("agent_id must not be empty"));
        }
        if self.callsign.trim().is_empty() {
            return Err(CoreError::config(format!(
                "agent '{}' has an empty callsign",
                self.agent_id
            )));
        }
        if self.system_prompt.trim().is_empty() {
            return Err(CoreError::config(format!(
                "agent '{}' has an empty system prompt",
                self.agent_id
            )));
        }
        Ok(())
    }
}

// Default value functions
fn default_max_history() -> usize {
    1000
}

fn default_context_window() -> usize {
    20
}

fn default_max_responses() -> usize {
    3
}

fn default_max_agents() -> usize {
    6
}

fn default_max_tool_iterations() -> usize {
    5
}

fn default_llm_timeout_secs() -> u64 {
    120
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_retry_attempts() -> usize {
    3
}

fn default_retry_initial_ms() -> u64 {
    1_000
}

fn default_retry_max_ms() -> u64 {
    10_000
}

fn default_retry_base() -> f64 {
    2.0
}

fn default_failure_threshold() -> usize {
    5
}

fn default_success_threshold() -> usize {
    2
}

fn default_recovery_timeout_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

fn default_role() -> AgentRole {
    AgentRole::Specialist
}

fn default_model() -> String {
    "claude-sonnet-4-5".to_string()
}

fn default_temperature() -> f64 {
    1.0
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for OrchestrationConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            context_window: default_context_window(),
            max_responses: default_max_responses(),
            max_agents: default_max_agents(),
            max_tool_iterations: default_max_tool_iterations(),
            llm_timeout_secs: default_llm_timeout_secs(),
            tool_timeout_secs: default_tool_timeout_secs(),
            retry: RetryPolicy::default(),
            breaker: BreakerPolicy::default(),
        }
    }
}
