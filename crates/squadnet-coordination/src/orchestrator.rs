//! Turn scheduler for the shared voice net
//!
//! Routing: a directed message goes to the unique agent whose callsign
//! matches (falling back to the squad leader when the recipient is
//! unknown); broadcast and undirected traffic fans out to every agent
//! whose speaking criteria fire, capped at the configured response
//! limit in priority order (squad leader first, then registration
//! order). Responders run as parallel tasks; responses append to the
//! log in completion order but are returned in priority order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use squadnet_channel::{protocol, Message, MessageKind, TrafficLog};
use squadnet_core::{AgentProfile, CoreError, OrchestrationConfig, ToolServerSpec};
use squadnet_llm::ChatProvider;
use squadnet_resilience::BreakerStats;
use squadnet_runtime::NetAgent;
use squadnet_state::{
    AgentSnapshot, ExportFormat, SnapshotManager, SnapshotStore, SnapshotSummary, StateError,
};
use squadnet_telemetry::{NetEvent, TelemetryCollector};
use squadnet_tools::ToolClientPool;

use crate::error::{CoordinationError, Result};

/// Builder for the orchestrator
pub struct OrchestratorBuilder {
    config: OrchestrationConfig,
    provider: Option<Arc<dyn ChatProvider>>,
    snapshot_store: Option<Arc<dyn SnapshotStore>>,
    collector: Option<TelemetryCollector>,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            config: OrchestrationConfig::default(),
            provider: None,
            snapshot_store: None,
            collector: None,
        }
    }

    /// Set engine tuning parameters
    pub fn config(mut self, config: OrchestrationConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the LLM provider shared by all agents (required)
    pub fn provider(mut self, provider: Arc<dyn ChatProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Enable session persistence
    pub fn snapshot_store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.snapshot_store = Some(store);
        self
    }

    /// Use a specific telemetry collector
    pub fn telemetry(mut self, collector: TelemetryCollector) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Build the orchestrator, failing fast on missing requirements
    pub fn build(self) -> Result<Orchestrator> {
        let provider = self
            .provider
            .ok_or_else(|| CoreError::config("LLM provider not set"))?;
        let collector = self.collector.unwrap_or_default();

        let pool = Arc::new(
            ToolClientPool::new(self.config.breaker.clone()).with_events(collector.clone()),
        );
        let snapshots = self
            .snapshot_store
            .map(|store| SnapshotManager::new(store).with_events(collector.clone()));

        Ok(Orchestrator {
            channel: Arc::new(TrafficLog::new(self.config.max_history)),
            agents: Mutex::new(Vec::new()),
            provider,
            pool,
            snapshots,
            collector,
            cancel: CancellationToken::new(),
            config: self.config,
        })
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// The orchestration engine
pub struct Orchestrator {
    channel: Arc<TrafficLog>,
    agents: Mutex<Vec<Arc<NetAgent>>>,
    provider: Arc<dyn ChatProvider>,
    pool: Arc<ToolClientPool>,
    snapshots: Option<SnapshotManager>,
    collector: TelemetryCollector,
    cancel: CancellationToken,
    config: OrchestrationConfig,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::new()
    }

    /// The shared channel
    pub fn channel(&self) -> Arc<TrafficLog> {
        Arc::clone(&self.channel)
    }

    /// The telemetry collector used across the engine
    pub fn telemetry(&self) -> TelemetryCollector {
        self.collector.clone()
    }

    /// Register an agent from its validated profile
    ///
    /// Appends a join announcement to the channel.
    pub fn register_agent(&self, profile: AgentProfile) -> Result<Arc<NetAgent>> {
        profile.validate().map_err(CoordinationError::Core)?;

        let mut agents = self.agents.lock().unwrap_or_else(|e| e.into_inner());
        if agents.len() >= self.config.max_agents {
            return Err(CoordinationError::RosterFull {
                max: self.config.max_agents,
            });
        }
        if agents.iter().any(|a| a.agent_id() == profile.agent_id) {
            return Err(CoordinationError::DuplicateAgent(profile.agent_id));
        }

        let callsign = profile.callsign.clone();
        let agent_id = profile.agent_id.clone();
        let agent = Arc::new(
            NetAgent::new(profile, Arc::clone(&self.provider), &self.config)
                .with_tools(Arc::clone(&self.pool))
                .with_events(self.collector.clone()),
        );
        agents.push(Arc::clone(&agent));
        drop(agents);

        self.channel.append(Message::system(format!(
            "{callsign} has joined the net"
        )));
        self.collector
            .emit(NetEvent::agent_initialized(&agent_id, &callsign));
        tracing::info!(%agent_id, %callsign, "agent registered");

        Ok(agent)
    }

    /// Remove an agent; appends a leave announcement when found
    pub fn remove_agent(&self, agent_id: &str) -> bool {
        let mut agents = self.agents.lock().unwrap_or_else(|e| e.into_inner());
        let Some(idx) = agents.iter().position(|a| a.agent_id() == agent_id) else {
            return false;
        };
        let agent = agents.remove(idx);
        drop(agents);

        self.channel.append(Message::system(format!(
            "{} has left the net",
            agent.callsign()
        )));
        true
    }

    /// Look up an agent by id
    pub fn get_agent(&self, agent_id: &str) -> Option<Arc<NetAgent>> {
        self.agents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|a| a.agent_id() == agent_id)
            .cloned()
    }

    /// Look up an agent by normalized callsign
    pub fn find_agent_by_callsign(&self, callsign: &str) -> Option<Arc<NetAgent>> {
        self.agents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|a| protocol::callsigns_match(a.callsign(), callsign))
            .cloned()
    }

    /// The squad leader, when one is registered
    pub fn squad_leader(&self) -> Option<Arc<NetAgent>> {
        self.agents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|a| a.is_squad_leader())
            .cloned()
    }

    pub fn agent_count(&self) -> usize {
        self.agents.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Connect a tool server and install its tools
    pub async fn connect_tool_server(&self, spec: &ToolServerSpec) -> Result<usize> {
        self.pool
            .connect_server(spec)
            .await
            .map_err(|e| CoordinationError::Core(CoreError::other(e.to_string())))
    }

    /// The tool federation (for tests and diagnostics)
    pub fn tool_pool(&self) -> Arc<ToolClientPool> {
        Arc::clone(&self.pool)
    }

    /// Append a user message to the channel
    pub fn post_user_message(&self, user_id: &str, content: &str) -> Message {
        self.channel
            .post(user_id, Some("COMMAND"), content, MessageKind::User)
    }

    /// Post a user message and run the resulting turn
    pub async fn process_turn(&self, user_id: &str, content: &str) -> Result<Vec<Message>> {
        self.post_user_message(user_id, content);
        self.process_responses().await
    }

    /// Run responder selection and dispatch for the latest message
    ///
    /// Responses append to the channel as they complete, but the
    /// returned vector is ordered by responder priority.
    pub async fn process_responses(&self) -> Result<Vec<Message>> {
        let Some(latest) = self.channel.recent(1).into_iter().next() else {
            return Ok(Vec::new());
        };

        let (responders, broadcast_mode) = self.select_responders(&latest);
        if responders.is_empty() && !broadcast_mode {
            return Ok(Vec::new());
        }

        let mut ordered = self.dispatch(responders).await;

        // broadcast traffic that nobody answered falls to the leader
        if broadcast_mode && ordered.is_empty() {
            if let Some(leader) = self.squad_leader() {
                tracing::info!(
                    leader = leader.callsign(),
                    "no responder spoke, squad leader fallback"
                );
                if let Some(message) = self.run_agent_turn(&leader).await {
                    ordered.push(message);
                }
            }
        }

        Ok(ordered)
    }

    /// Pick responders for a message per the addressing rules
    ///
    /// Returns the responders in priority order plus whether the turn
    /// is in broadcast/undirected mode.
    fn select_responders(&self, latest: &Message) -> (Vec<Arc<NetAgent>>, bool) {
        let directed_recipient = latest
            .recipient_callsign
            .as_deref()
            .filter(|_| !latest.meta.is_broadcast);

        if let Some(recipient) = directed_recipient {
            // directed: the matching agent alone, else the squad
            // leader; nobody's criteria are consulted
            let responder = self
                .find_agent_by_callsign(recipient)
                .or_else(|| self.squad_leader());
            return (responder.into_iter().collect(), false);
        }

        let agents = self.agents.lock().unwrap_or_else(|e| e.into_inner());
        let mut candidates: Vec<Arc<NetAgent>> = Vec::with_capacity(agents.len());
        if let Some(leader) = agents.iter().find(|a| a.is_squad_leader()) {
            candidates.push(Arc::clone(leader));
        }
        for agent in agents.iter() {
            if !agent.is_squad_leader() {
                candidates.push(Arc::clone(agent));
            }
        }
        drop(agents);

        let responders: Vec<Arc<NetAgent>> = candidates
            .into_iter()
            .filter(|agent| agent.should_respond(&self.channel))
            .take(self.config.max_responses)
            .collect();

        (responders, true)
    }

    /// Run responders in parallel; append in completion order, return
    /// in priority order
    async fn dispatch(&self, responders: Vec<Arc<NetAgent>>) -> Vec<Message> {
        let mut tasks = JoinSet::new();

        for (priority, agent) in responders.into_iter().enumerate() {
            let channel = Arc::clone(&self.channel);
            let cancel = self.cancel.clone();
            tasks.spawn(async move {
                let result = agent.take_turn(&channel, &cancel).await;
                let message = match result {
                    Ok(Some(text)) => {
                        Some(channel.post(
                            agent.agent_id(),
                            Some(agent.callsign()),
                            &text,
                            MessageKind::Agent,
                        ))
                    }
                    Ok(None) => None,
                    Err(err) => {
                        tracing::error!(
                            agent_id = agent.agent_id(),
                            error = %err,
                            "agent turn failed"
                        );
                        channel.append(Message::system(format!(
                            "{} did not respond: {}",
                            agent.callsign(),
                            err.failure_class()
                        )));
                        None
                    }
                };
                (priority, message)
            });
        }

        let mut by_priority: Vec<(usize, Message)> = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((priority, Some(message))) => by_priority.push((priority, message)),
                Ok((_, None)) => {}
                Err(err) => tracing::error!(error = %err, "responder task panicked"),
            }
        }

        by_priority.sort_by_key(|(priority, _)| *priority);
        by_priority.into_iter().map(|(_, message)| message).collect()
    }

    /// One inline agent turn (used for the leader fallback)
    async fn run_agent_turn(&self, agent: &Arc<NetAgent>) -> Option<Message> {
        match agent.take_turn(&self.channel, &self.cancel).await {
            Ok(Some(text)) => Some(self.channel.post(
                agent.agent_id(),
                Some(agent.callsign()),
                &text,
                MessageKind::Agent,
            )),
            Ok(None) => None,
            Err(err) => {
                self.channel.append(Message::system(format!(
                    "{} did not respond: {}",
                    agent.callsign(),
                    err.failure_class()
                )));
                None
            }
        }
    }

    /// Persist the session under `session_id`
    pub async fn save_session(&self, session_id: &str) -> Result<()> {
        let snapshots = self.require_snapshots()?;

        let agents: Vec<AgentSnapshot> = self
            .agents
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|agent| AgentSnapshot {
                agent_id: agent.agent_id().to_string(),
                callsign: agent.callsign().to_string(),
                role: if agent.is_squad_leader() {
                    "squad_leader".to_string()
                } else {
                    "specialist".to_string()
                },
                model: agent.profile().model.clone(),
                memory: agent.memory_snapshot(),
            })
            .collect();

        snapshots
            .save(session_id, self.channel.snapshot(), agents)
            .await
            .map_err(CoordinationError::State)
    }

    /// Restore message history and agent memories from a snapshot
    ///
    /// Tool-server sessions are not restored; they are re-established
    /// on demand. Memories match by agent id, falling back to
    /// normalized callsign; snapshot agents missing from the roster
    /// are skipped with a warning.
    pub async fn load_session(&self, session_id: &str) -> Result<()> {
        let snapshots = self.require_snapshots()?;
        let snapshot = snapshots.load(session_id).await?;

        self.channel.restore(snapshot.messages);

        for saved in snapshot.agents {
            let agent = self
                .get_agent(&saved.agent_id)
                .or_else(|| self.find_agent_by_callsign(&saved.callsign));
            match agent {
                Some(agent) => agent.restore_memory(saved.memory),
                None => tracing::warn!(
                    agent_id = %saved.agent_id,
                    callsign = %saved.callsign,
                    "snapshot agent not on the roster, skipping memory restore"
                ),
            }
        }

        Ok(())
    }

    /// List stored sessions, newest first
    pub async fn list_sessions(&self, limit: usize, offset: usize) -> Result<Vec<SnapshotSummary>> {
        Ok(self.require_snapshots()?.list(limit, offset).await?)
    }

    /// Delete a stored session
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        Ok(self.require_snapshots()?.delete(session_id).await?)
    }

    /// Export a stored session
    pub async fn export_session(&self, session_id: &str, format: ExportFormat) -> Result<String> {
        Ok(self.require_snapshots()?.export(session_id, format).await?)
    }

    fn require_snapshots(&self) -> Result<&SnapshotManager> {
        self.snapshots.as_ref().ok_or_else(|| {
            CoordinationError::State(StateError::storage("no snapshot store configured"))
        })
    }

    /// Wipe channel traffic without touching agents or tool sessions
    pub fn clear_channel(&self) {
        self.channel.clear();
    }

    /// Render recent traffic for display
    pub fn format_history(&self, count: usize) -> String {
        self.channel.format_history(count)
    }

    /// Breaker statistics per connected server
    pub fn breaker_stats(&self) -> HashMap<String, BreakerStats> {
        self.pool.breaker_stats()
    }

    /// Cancel in-flight turns and close every tool session
    ///
    /// Idempotent; safe to call on every exit path.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        self.pool.shutdown().await;
        tracing::info!("orchestrator shut down");
    }
}
