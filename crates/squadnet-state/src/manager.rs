//! Snapshot manager
//!
//! Thin coordination layer over a snapshot store: builds snapshots
//! from live engine state, restores them, and renders exports.

use std::sync::Arc;

use squadnet_channel::Message;
use squadnet_telemetry::{NetEvent, TelemetryCollector};

use crate::snapshot::{AgentSnapshot, SessionSnapshot, SnapshotSummary};
use crate::store::SnapshotStore;
use crate::Result;

/// Export rendering formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    /// Pretty-printed JSON of the full snapshot
    Structured,
    /// Human-readable mission transcript
    Text,
}

/// Manages saving, loading, and exporting session snapshots
pub struct SnapshotManager {
    store: Arc<dyn SnapshotStore>,
    collector: Option<TelemetryCollector>,
}

impl SnapshotManager {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            collector: None,
        }
    }

    /// Attach a telemetry collector for session save/load events
    pub fn with_events(mut self, collector: TelemetryCollector) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Build a snapshot from live state and upsert it
    pub async fn save(
        &self,
        session_id: &str,
        messages: Vec<Message>,
        agents: Vec<AgentSnapshot>,
    ) -> Result<()> {
        let message_count = messages.len();
        let snapshot = SessionSnapshot::new(session_id, messages, agents);
        self.store.save(&snapshot).await?;

        tracing::info!(session_id, message_count, "session saved");
        if let Some(collector) = &self.collector {
            collector.emit(NetEvent::session_saved(session_id, message_count));
        }
        Ok(())
    }

    /// Load the full snapshot for a session
    pub async fn load(&self, session_id: &str) -> Result<SessionSnapshot> {
        let snapshot = self.store.load(session_id).await?;

        tracing::info!(
            session_id,
            message_count = snapshot.messages.len(),
            "session loaded"
        );
        if let Some(collector) = &self.collector {
            collector.emit(NetEvent::session_loaded(session_id, snapshot.messages.len()));
        }
        Ok(snapshot)
    }

    /// List stored sessions, newest first
    pub async fn list(&self, limit: usize, offset: usize) -> Result<Vec<SnapshotSummary>> {
        self.store.list(limit, offset).await
    }

    /// Delete a stored session
    pub async fn delete(&self, session_id: &str) -> Result<()> {
        self.store.delete(session_id).await
    }

    /// Render a stored session for export
    pub async fn export(&self, session_id: &str, format: ExportFormat) -> Result<String> {
        let snapshot = self.store.load(session_id).await?;

        match format {
            ExportFormat::Structured => Ok(serde_json::to_string_pretty(&snapshot)?),
            ExportFormat::Text => Ok(render_transcript(&snapshot)),
        }
    }
}

fn render_transcript(snapshot: &SessionSnapshot) -> String {
    let mut out = format!(
        "Session: {}\nCreated: {}\nUpdated: {}\n\n=== Traffic ===\n",
        snapshot.session_id,
        snapshot.created_at.to_rfc3339(),
        snapshot.updated_at.to_rfc3339(),
    );

    for message in &snapshot.messages {
        out.push_str(&message.format_for_display());
        out.push('\n');
    }

    if !snapshot.agents.is_empty() {
        out.push_str("\n=== Agents ===\n");
        for agent in &snapshot.agents {
            out.push_str(&format!(
                "{} ({}) [{}]\n",
                agent.callsign, agent.agent_id, agent.role
            ));
            let memory = agent.memory.render_prompt_section();
            if !memory.is_empty() {
                for line in memory.lines() {
                    out.push_str(&format!("  {line}\n"));
                }
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemorySnapshotStore;
    use squadnet_memory::{MemoryCategory, Scratchpad};

    fn manager() -> SnapshotManager {
        SnapshotManager::new(Arc::new(InMemorySnapshotStore::new()))
    }

    fn agents() -> Vec<AgentSnapshot> {
        let mut memory = Scratchpad::new();
        memory.update(MemoryCategory::TaskList, "Verify KBOS weather").unwrap();
        vec![AgentSnapshot {
            agent_id: "agent-1".to_string(),
            callsign: "ALPHA-ONE".to_string(),
            role: "specialist".to_string(),
            model: "claude-sonnet-4-5".to_string(),
            memory,
        }]
    }

    #[tokio::test]
    async fn test_save_load_round_trip() {
        let manager = manager();
        let messages = vec![Message::user("user", "Alpha One, this is Command, go, over.")];

        manager.save("m1", messages.clone(), agents()).await.unwrap();
        let loaded = manager.load("m1").await.unwrap();

        assert_eq!(loaded.messages[0].id, messages[0].id);
        assert_eq!(loaded.agents[0].memory.task_list, vec!["Verify KBOS weather"]);
    }

    #[tokio::test]
    async fn test_structured_export_is_json() {
        let manager = manager();
        manager.save("m1", vec![], agents()).await.unwrap();

        let exported = manager.export("m1", ExportFormat::Structured).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&exported).unwrap();
        assert_eq!(value["session_id"], "m1");
    }

    #[tokio::test]
    async fn test_text_export_renders_transcript() {
        let manager = manager();
        let messages = vec![Message::agent("agent-1", "ALPHA-ONE", "on station, over.")];
        manager.save("m1", messages, agents()).await.unwrap();

        let exported = manager.export("m1", ExportFormat::Text).await.unwrap();
        assert!(exported.contains("Session: m1"));
        assert!(exported.contains("ALPHA-ONE: on station, over."));
        assert!(exported.contains("Verify KBOS weather"));
    }

    #[tokio::test]
    async fn test_save_emits_event() {
        let collector = TelemetryCollector::new(16);
        let mut sub = collector.subscribe();
        let manager =
            SnapshotManager::new(Arc::new(InMemorySnapshotStore::new())).with_events(collector);

        manager.save("m1", vec![], vec![]).await.unwrap();
        assert_eq!(sub.recv().await.unwrap().class(), "session.save");
    }
}
