//! Message data model for the shared channel

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::{self, TrafficType};

/// Originator class of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    User,
    Agent,
    System,
}

/// Parsed addressing metadata attached to a message at append time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficMeta {
    /// Classified intent of the content
    pub traffic_type: TrafficType,
    /// Addressed to all stations
    pub is_broadcast: bool,
}

/// A single immutable message on the shared channel
///
/// Once appended to the traffic log a message is never mutated; the
/// log hands out clones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier
    pub id: String,

    /// When the message was created
    pub timestamp: DateTime<Utc>,

    /// ID of the agent or user who sent the message
    pub sender_id: String,

    /// Radio callsign of the sender (e.g., "ALPHA-ONE")
    pub sender_callsign: Option<String>,

    /// Radio callsign of the intended recipient, parsed from the content
    pub recipient_callsign: Option<String>,

    /// The transmission text
    pub content: String,

    /// Originator class
    pub kind: MessageKind,

    /// Parsed addressing metadata
    pub meta: TrafficMeta,
}

impl Message {
    /// Create a message, deriving recipient and intent from the content
    pub fn new(
        sender_id: impl Into<String>,
        sender_callsign: Option<&str>,
        content: impl Into<String>,
        kind: MessageKind,
    ) -> Self {
        let content = content.into();
        let parsed = protocol::parse(&content);
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            sender_id: sender_id.into(),
            sender_callsign: sender_callsign.map(|c| c.to_string()),
            recipient_callsign: parsed.recipient,
            content,
            kind,
            meta: TrafficMeta {
                traffic_type: parsed.traffic_type,
                is_broadcast: parsed.is_broadcast,
            },
        }
    }

    /// Create a user message
    pub fn user(user_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::new(user_id, Some("COMMAND"), content, MessageKind::User)
    }

    /// Create an agent message
    pub fn agent(
        agent_id: impl Into<String>,
        callsign: &str,
        content: impl Into<String>,
    ) -> Self {
        Self::new(agent_id, Some(callsign), content, MessageKind::Agent)
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", None, content, MessageKind::System)
    }

    /// Check whether this message is addressed to a callsign
    ///
    /// Broadcast recipients address every station.
    pub fn is_addressed_to(&self, callsign: &str) -> bool {
        match &self.recipient_callsign {
            None => false,
            Some(recipient) => {
                self.meta.is_broadcast || protocol::callsigns_match(recipient, callsign)
            }
        }
    }

    /// Check whether this message was sent by a callsign
    pub fn is_from(&self, callsign: &str) -> bool {
        self.sender_callsign
            .as_deref()
            .map_or(false, |sender| protocol::callsigns_match(sender, callsign))
    }

    /// Format the message for display in the channel history
    pub fn format_for_display(&self) -> String {
        let timestamp = self.timestamp.format("%H:%M:%S");
        match self.kind {
            MessageKind::System => format!("[{timestamp}] [SYSTEM] {}", self.content),
            _ => {
                let callsign = self.sender_callsign.as_deref().unwrap_or(&self.sender_id);
                format!("[{timestamp}] {callsign}: {}", self.content)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_parses_recipient() {
        let msg = Message::user("user", "Alpha One, this is Command, report status, over.");
        assert_eq!(msg.recipient_callsign.as_deref(), Some("Alpha One"));
        assert_eq!(msg.kind, MessageKind::User);
        assert!(!msg.meta.is_broadcast);
    }

    #[test]
    fn test_message_broadcast_meta() {
        let msg = Message::user("user", "All stations, this is Command, status report, over.");
        assert!(msg.meta.is_broadcast);
        assert!(msg.is_addressed_to("ALPHA-ONE"));
        assert!(msg.is_addressed_to("BRAVO-TWO"));
    }

    #[test]
    fn test_is_addressed_to_normalizes() {
        let msg = Message::user("user", "Alpha One, this is Command, go, over.");
        assert!(msg.is_addressed_to("ALPHA-ONE"));
        assert!(msg.is_addressed_to("alpha_one"));
        assert!(!msg.is_addressed_to("ALPHA-TWO"));
    }

    #[test]
    fn test_undirected_message_addresses_nobody() {
        let msg = Message::system("ALPHA-ONE has joined the net");
        assert!(!msg.is_addressed_to("ALPHA-ONE"));
    }

    #[test]
    fn test_unique_ids() {
        let a = Message::system("one");
        let b = Message::system("two");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_display_formatting() {
        let msg = Message::agent("agent-1", "ALPHA-ONE", "on station");
        assert!(msg.format_for_display().contains("ALPHA-ONE: on station"));

        let sys = Message::system("net open");
        assert!(sys.format_for_display().contains("[SYSTEM] net open"));
    }

    #[test]
    fn test_serde_round_trip() {
        let msg = Message::agent("agent-1", "ALPHA-ONE", "Roger, copy that.");
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, msg.id);
        assert_eq!(back.content, msg.content);
        assert_eq!(back.meta.traffic_type, msg.meta.traffic_type);
    }
}
