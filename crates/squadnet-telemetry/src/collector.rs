//! Telemetry collector

use std::sync::Arc;
use tokio::sync::broadcast;

use crate::NetEvent;

/// Collects engine events and broadcasts them to subscribers
///
/// Every emitted event is also mirrored into `tracing` as a structured
/// debug record, so dashboards and plain logs see the same stream.
#[derive(Clone)]
pub struct TelemetryCollector {
    sender: Arc<broadcast::Sender<NetEvent>>,
}

impl TelemetryCollector {
    /// Create a new collector with the given channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Emit an event to all subscribers
    ///
    /// Events are dropped silently when nobody is subscribed.
    pub fn emit(&self, event: NetEvent) {
        tracing::debug!(
            class = event.class(),
            payload = %serde_json::to_string(&event).unwrap_or_default(),
            "telemetry"
        );
        let _ = self.sender.send(event);
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<NetEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for TelemetryCollector {
    fn default() -> Self {
        Self::new(1000)
    }
}
