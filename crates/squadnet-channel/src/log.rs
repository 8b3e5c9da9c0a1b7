//! Bounded, ordered traffic log for the shared channel

use std::collections::VecDeque;
use std::sync::RwLock;

use crate::message::{Message, MessageKind};
use crate::protocol;

/// Fixed-capacity FIFO log of channel traffic
///
/// Appends are serialized under a write lock; readers receive cloned
/// snapshots, so concurrent turns observe a stable view. Eviction drops
/// the oldest message in O(1) when the log is full.
pub struct TrafficLog {
    inner: RwLock<VecDeque<Message>>,
    max_history: usize,
}

impl TrafficLog {
    /// Create a log retaining at most `max_history` messages
    pub fn new(max_history: usize) -> Self {
        Self {
            inner: RwLock::new(VecDeque::with_capacity(max_history.min(1024))),
            max_history,
        }
    }

    /// Append a prebuilt message, evicting the oldest entry when full
    pub fn append(&self, message: Message) -> Message {
        let mut log = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if log.len() == self.max_history {
            log.pop_front();
        }
        log.push_back(message.clone());
        message
    }

    /// Build a message from raw parts and append it
    pub fn post(
        &self,
        sender_id: &str,
        sender_callsign: Option<&str>,
        content: &str,
        kind: MessageKind,
    ) -> Message {
        self.append(Message::new(sender_id, sender_callsign, content, kind))
    }

    /// The last `n` messages in log order
    pub fn recent(&self, n: usize) -> Vec<Message> {
        let log = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let skip = log.len().saturating_sub(n);
        log.iter().skip(skip).cloned().collect()
    }

    /// The most recent `window` messages relevant to `callsign`
    ///
    /// A message is relevant when it is from the callsign, addressed to
    /// it, a broadcast, or system traffic. Ordering follows the log.
    pub fn context_window(&self, callsign: &str, window: usize) -> Vec<Message> {
        let log = self.inner.read().unwrap_or_else(|e| e.into_inner());
        let mut selected: Vec<Message> = log
            .iter()
            .rev()
            .filter(|msg| {
                msg.kind == MessageKind::System
                    || msg.meta.is_broadcast
                    || msg.is_from(callsign)
                    || msg.is_addressed_to(callsign)
            })
            .take(window)
            .cloned()
            .collect();
        selected.reverse();
        selected
    }

    /// Number of messages currently retained
    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Configured retention bound
    pub fn max_history(&self) -> usize {
        self.max_history
    }

    /// Copy of the full log in order
    pub fn snapshot(&self) -> Vec<Message> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    /// Replace the log contents, trimming to capacity from the front
    pub fn restore(&self, messages: Vec<Message>) {
        let mut log = self.inner.write().unwrap_or_else(|e| e.into_inner());
        log.clear();
        let skip = messages.len().saturating_sub(self.max_history);
        if skip > 0 {
            tracing::warn!(
                dropped = skip,
                "restored traffic exceeds retention bound, dropping oldest"
            );
        }
        log.extend(messages.into_iter().skip(skip));
    }

    /// Drop all messages
    pub fn clear(&self) {
        self.inner.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Render the last `n` messages for display
    pub fn format_history(&self, n: usize) -> String {
        let recent = self.recent(n);
        if recent.is_empty() {
            return "No traffic on the net.".to_string();
        }
        recent
            .iter()
            .map(Message::format_for_display)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Parse a raw content string with the channel codec
    pub fn parse_content(&self, content: &str) -> protocol::ParsedTransmission {
        protocol::parse(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(content: &str) -> Message {
        Message::user("user", content)
    }

    #[test]
    fn test_append_and_recent() {
        let log = TrafficLog::new(10);
        log.append(user("first"));
        log.append(user("second"));

        let recent = log.recent(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].content, "second");
    }

    #[test]
    fn test_bounded_eviction_preserves_order() {
        let log = TrafficLog::new(3);
        for i in 0..5 {
            log.append(user(&format!("msg {i}")));
        }

        assert_eq!(log.len(), 3);
        let all = log.snapshot();
        let contents: Vec<&str> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["msg 2", "msg 3", "msg 4"]);
    }

    #[test]
    fn test_context_window_filters() {
        let log = TrafficLog::new(100);
        log.append(user("Alpha One, this is Command, report in, over."));
        log.append(user("Bravo Two, this is Command, hold, over."));
        log.append(Message::agent(
            "agent-1",
            "ALPHA-ONE",
            "Command, this is Alpha One, on station, over.",
        ));
        log.append(Message::system("BRAVO-TWO has joined the net"));
        log.append(user("All stations, this is Command, status report, over."));

        let window = log.context_window("ALPHA-ONE", 10);
        let contents: Vec<&str> = window.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(
            contents,
            vec![
                "Alpha One, this is Command, report in, over.",
                "Command, this is Alpha One, on station, over.",
                "BRAVO-TWO has joined the net",
                "All stations, this is Command, status report, over.",
            ]
        );
    }

    #[test]
    fn test_context_window_size_limit() {
        let log = TrafficLog::new(100);
        for i in 0..10 {
            log.append(Message::system(format!("system {i}")));
        }

        let window = log.context_window("ALPHA-ONE", 4);
        assert_eq!(window.len(), 4);
        assert_eq!(window[0].content, "system 6");
        assert_eq!(window[3].content, "system 9");
    }

    #[test]
    fn test_restore_round_trip() {
        let log = TrafficLog::new(100);
        log.append(user("one"));
        log.append(user("two"));
        let saved = log.snapshot();

        let restored = TrafficLog::new(100);
        restored.restore(saved.clone());

        let back = restored.snapshot();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].id, saved[0].id);
        assert_eq!(back[1].content, "two");
    }

    #[test]
    fn test_restore_trims_overflow() {
        let log = TrafficLog::new(2);
        log.restore(vec![user("a"), user("b"), user("c")]);
        let contents: Vec<String> = log.snapshot().iter().map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["b", "c"]);
    }

    #[test]
    fn test_clear() {
        let log = TrafficLog::new(10);
        log.append(user("one"));
        log.clear();
        assert!(log.is_empty());
    }

    #[test]
    fn test_format_history() {
        let log = TrafficLog::new(10);
        assert_eq!(log.format_history(5), "No traffic on the net.");

        log.append(Message::agent("agent-1", "ALPHA-ONE", "on station"));
        assert!(log.format_history(5).contains("ALPHA-ONE: on station"));
    }

    #[test]
    fn test_concurrent_appends_stay_bounded() {
        use std::sync::Arc;
        let log = Arc::new(TrafficLog::new(50));
        let mut handles = vec![];

        for t in 0..4 {
            let log = Arc::clone(&log);
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    log.append(Message::system(format!("t{t} m{i}")));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(log.len(), 50);
    }
}
