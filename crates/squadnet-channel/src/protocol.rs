//! Voice net protocol parser and formatter
//!
//! Implements pilot-ATC style transmissions on a shared channel:
//! - `"[Recipient], this is [Sender], [message], over."`
//! - `"[Recipient], [message]"` (shortened, sender unknown)
//! - `"All stations, this is [Sender], [message], over."`
//! - `"Roger, [acknowledgment]"` / `"Copy, [confirmation]"`

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Classified intent of a transmission body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficType {
    /// Roger/Copy/Wilco response
    Acknowledgment,
    /// Question
    Query,
    /// Order or assignment
    Command,
    /// Asking for information or action
    Request,
    /// Reporting information (default)
    Report,
}

impl TrafficType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Acknowledgment => "acknowledgment",
            Self::Query => "query",
            Self::Command => "command",
            Self::Request => "request",
            Self::Report => "report",
        }
    }
}

/// A parsed voice net transmission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTransmission {
    /// Sender callsign, when the transmission names one
    pub sender: Option<String>,
    /// Recipient callsign; `None` means undirected traffic
    pub recipient: Option<String>,
    /// Message body with addressing stripped
    pub body: String,
    /// Addressed to all stations
    pub is_broadcast: bool,
    /// Classified intent of the body
    pub traffic_type: TrafficType,
    /// Transmission carries an "over" terminator
    pub ends_with_over: bool,
}

fn full_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^(?P<recipient>[\w\s-]+),\s+this\s+is\s+(?P<sender>[\w\s-]+),\s+(?P<body>.+?)(?:,\s*over)?\.?\s*$",
        )
        .unwrap()
    })
}

fn broadcast_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^all\s+(?:stations|units|agents),\s+this\s+is\s+(?P<sender>[\w\s-]+),\s+(?P<body>.+?)(?:,\s*over)?\.?\s*$",
        )
        .unwrap()
    })
}

fn acknowledgment_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(?:roger|copy|wilco)\b[,.!]?\s*(?P<body>.*)$").unwrap())
}

fn direct_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?P<recipient>[\w\s-]+),\s+(?P<body>.+?)(?:,\s*over)?\.?\s*$").unwrap()
    })
}

/// Normalize a callsign for matching
///
/// Uppercases, collapses runs of spaces/underscores/hyphens into a
/// single hyphen, and strips trailing punctuation. Two callsigns match
/// iff their normalized forms are equal.
pub fn normalize_callsign(raw: &str) -> String {
    let trimmed = raw
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_punctuation());
    let mut out = String::with_capacity(trimmed.len());
    let mut pending_sep = false;
    for ch in trimmed.chars() {
        if ch == ' ' || ch == '_' || ch == '-' {
            pending_sep = !out.is_empty();
        } else {
            if pending_sep {
                out.push('-');
                pending_sep = false;
            }
            for upper in ch.to_uppercase() {
                out.push(upper);
            }
        }
    }
    out
}

/// Check whether two callsigns refer to the same station
pub fn callsigns_match(a: &str, b: &str) -> bool {
    normalize_callsign(a) == normalize_callsign(b)
}

/// Recipient strings that address every station on the net
pub fn is_broadcast_callsign(raw: &str) -> bool {
    matches!(
        normalize_callsign(raw).as_str(),
        "ALL" | "ALL-STATIONS" | "ALL-UNITS" | "ALL-AGENTS" | "EVERYONE"
    )
}

/// Parse a raw transmission into addressing, body, and intent
pub fn parse(message: &str) -> ParsedTransmission {
    let message = message.trim();
    let ends_with_over = message.to_lowercase().contains("over");

    if let Some(caps) = broadcast_pattern().captures(message) {
        let body = caps["body"].trim().to_string();
        return ParsedTransmission {
            sender: Some(caps["sender"].trim().to_string()),
            recipient: Some("ALL".to_string()),
            traffic_type: classify_body(&body),
            body,
            is_broadcast: true,
            ends_with_over,
        };
    }

    if let Some(caps) = full_pattern().captures(message) {
        let recipient = caps["recipient"].trim().to_string();
        let body = caps["body"].trim().to_string();
        let is_broadcast = is_broadcast_callsign(&recipient);
        return ParsedTransmission {
            sender: Some(caps["sender"].trim().to_string()),
            recipient: Some(recipient),
            traffic_type: classify_body(&body),
            body,
            is_broadcast,
            ends_with_over,
        };
    }

    if let Some(caps) = acknowledgment_pattern().captures(message) {
        return ParsedTransmission {
            sender: None,
            recipient: None,
            body: caps["body"].trim().to_string(),
            is_broadcast: false,
            traffic_type: TrafficType::Acknowledgment,
            ends_with_over,
        };
    }

    if let Some(caps) = direct_pattern().captures(message) {
        let recipient = caps["recipient"].trim().to_string();
        let body = caps["body"].trim().to_string();
        let is_broadcast = is_broadcast_callsign(&recipient);
        return ParsedTransmission {
            sender: None,
            recipient: Some(recipient),
            traffic_type: classify_body(&body),
            body,
            is_broadcast,
            ends_with_over,
        };
    }

    ParsedTransmission {
        sender: None,
        recipient: None,
        body: message.to_string(),
        is_broadcast: false,
        traffic_type: classify_body(message),
        ends_with_over,
    }
}

const QUERY_LEADERS: &[&str] = &["what", "when", "where", "how", "why", "which", "who"];

const COMMAND_KEYWORDS: &[&str] = &[
    "search",
    "calculate",
    "compute",
    "execute",
    "release",
    "find",
    "plan",
    "perform",
    "check",
];

const REQUEST_MARKERS: &[&str] = &["please", "can you", "could you", "would you"];

/// Classify the intent of a transmission body
///
/// Priority order is fixed: acknowledgment, query, command, request,
/// report. The first matching class wins, so "please search" is a
/// command rather than a request.
pub fn classify_body(body: &str) -> TrafficType {
    let lower = body.trim().to_lowercase();

    if lower.starts_with("roger") || lower.starts_with("copy") || lower.starts_with("wilco") {
        return TrafficType::Acknowledgment;
    }

    if lower.contains('?')
        || QUERY_LEADERS
            .iter()
            .any(|word| starts_with_word(&lower, word))
    {
        return TrafficType::Query;
    }

    if COMMAND_KEYWORDS
        .iter()
        .any(|word| contains_word(&lower, word))
    {
        return TrafficType::Command;
    }

    if REQUEST_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return TrafficType::Request;
    }

    TrafficType::Report
}

fn starts_with_word(text: &str, word: &str) -> bool {
    text.starts_with(word)
        && text[word.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric())
}

fn contains_word(text: &str, word: &str) -> bool {
    text.match_indices(word).any(|(idx, _)| {
        let before_ok = idx == 0
            || !text[..idx]
                .chars()
                .next_back()
                .map_or(false, |c| c.is_alphanumeric());
        let after_ok = text[idx + word.len()..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

/// Format a transmission using voice net protocol
///
/// With a recipient: `"[Recipient], this is [Sender], [body], over."`
pub fn format_transmission(sender: &str, recipient: Option<&str>, body: &str) -> String {
    let mut msg = match recipient {
        Some(recipient) => format!("{recipient}, this is {sender}, {body}"),
        None => format!("{sender}, {body}"),
    };

    if !msg.to_lowercase().ends_with("over") {
        msg.push_str(", over");
    }
    if !msg.ends_with('.') {
        msg.push('.');
    }
    msg
}

/// Format a Roger acknowledgment
pub fn format_roger(body: &str) -> String {
    if body.is_empty() {
        "Roger.".to_string()
    } else {
        format!("Roger, {body}.")
    }
}

/// Format a Copy confirmation
pub fn format_copy(body: &str) -> String {
    if body.is_empty() {
        "Copy.".to_string()
    } else {
        format!("Copy, {body}.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_transmission() {
        let parsed = parse("Alpha One, this is Command, search airports near KBOS, over.");
        assert_eq!(parsed.recipient.as_deref(), Some("Alpha One"));
        assert_eq!(parsed.sender.as_deref(), Some("Command"));
        assert_eq!(parsed.body, "search airports near KBOS");
        assert!(!parsed.is_broadcast);
        assert!(parsed.ends_with_over);
        assert_eq!(parsed.traffic_type, TrafficType::Command);
    }

    #[test]
    fn test_parse_broadcast() {
        let parsed = parse("All stations, this is Rescue Lead, status report, over.");
        assert!(parsed.is_broadcast);
        assert_eq!(parsed.recipient.as_deref(), Some("ALL"));
        assert_eq!(parsed.sender.as_deref(), Some("Rescue Lead"));
        assert_eq!(parsed.body, "status report");
    }

    #[test]
    fn test_parse_broadcast_recipient_in_full_form() {
        let parsed = parse("All units, this is Command, hold position, over.");
        assert!(parsed.is_broadcast);
    }

    #[test]
    fn test_parse_direct_short_form() {
        let parsed = parse("Bravo Nine, status, over.");
        assert_eq!(parsed.recipient.as_deref(), Some("Bravo Nine"));
        assert!(parsed.sender.is_none());
        assert_eq!(parsed.body, "status");
    }

    #[test]
    fn test_parse_acknowledgment() {
        let parsed = parse("Roger, proceeding to waypoint.");
        assert_eq!(parsed.traffic_type, TrafficType::Acknowledgment);
        assert_eq!(parsed.body, "proceeding to waypoint.");
        assert!(parsed.recipient.is_none());
    }

    #[test]
    fn test_parse_unaddressed() {
        let parsed = parse("standing by");
        assert!(parsed.recipient.is_none());
        assert!(parsed.sender.is_none());
        assert_eq!(parsed.traffic_type, TrafficType::Report);
    }

    #[test]
    fn test_classify_priority_order() {
        assert_eq!(classify_body("roger that"), TrafficType::Acknowledgment);
        assert_eq!(classify_body("what is your position"), TrafficType::Query);
        assert_eq!(classify_body("status update?"), TrafficType::Query);
        assert_eq!(classify_body("search the grid"), TrafficType::Command);
        // command keyword outranks the request marker
        assert_eq!(classify_body("please search the grid"), TrafficType::Command);
        assert_eq!(classify_body("could you confirm"), TrafficType::Request);
        assert_eq!(classify_body("holding at angels ten"), TrafficType::Report);
    }

    #[test]
    fn test_classify_whole_words_only() {
        // "research" must not trigger the "search" command keyword
        assert_eq!(classify_body("research is ongoing"), TrafficType::Report);
        // "whoever" must not trigger the "who" query leader
        assert_eq!(classify_body("whoever is closest"), TrafficType::Report);
    }

    #[test]
    fn test_normalize_callsign() {
        assert_eq!(normalize_callsign("Alpha One"), "ALPHA-ONE");
        assert_eq!(normalize_callsign("alpha_one"), "ALPHA-ONE");
        assert_eq!(normalize_callsign("ALPHA--ONE"), "ALPHA-ONE");
        assert_eq!(normalize_callsign("Alpha One."), "ALPHA-ONE");
        assert_eq!(normalize_callsign("  alpha   one  "), "ALPHA-ONE");
    }

    #[test]
    fn test_callsigns_match() {
        assert!(callsigns_match("Alpha One", "ALPHA-ONE"));
        assert!(callsigns_match("alpha_one", "Alpha One"));
        assert!(!callsigns_match("Alpha One", "Alpha Two"));
    }

    #[test]
    fn test_broadcast_callsigns() {
        assert!(is_broadcast_callsign("ALL"));
        assert!(is_broadcast_callsign("all stations"));
        assert!(is_broadcast_callsign("All Units"));
        assert!(is_broadcast_callsign("all agents"));
        assert!(!is_broadcast_callsign("Alpha One"));
    }

    #[test]
    fn test_format_transmission() {
        let msg = format_transmission("Command", Some("Alpha One"), "proceed to KBOS");
        assert_eq!(msg, "Alpha One, this is Command, proceed to KBOS, over.");

        let msg = format_transmission("Alpha One", None, "on station");
        assert_eq!(msg, "Alpha One, on station, over.");
    }

    #[test]
    fn test_format_round_trip() {
        let msg = format_transmission("Command", Some("Alpha One"), "report fuel state");
        let parsed = parse(&msg);
        assert_eq!(parsed.sender.as_deref(), Some("Command"));
        assert_eq!(parsed.recipient.as_deref(), Some("Alpha One"));
        assert_eq!(parsed.body, "report fuel state");
    }

    #[test]
    fn test_format_acknowledgments() {
        assert_eq!(format_roger(""), "Roger.");
        assert_eq!(format_roger("proceeding"), "Roger, proceeding.");
        assert_eq!(format_copy("two minutes out"), "Copy, two minutes out.");
    }
}
