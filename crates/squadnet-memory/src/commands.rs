//! In-band memory command extraction
//!
//! Agents update their scratchpad by emitting line-anchored
//! `MEMORIZE[category]: content` commands in their final response.
//! Commands are data, never executed.

use regex::Regex;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::scratchpad::{MemoryCategory, Scratchpad};

/// One extracted memory command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryCommand {
    pub category: MemoryCategory,
    pub payload: String,
}

/// Result of applying the commands found in a response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Successfully applied updates
    pub applied: usize,
    /// Lines that looked like commands but were rejected
    pub rejected: usize,
    /// Categories touched, in application order
    pub categories: Vec<MemoryCategory>,
}

fn command_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*MEMORIZE\[([A-Za-z_]+)\]:\s*(.+?)\s*$").unwrap())
}

/// Extract well-formed commands from a response
///
/// Lines with an unknown category are logged and skipped; they count as
/// rejected in [`apply_response`].
pub fn extract_commands(text: &str) -> Vec<MemoryCommand> {
    command_pattern()
        .captures_iter(text)
        .filter_map(|caps| {
            let raw_category = &caps[1];
            match MemoryCategory::from_str(raw_category) {
                Ok(category) => Some(MemoryCommand {
                    category,
                    payload: caps[2].to_string(),
                }),
                Err(_) => {
                    tracing::warn!(category = raw_category, "ignoring unknown memory category");
                    None
                }
            }
        })
        .collect()
}

/// Extract commands from a response and apply them to a scratchpad
pub fn apply_response(pad: &mut Scratchpad, text: &str) -> UpdateReport {
    let mut report = UpdateReport::default();

    for caps in command_pattern().captures_iter(text) {
        let raw_category = &caps[1];
        let payload = &caps[2];

        let category = match MemoryCategory::from_str(raw_category) {
            Ok(category) => category,
            Err(err) => {
                tracing::warn!(category = raw_category, %err, "rejected memory command");
                report.rejected += 1;
                continue;
            }
        };

        match pad.update(category, payload) {
            Ok(()) => {
                report.applied += 1;
                report.categories.push(category);
            }
            Err(err) => {
                tracing::warn!(category = %category, %err, "rejected memory command");
                report.rejected += 1;
            }
        }
    }

    report
}
