//! The five-category agent scratchpad

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{MemoryError, Result};

/// The five scratchpad categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    TaskList,
    KeyFacts,
    DecisionsMade,
    Concerns,
    Notes,
}

impl MemoryCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskList => "task_list",
            Self::KeyFacts => "key_facts",
            Self::DecisionsMade => "decisions_made",
            Self::Concerns => "concerns",
            Self::Notes => "notes",
        }
    }
}

impl fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MemoryCategory {
    type Err = MemoryError;

    /// Case-insensitive; singular aliases map to their category
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "task_list" | "task" | "tasks" => Ok(Self::TaskList),
            "key_facts" | "fact" | "facts" => Ok(Self::KeyFacts),
            "decisions_made" | "decision" | "decisions" => Ok(Self::DecisionsMade),
            "concerns" | "concern" => Ok(Self::Concerns),
            "notes" | "note" => Ok(Self::Notes),
            other => Err(MemoryError::UnknownCategory(other.to_string())),
        }
    }
}

/// Per-category size caps
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryLimits {
    pub task_list: usize,
    pub key_facts: usize,
    pub decisions_made: usize,
    pub concerns: usize,
    pub notes: usize,
}

impl Default for MemoryLimits {
    fn default() -> Self {
        Self {
            task_list: 20,
            key_facts: 50,
            decisions_made: 20,
            concerns: 20,
            notes: 20,
        }
    }
}

/// An agent's scratchpad memory
///
/// List categories append and truncate from the front when full; facts
/// upsert by key. No category grows past its cap.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scratchpad {
    pub task_list: Vec<String>,
    pub key_facts: BTreeMap<String, String>,
    pub decisions_made: Vec<String>,
    pub concerns: Vec<String>,
    pub notes: Vec<String>,

    #[serde(default)]
    limits: MemoryLimits,
}

impl Scratchpad {
    /// Create an empty scratchpad with default caps
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty scratchpad with custom caps
    pub fn with_limits(limits: MemoryLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// Apply one structured update
    ///
    /// For `key_facts` the payload must be `key=value`; anything else is
    /// rejected. List categories append, then drop oldest entries past
    /// the category cap.
    pub fn update(&mut self, category: MemoryCategory, payload: &str) -> Result<()> {
        let payload = payload.trim();
        match category {
            MemoryCategory::KeyFacts => {
                let (key, value) = payload
                    .split_once('=')
                    .map(|(k, v)| (k.trim(), v.trim()))
                    .filter(|(k, _)| !k.is_empty())
                    .ok_or_else(|| MemoryError::InvalidFactFormat(payload.to_string()))?;

                if !self.key_facts.contains_key(key) && self.key_facts.len() >= self.limits.key_facts
                {
                    tracing::warn!(key, "key_facts cap reached, dropping new fact");
                    return Ok(());
                }
                self.key_facts.insert(key.to_string(), value.to_string());
            }
            MemoryCategory::TaskList => {
                push_bounded(&mut self.task_list, payload, self.limits.task_list)
            }
            MemoryCategory::DecisionsMade => {
                push_bounded(&mut self.decisions_made, payload, self.limits.decisions_made)
            }
            MemoryCategory::Concerns => {
                push_bounded(&mut self.concerns, payload, self.limits.concerns)
            }
            MemoryCategory::Notes => push_bounded(&mut self.notes, payload, self.limits.notes),
        }
        Ok(())
    }

    /// Total entries across all categories
    pub fn entry_count(&self) -> usize {
        self.task_list.len()
            + self.key_facts.len()
            + self.decisions_made.len()
            + self.concerns.len()
            + self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entry_count() == 0
    }

    /// Render a compact prompt fragment summarizing current contents
    ///
    /// Empty categories are omitted; an empty scratchpad renders to an
    /// empty string.
    pub fn render_prompt_section(&self) -> String {
        if self.is_empty() {
            return String::new();
        }

        let mut out = String::from("CURRENT MEMORY:\n");
        render_list(&mut out, "Tasks", &self.task_list);
        if !self.key_facts.is_empty() {
            out.push_str("Key facts:\n");
            for (key, value) in &self.key_facts {
                out.push_str(&format!("  - {key}: {value}\n"));
            }
        }
        render_list(&mut out, "Decisions", &self.decisions_made);
        render_list(&mut out, "Concerns", &self.concerns);
        render_list(&mut out, "Notes", &self.notes);
        out.trim_end().to_string()
    }
}

fn push_bounded(list: &mut Vec<String>, payload: &str, cap: usize) {
    list.push(payload.to_string());
    if list.len() > cap {
        let overflow = list.len() - cap;
        list.drain(..overflow);
    }
}

fn render_list(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(title);
    out.push_str(":\n");
    for item in items {
        out.push_str(&format!("  - {item}\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_aliases() {
        assert_eq!("task".parse::<MemoryCategory>().unwrap(), MemoryCategory::TaskList);
        assert_eq!("FACT".parse::<MemoryCategory>().unwrap(), MemoryCategory::KeyFacts);
        assert_eq!(
            "decisions_made".parse::<MemoryCategory>().unwrap(),
            MemoryCategory::DecisionsMade
        );
        assert_eq!("Note".parse::<MemoryCategory>().unwrap(), MemoryCategory::Notes);
        assert!("plans".parse::<MemoryCategory>().is_err());
    }

    #[test]
    fn test_list_append() {
        let mut pad = Scratchpad::new();
        pad.update(MemoryCategory::TaskList, "Verify KBOS weather").unwrap();
        pad.update(MemoryCategory::TaskList, "File flight plan").unwrap();

        assert_eq!(pad.task_list, vec!["Verify KBOS weather", "File flight plan"]);
    }

    #[test]
    fn test_fact_upsert() {
        let mut pad = Scratchpad::new();
        pad.update(MemoryCategory::KeyFacts, "airport=KBOS").unwrap();
        pad.update(MemoryCategory::KeyFacts, "airport=KJFK").unwrap();

        assert_eq!(pad.key_facts.len(), 1);
        assert_eq!(pad.key_facts["airport"], "KJFK");
    }

    #[test]
    fn test_fact_rejects_bad_payload() {
        let mut pad = Scratchpad::new();
        let result = pad.update(MemoryCategory::KeyFacts, "no separator here");
        assert!(matches!(result, Err(MemoryError::InvalidFactFormat(_))));
        assert!(pad.key_facts.is_empty());
    }

    #[test]
    fn test_list_cap_drops_oldest() {
        let mut pad = Scratchpad::with_limits(MemoryLimits {
            notes: 3,
            ..MemoryLimits::default()
        });
        for i in 0..5 {
            pad.update(MemoryCategory::Notes, &format!("note {i}")).unwrap();
        }

        assert_eq!(pad.notes, vec!["note 2", "note 3", "note 4"]);
    }

    #[test]
    fn test_fact_cap_keeps_existing_keys_updatable() {
        let mut pad = Scratchpad::with_limits(MemoryLimits {
            key_facts: 1,
            ..MemoryLimits::default()
        });
        pad.update(MemoryCategory::KeyFacts, "a=1").unwrap();
        // new key past the cap is dropped
        pad.update(MemoryCategory::KeyFacts, "b=2").unwrap();
        // existing key still upserts
        pad.update(MemoryCategory::KeyFacts, "a=3").unwrap();

        assert_eq!(pad.key_facts.len(), 1);
        assert_eq!(pad.key_facts["a"], "3");
    }

    #[test]
    fn test_prompt_rendering() {
        let mut pad = Scratchpad::new();
        assert_eq!(pad.render_prompt_section(), "");

        pad.update(MemoryCategory::TaskList, "Search airports").unwrap();
        pad.update(MemoryCategory::KeyFacts, "location=Boston").unwrap();

        let rendered = pad.render_prompt_section();
        assert!(rendered.starts_with("CURRENT MEMORY:"));
        assert!(rendered.contains("- Search airports"));
        assert!(rendered.contains("- location: Boston"));
        assert!(!rendered.contains("Concerns"));
    }

    #[test]
    fn test_serde_round_trip() {
        let mut pad = Scratchpad::new();
        pad.update(MemoryCategory::Concerns, "fuel margin is thin").unwrap();
        pad.update(MemoryCategory::KeyFacts, "runway=04R").unwrap();

        let json = serde_json::to_string(&pad).unwrap();
        let back: Scratchpad = serde_json::from_str(&json).unwrap();
        assert_eq!(back.concerns, pad.concerns);
        assert_eq!(back.key_facts, pad.key_facts);
    }
}
