//! Speaking criteria
//!
//! Per-agent predicates over recent channel traffic that decide
//! whether the agent takes a turn. Criteria compose with OR; an agent
//! never fires on its own traffic.

use squadnet_channel::{protocol, Message, TrafficType};
use squadnet_core::{AgentRole, CriteriaSpec};

const DEFAULT_COORDINATION_KEYWORDS: &[&str] =
    &["help", "stuck", "unclear", "coordinate", "organize", "plan"];

/// Compiled speaking criteria for one agent
#[derive(Debug, Clone)]
pub enum SpeakingCriteria {
    /// Fires when the most recent non-self message addresses this agent
    DirectAddress,
    /// Fires when the latest message body contains any keyword
    Keywords(Vec<String>),
    /// Fires when the latest message is a query
    Question,
    /// Squad-leader coordination triggers
    SquadLeader { coordination_keywords: Vec<String> },
    /// OR-composition of criteria
    Composite(Vec<SpeakingCriteria>),
}

impl SpeakingCriteria {
    /// Compile declarative specs; an empty list defaults to direct
    /// address (plus leader triggers for squad leaders)
    pub fn from_specs(specs: &[CriteriaSpec], role: AgentRole) -> Self {
        if specs.is_empty() {
            return match role {
                AgentRole::Specialist => Self::DirectAddress,
                AgentRole::SquadLeader => Self::Composite(vec![
                    Self::DirectAddress,
                    Self::SquadLeader {
                        coordination_keywords: default_coordination_keywords(),
                    },
                ]),
            };
        }

        let compiled: Vec<SpeakingCriteria> = specs
            .iter()
            .map(|spec| match spec {
                CriteriaSpec::DirectAddress => Self::DirectAddress,
                CriteriaSpec::Keywords { keywords } => Self::Keywords(keywords.clone()),
                CriteriaSpec::Question => Self::Question,
                CriteriaSpec::SquadLeader {
                    coordination_keywords,
                } => Self::SquadLeader {
                    coordination_keywords: if coordination_keywords.is_empty() {
                        default_coordination_keywords()
                    } else {
                        coordination_keywords.clone()
                    },
                },
            })
            .collect();

        match compiled.len() {
            1 => compiled
                .into_iter()
                .next()
                .unwrap_or(Self::DirectAddress),
            _ => Self::Composite(compiled),
        }
    }

    /// Evaluate against recent traffic, newest last
    pub fn evaluate(&self, agent_id: &str, callsign: &str, recent: &[Message]) -> bool {
        let Some(latest) = recent.last() else {
            return false;
        };

        // never respond to own traffic
        if latest.sender_id == agent_id || latest.is_from(callsign) {
            return false;
        }

        match self {
            Self::DirectAddress => recent
                .iter()
                .rev()
                .find(|msg| msg.sender_id != agent_id && !msg.is_from(callsign))
                .map_or(false, |msg| {
                    !msg.meta.is_broadcast && msg.is_addressed_to(callsign)
                }),

            Self::Keywords(keywords) => {
                let body = protocol::parse(&latest.content).body.to_lowercase();
                keywords
                    .iter()
                    .any(|keyword| contains_word(&body, &keyword.to_lowercase()))
            }

            Self::Question => latest.meta.traffic_type == TrafficType::Query,

            Self::SquadLeader {
                coordination_keywords,
            } => {
                if latest.is_addressed_to(callsign) {
                    return true;
                }
                let content = latest.content.to_lowercase();
                if coordination_keywords
                    .iter()
                    .any(|keyword| content.contains(&keyword.to_lowercase()))
                {
                    return true;
                }
                // unaddressed questions fall to the leader
                latest.meta.traffic_type == TrafficType::Query
                    && (latest.recipient_callsign.is_none() || latest.meta.is_broadcast)
            }

            Self::Composite(criteria) => criteria
                .iter()
                .any(|criterion| criterion.evaluate(agent_id, callsign, recent)),
        }
    }
}

fn default_coordination_keywords() -> Vec<String> {
    DEFAULT_COORDINATION_KEYWORDS
        .iter()
        .map(|s| s.to_string())
        .collect()
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
