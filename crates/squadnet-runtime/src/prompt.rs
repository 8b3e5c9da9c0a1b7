//! Prompt assembly
//!
//! The system prompt is layered: role description, voice-net protocol
//! reminder, memory summary, tool catalog (when tools exist), and the
//! memory-command instructions. The transcript renders the agent's
//! context window as alternating sender-tagged turns.

use squadnet_channel::{Message, MessageKind};
use squadnet_core::AgentProfile;
use squadnet_llm::{ChatMessage, Role};
use squadnet_memory::Scratchpad;
use squadnet_tools::ToolDescriptor;

/// Placeholder turn used when the context window renders empty
pub const EMPTY_CHANNEL_PLACEHOLDER: &str = "Channel is active. Monitoring communications.";

/// Build the layered system prompt for one turn
pub fn build_system_prompt(
    profile: &AgentProfile,
    memory: &Scratchpad,
    tools: &[ToolDescriptor],
) -> String {
    let callsign = &profile.callsign;
    let mut prompt = format!(
        "You are {callsign}, an agent on a shared voice net.\n\n{}\n\n\
COMMUNICATION PROTOCOL:\n\
You communicate using voice net protocol (pilot-ATC style radio):\n\
- Format: \"[Recipient], this is {callsign}, [message], over.\"\n\
- Use \"Roger\" to acknowledge and \"Copy\" to confirm.\n\
- Address other stations by their callsigns.\n\
- Keep transmissions clear and concise.\n\
- End with \"over\" when expecting a response.\n\n\
Your callsign is: {callsign}",
        profile.system_prompt.trim(),
    );

    let memory_section = memory.render_prompt_section();
    if !memory_section.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(&memory_section);
    }

    if !tools.is_empty() {
        prompt.push_str("\n\nAVAILABLE TOOLS:\nUse these when a task needs them:");
        for tool in tools {
            prompt.push_str(&format!(
                "\n- {} ({}): {}",
                tool.name, tool.server, tool.description
            ));
        }
    }

    prompt.push_str(
        "\n\nMEMORY COMMANDS:\n\
To remember something across turns, emit a line of the form\n\
MEMORIZE[category]: content\n\
with category one of task_list, key_facts, decisions_made, concerns, notes.\n\
key_facts content must be key=value.",
    );

    prompt
}

/// Render a context window as provider transcript turns
///
/// The agent's own traffic becomes assistant turns; everything else,
/// including system traffic (tagged `[SYSTEM]`), becomes sender-tagged
/// user turns. Consecutive same-role turns coalesce so providers that
/// require strict alternation accept the transcript, and the first
/// turn is always a user turn.
pub fn build_transcript(agent_id: &str, callsign: &str, window: &[Message]) -> Vec<ChatMessage> {
    let mut turns: Vec<(Role, String)> = Vec::new();

    for message in window {
        let (role, text) = if message.sender_id == agent_id || message.is_from(callsign) {
            (Role::Assistant, message.content.clone())
        } else if message.kind == MessageKind::System {
            (Role::User, format!("[SYSTEM] {}", message.content))
        } else {
            let sender = message
                .sender_callsign
                .as_deref()
                .unwrap_or(&message.sender_id);
            (Role::User, format!("[{sender}]: {}", message.content))
        };

        match turns.last_mut() {
            Some((last_role, last_text)) if *last_role == role => {
                last_text.push('\n');
                last_text.push_str(&text);
            }
            _ => turns.push((role, text)),
        }
    }

    if turns.first().map_or(true, |(role, _)| *role == Role::Assistant) {
        turns.insert(0, (Role::User, EMPTY_CHANNEL_PLACEHOLDER.to_string()));
    }

    turns
        .into_iter()
        .map(|(role, text)| match role {
            Role::User => ChatMessage::user(text),
            Role::Assistant => ChatMessage::assistant(text),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use squadnet_core::{AgentRole, CriteriaSpec};
    use squadnet_memory::MemoryCategory;

    fn profile() -> AgentProfile {
        AgentProfile {
            agent_id: "agent-1".to_string(),
            callsign: "ALPHA-ONE".to_string(),
            role: AgentRole::Specialist,
            model: "claude-sonnet-4-5".to_string(),
            temperature: 1.0,
            max_tokens: 1024,
            system_prompt: "You are an airport search specialist.".to_string(),
            criteria: vec![CriteriaSpec::DirectAddress],
        }
    }

    #[test]
    fn test_system_prompt_layers() {
        let mut memory = Scratchpad::new();
        memory.update(MemoryCategory::KeyFacts, "base=KBOS").unwrap();

        let tools = vec![ToolDescriptor::new(
            "search_airports",
            "aerospace",
            "Search for airports",
            serde_json::json!({"type": "object"}),
        )];

        let prompt = build_system_prompt(&profile(), &memory, &tools);

        let role_idx = prompt.find("airport search specialist").unwrap();
        let protocol_idx = prompt.find("COMMUNICATION PROTOCOL").unwrap();
        let memory_idx = prompt.find("CURRENT MEMORY").unwrap();
        let tools_idx = prompt.find("AVAILABLE TOOLS").unwrap();
        let memorize_idx = prompt.find("MEMORY COMMANDS").unwrap();

        assert!(role_idx < protocol_idx);
        assert!(protocol_idx < memory_idx);
        assert!(memory_idx < tools_idx);
        assert!(tools_idx < memorize_idx);
        assert!(prompt.contains("search_airports (aerospace)"));
    }

    #[test]
    fn test_system_prompt_omits_empty_sections() {
        let prompt = build_system_prompt(&profile(), &Scratchpad::new(), &[]);
        assert!(!prompt.contains("CURRENT MEMORY"));
        assert!(!prompt.contains("AVAILABLE TOOLS"));
        // the memorize instructions are always present
        assert!(prompt.contains("MEMORIZE[category]"));
    }

    #[test]
    fn test_transcript_roles_and_tags() {
        let window = vec![
            Message::system("ALPHA-ONE has joined the net"),
            Message::user("user", "Alpha One, this is Command, report, over."),
            Message::agent("agent-1", "ALPHA-ONE", "Command, this is Alpha One, on station, over."),
            Message::user("user", "Alpha One, this is Command, proceed, over."),
        ];

        let transcript = build_transcript("agent-1", "ALPHA-ONE", &window);

        assert_eq!(transcript.len(), 3);
        assert_eq!(transcript[0].role, Role::User);
        assert!(transcript[0].text().contains("[SYSTEM] ALPHA-ONE has joined"));
        assert!(transcript[0].text().contains("[COMMAND]: Alpha One, this is Command"));
        assert_eq!(transcript[1].role, Role::Assistant);
        assert_eq!(transcript[2].role, Role::User);
    }

    #[test]
    fn test_transcript_empty_window_gets_placeholder() {
        let transcript = build_transcript("agent-1", "ALPHA-ONE", &[]);
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].role, Role::User);
        assert_eq!(transcript[0].text(), EMPTY_CHANNEL_PLACEHOLDER);
    }

    #[test]
    fn test_transcript_never_starts_with_assistant() {
        let window = vec![Message::agent("agent-1", "ALPHA-ONE", "radio check")];
        let transcript = build_transcript("agent-1", "ALPHA-ONE", &window);

        assert_eq!(transcript[0].role, Role::User);
        assert_eq!(transcript[1].role, Role::Assistant);
    }
}
