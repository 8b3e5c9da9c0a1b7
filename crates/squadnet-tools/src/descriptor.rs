//! Tool descriptors aggregated from the server federation

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One discoverable tool with its provenance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique across the federation
    pub name: String,

    /// Server that published the tool
    pub server: String,

    /// Human description included in agent prompts
    pub description: String,

    /// JSON schema for the tool's arguments, as published
    pub input_schema: Value,
}

impl ToolDescriptor {
    pub fn new(
        name: impl Into<String>,
        server: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
    ) -> Self {
        Self {
            name: name.into(),
            server: server.into(),
            description: description.into(),
            input_schema,
        }
    }
}
