use serde::{Deserialize, Serialize};

/// Author of a conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    /// Map a wire role onto the canonical set
    ///
    /// `developer` is treated as a system message; anything unrecognized
    /// is treated as user input.
    pub fn from_wire(role: &str) -> Self {
        match role {
            "system" | "developer" => Self::System,
            "assistant" => Self::Assistant,
            "tool" => Self::Tool,
            _ => Self::User,
        }
    }
}

/// A message reduced to what tool policies need to see
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalMessage {
    pub role: Role,
    /// Tool calls carried by the message
    ///
    /// For a tool-role message this holds the result it delivers, keyed by
    /// the originating call id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<CanonicalToolCall>>,
}

/// A tool invocation, or the result of one
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalToolCall {
    /// Provider-assigned or synthesized call id
    pub id: String,
    pub name: String,
    /// Parsed arguments; `{}` when the provider sent malformed JSON
    pub arguments: serde_json::Value,
    pub is_error: bool,
}

/// Result delivered by a tool-role message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalToolResult {
    /// Id of the call this result answers
    pub id: String,
    /// Name of the originating call, or `"unknown"`
    pub name: String,
    pub content: serde_json::Value,
    pub is_error: bool,
}

/// Function tool offered to the model
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalToolDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}
