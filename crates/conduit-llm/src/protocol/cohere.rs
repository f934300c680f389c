//! Cohere Chat (v1) wire format
//!
//! Field names follow the raw HTTP API (`snake_case`); camelCase aliases
//! accept payloads relayed through Cohere's SDKs.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// -- Request types --

/// Chat request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereRequest {
    /// Latest turn, sent separately from the history
    pub message: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub chat_history: Vec<CohereChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Nucleus sampling threshold
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<CohereTool>>,
    /// Results for the tool calls of the previous chatbot turn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_results: Option<Vec<CohereToolResult>>,
}

/// Turn in the chat history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohereChatMessage {
    pub role: CohereRole,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "toolCalls")]
    pub tool_calls: Option<Vec<CohereToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "toolResults")]
    pub tool_results: Option<Vec<CohereToolResult>>,
}

/// History roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CohereRole {
    User,
    Chatbot,
    System,
    Tool,
}

/// Tool definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereTool {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty", alias = "parameterDefinitions")]
    pub parameter_definitions: BTreeMap<String, CohereParameterDefinition>,
}

/// Parameter of a tool definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohereParameterDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Python-style type name (`str`, `int`, `float`, `bool`, `list`, `dict`)
    #[serde(rename = "type")]
    pub parameter_type: String,
    #[serde(default)]
    pub required: bool,
}

/// Tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohereToolCall {
    pub name: String,
    #[serde(default)]
    pub parameters: serde_json::Value,
}

/// Outputs of one tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CohereToolResult {
    pub call: CohereToolCall,
    pub outputs: Vec<serde_json::Value>,
}

// -- Response types --

/// Chat response
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohereResponse {
    #[serde(default, alias = "responseId")]
    pub response_id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, alias = "generationId")]
    pub generation_id: Option<String>,
    /// `COMPLETE`, `MAX_TOKENS`, `ERROR`, `ERROR_TOXIC`, ...
    #[serde(default, alias = "finishReason")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "toolCalls")]
    pub tool_calls: Option<Vec<CohereToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<CohereMeta>,
}

/// Response metadata
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CohereMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens: Option<CohereTokens>,
    #[serde(default, skip_serializing_if = "Option::is_none", alias = "billedUnits")]
    pub billed_units: Option<CohereTokens>,
}

impl CohereMeta {
    /// Token counts, preferring `tokens` over `billed_units`
    pub fn token_counts(&self) -> Option<CohereTokens> {
        self.tokens.or(self.billed_units)
    }
}

/// Token counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CohereTokens {
    #[serde(default, alias = "inputTokens")]
    pub input_tokens: f64,
    #[serde(default, alias = "outputTokens")]
    pub output_tokens: f64,
}

// -- Streaming types --

/// NDJSON stream event, discriminated by `event_type`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "kebab-case")]
pub enum CohereStreamEvent {
    StreamStart {
        #[serde(default, alias = "generationId")]
        generation_id: Option<String>,
    },
    TextGeneration {
        text: String,
    },
    /// Incremental tool call, name first then parameter fragments
    ToolCallsChunk {
        #[serde(default, alias = "toolCallDelta")]
        tool_call_delta: Option<CohereToolCallDelta>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    /// Complete tool calls, after all chunks
    ToolCallsGeneration {
        #[serde(default, alias = "toolCalls")]
        tool_calls: Vec<CohereToolCall>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text: Option<String>,
    },
    StreamEnd {
        #[serde(default, alias = "finishReason")]
        finish_reason: Option<String>,
        #[serde(default)]
        response: Option<CohereResponse>,
    },
    /// Search, citation and other events this gateway does not translate
    #[serde(other)]
    Other,
}

/// Partial tool call in a `tool-calls-chunk` event
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CohereToolCallDelta {
    #[serde(default)]
    pub index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Fragment of the parameters JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<String>,
}

// -- Error response --

/// Error response body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CohereErrorResponse {
    pub message: String,
}
