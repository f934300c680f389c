//! Downstream request plus edits waiting to be applied

use std::collections::HashMap;

use crate::protocol::openai::{OpenAiContent, OpenAiMessage, OpenAiRequest};
use crate::types::{CanonicalMessage, CanonicalToolCall, CanonicalToolDefinition, CanonicalToolResult, Role, ToolCompressionStats};

use super::AdapterContext;

/// Name reported for a tool result whose originating call cannot be found
pub const UNKNOWN_TOOL_NAME: &str = "unknown";

/// A downstream request and the edits staged against it
///
/// The original request is never modified. Edits are applied to a copy
/// in [`StagedRequest::prepare`].
#[derive(Debug, Clone)]
pub struct StagedRequest {
    request: OpenAiRequest,
    model_override: Option<String>,
    tool_result_updates: HashMap<String, String>,
    context: AdapterContext,
}

impl StagedRequest {
    pub fn new(request: OpenAiRequest, context: AdapterContext) -> Self {
        Self {
            request,
            model_override: None,
            tool_result_updates: HashMap::new(),
            context,
        }
    }

    // -- Reads --

    /// Target model, honoring a staged override
    pub fn model(&self) -> &str {
        self.model_override.as_deref().unwrap_or(&self.request.model)
    }

    pub const fn original(&self) -> &OpenAiRequest {
        &self.request
    }

    pub fn is_streaming(&self) -> bool {
        self.request.stream == Some(true)
    }

    pub fn messages(&self) -> Vec<CanonicalMessage> {
        self.request
            .messages
            .iter()
            .enumerate()
            .map(|(index, message)| {
                let role = Role::from_wire(&message.role);
                let tool_calls = match role {
                    Role::Tool => self.resolved_tool_call(index, message).map(|call| vec![call]),
                    _ => message.tool_calls.as_ref().map(|calls| {
                        calls
                            .iter()
                            .map(|call| CanonicalToolCall {
                                id: call.id.clone(),
                                name: call.function.name.clone(),
                                arguments: crate::convert::parse_arguments(&call.function.arguments),
                                is_error: false,
                            })
                            .collect()
                    }),
                };
                CanonicalMessage { role, tool_calls }
            })
            .collect()
    }

    pub fn tool_results(&self) -> Vec<CanonicalToolResult> {
        self.request
            .messages
            .iter()
            .enumerate()
            .filter(|(_, message)| message.is_tool())
            .map(|(index, message)| {
                let id = message.tool_call_id.clone().unwrap_or_default();
                CanonicalToolResult {
                    name: resolve_tool_name(&self.request.messages[..index], &id)
                        .unwrap_or(UNKNOWN_TOOL_NAME)
                        .to_owned(),
                    id,
                    content: tool_content_value(message.content.as_ref()),
                    is_error: false,
                }
            })
            .collect()
    }

    /// Function tools offered to the model
    pub fn tools(&self) -> Vec<CanonicalToolDefinition> {
        self.request
            .tools
            .iter()
            .flatten()
            .filter(|tool| tool.tool_type == "function")
            .filter_map(|tool| tool.function.as_ref())
            .map(|function| CanonicalToolDefinition {
                name: function.name.clone(),
                description: function.description.clone(),
                input_schema: function
                    .parameters
                    .clone()
                    .unwrap_or_else(|| serde_json::json!({})),
            })
            .collect()
    }

    fn resolved_tool_call(&self, index: usize, message: &OpenAiMessage) -> Option<CanonicalToolCall> {
        let id = message.tool_call_id.as_deref()?;
        let name = resolve_tool_name(&self.request.messages[..index], id)?;

        Some(CanonicalToolCall {
            id: id.to_owned(),
            name: name.to_owned(),
            arguments: tool_content_value(message.content.as_ref()),
            is_error: false,
        })
    }

    // -- Edits --

    pub fn set_model(&mut self, model: String) {
        self.model_override = Some(model);
    }

    pub fn update_tool_result(&mut self, tool_call_id: String, content: String) {
        self.tool_result_updates.insert(tool_call_id, content);
    }

    pub fn apply_tool_result_updates(&mut self, updates: HashMap<String, String>) {
        self.tool_result_updates.extend(updates);
    }

    // -- Materialization --

    /// Copy of the request with every staged edit and content rule applied
    ///
    /// Order: tool result patches, image policy, compression, model override.
    pub fn prepare(&self) -> (OpenAiRequest, Option<ToolCompressionStats>) {
        let mut request = self.request.clone();
        let model = self.model().to_owned();

        let mut patched = 0usize;
        for message in request.messages.iter_mut().filter(|m| m.is_tool()) {
            if let Some(id) = &message.tool_call_id
                && let Some(content) = self.tool_result_updates.get(id)
            {
                message.content = Some(OpenAiContent::Text(content.clone()));
                patched += 1;
            }
        }

        let images = self.context.policy.apply(&model, &mut request.messages);

        let compression = self
            .context
            .compressor
            .as_ref()
            .map(|compressor| compressor.compress(&mut request.messages, &model));

        request.model = model;

        tracing::debug!(
            model = %request.model,
            messages = request.messages.len(),
            tool_messages = request.messages.iter().filter(|m| m.is_tool()).count(),
            patched,
            images_converted = images.converted,
            images_stripped = images.stripped,
            "materialized provider request"
        );

        (request, compression)
    }
}

/// Name of the call `tool_call_id` answers
///
/// Scans `preceding` from the end and takes the first assistant tool call
/// with a matching id.
pub fn resolve_tool_name<'a>(preceding: &'a [OpenAiMessage], tool_call_id: &str) -> Option<&'a str> {
    preceding
        .iter()
        .rev()
        .filter(|message| Role::from_wire(&message.role) == Role::Assistant)
        .filter_map(|message| message.tool_calls.as_ref())
        .find_map(|calls| calls.iter().find(|call| call.id == tool_call_id))
        .map(|call| call.function.name.as_str())
}

/// Tool message content as JSON
///
/// Text that parses as JSON is returned parsed, other text as a string.
fn tool_content_value(content: Option<&OpenAiContent>) -> serde_json::Value {
    match content {
        None => serde_json::Value::Null,
        Some(OpenAiContent::Text(text)) => {
            serde_json::from_str(text).unwrap_or_else(|_| serde_json::Value::String(text.clone()))
        }
        Some(OpenAiContent::Parts(parts)) => serde_json::to_value(parts).unwrap_or(serde_json::Value::Null),
    }
}
