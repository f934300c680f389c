//! Conversion between the `OpenAI` contract and Cohere Chat (v1)
//!
//! Cohere takes the latest turn as `message` and everything before it as
//! `chat_history`. Tool results answering the previous chatbot turn travel
//! in `tool_results` instead of a message.

use std::collections::BTreeMap;

use crate::protocol::cohere::{
    CohereChatMessage, CohereParameterDefinition, CohereRequest, CohereResponse, CohereRole, CohereTool,
    CohereToolCall, CohereToolResult, CohereTokens,
};
use crate::protocol::openai::{
    OpenAiChoice, OpenAiChoiceMessage, OpenAiContent, OpenAiMessage, OpenAiRequest, OpenAiResponse, OpenAiStop,
    OpenAiTool, OpenAiToolCall, OpenAiUsage,
};
use crate::types::{Role, UsageView};

/// Sampling temperature sent when the caller does not set one
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Id returned when Cohere omits a generation id
pub const UNKNOWN_ID: &str = "unknown";

/// Model reported back downstream; Cohere responses do not echo it
pub const RESPONSE_MODEL: &str = "cohere-model";

// -- Request: OpenAI -> Cohere --

impl From<&OpenAiRequest> for CohereRequest {
    fn from(req: &OpenAiRequest) -> Self {
        let trailing_tools = req.messages.iter().rev().take_while(|m| m.is_tool()).count();
        let split = req.messages.len() - trailing_tools;
        let (head, tail) = req.messages.split_at(split);

        let (message, history) = if tail.is_empty() {
            match head.split_last() {
                Some((last, rest)) => (message_text(last), rest),
                None => (String::new(), head),
            }
        } else {
            (String::new(), head)
        };

        let tool_results: Vec<_> = tail
            .iter()
            .map(|msg| tool_result(&req.messages[..split], msg))
            .collect();

        Self {
            message,
            model: req.model.clone(),
            chat_history: history
                .iter()
                .enumerate()
                .map(|(i, msg)| history_entry(&history[..i], msg))
                .collect(),
            temperature: Some(req.temperature.unwrap_or(DEFAULT_TEMPERATURE)),
            max_tokens: req.max_output_tokens(),
            p: req.top_p,
            stop_sequences: req.stop.clone().map(OpenAiStop::into_vec),
            seed: req.seed,
            frequency_penalty: req.frequency_penalty,
            presence_penalty: req.presence_penalty,
            stream: req.stream.filter(|stream| *stream),
            tools: req
                .tools
                .as_ref()
                .map(|tools| tools.iter().filter_map(cohere_tool).collect::<Vec<_>>())
                .filter(|tools| !tools.is_empty()),
            tool_results: (!tool_results.is_empty()).then_some(tool_results),
        }
    }
}

fn message_text(msg: &OpenAiMessage) -> String {
    msg.content.as_ref().map(OpenAiContent::as_text).unwrap_or_default()
}

fn history_entry(preceding: &[OpenAiMessage], msg: &OpenAiMessage) -> CohereChatMessage {
    let role = match Role::from_wire(&msg.role) {
        Role::System => CohereRole::System,
        Role::User => CohereRole::User,
        Role::Assistant => CohereRole::Chatbot,
        Role::Tool => CohereRole::Tool,
    };

    let tool_calls = msg.tool_calls.as_ref().map(|calls| {
        calls
            .iter()
            .map(|call| CohereToolCall {
                name: call.function.name.clone(),
                parameters: super::parse_arguments(&call.function.arguments),
            })
            .collect()
    });

    let tool_results = (role == CohereRole::Tool).then(|| vec![tool_result(preceding, msg)]);

    CohereChatMessage {
        role,
        message: if role == CohereRole::Tool { String::new() } else { message_text(msg) },
        tool_calls,
        tool_results,
    }
}

/// Pair a tool message with the call it answers
fn tool_result(preceding: &[OpenAiMessage], msg: &OpenAiMessage) -> CohereToolResult {
    let call = msg
        .tool_call_id
        .as_deref()
        .and_then(|id| find_tool_call(preceding, id))
        .map_or_else(
            || CohereToolCall {
                name: "unknown".to_owned(),
                parameters: serde_json::json!({}),
            },
            |call| CohereToolCall {
                name: call.function.name.clone(),
                parameters: super::parse_arguments(&call.function.arguments),
            },
        );

    CohereToolResult {
        call,
        outputs: tool_outputs(&message_text(msg)),
    }
}

fn find_tool_call<'a>(preceding: &'a [OpenAiMessage], id: &str) -> Option<&'a OpenAiToolCall> {
    preceding
        .iter()
        .rev()
        .filter_map(|m| m.tool_calls.as_ref())
        .flatten()
        .find(|call| call.id == id)
}

/// Cohere wants a list of objects per tool result
fn tool_outputs(content: &str) -> Vec<serde_json::Value> {
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(value @ serde_json::Value::Object(_)) => vec![value],
        Ok(serde_json::Value::Array(items)) if items.iter().all(serde_json::Value::is_object) && !items.is_empty() => {
            items
        }
        _ => vec![serde_json::json!({ "result": content })],
    }
}

fn cohere_tool(tool: &OpenAiTool) -> Option<CohereTool> {
    let function = tool.function.as_ref()?;
    let schema = function.parameters.as_ref();

    let required: Vec<&str> = schema
        .and_then(|s| s.get("required"))
        .and_then(serde_json::Value::as_array)
        .map(|names| names.iter().filter_map(serde_json::Value::as_str).collect())
        .unwrap_or_default();

    let parameter_definitions: BTreeMap<_, _> = schema
        .and_then(|s| s.get("properties"))
        .and_then(serde_json::Value::as_object)
        .map(|properties| {
            properties
                .iter()
                .map(|(name, property)| {
                    let definition = CohereParameterDefinition {
                        description: property
                            .get("description")
                            .and_then(serde_json::Value::as_str)
                            .map(str::to_owned),
                        parameter_type: python_type(property.get("type").and_then(serde_json::Value::as_str)).to_owned(),
                        required: required.contains(&name.as_str()),
                    };
                    (name.clone(), definition)
                })
                .collect()
        })
        .unwrap_or_default();

    Some(CohereTool {
        name: function.name.clone(),
        description: function.description.clone().unwrap_or_default(),
        parameter_definitions,
    })
}

fn python_type(json_type: Option<&str>) -> &'static str {
    match json_type {
        Some("integer") => "int",
        Some("number") => "float",
        Some("boolean") => "bool",
        Some("array") => "list",
        Some("object") => "dict",
        _ => "str",
    }
}

// -- Response: Cohere -> OpenAI --

/// Stable id for a tool call Cohere did not assign one to
pub fn synthetic_call_id(generation_id: Option<&str>, index: usize) -> String {
    match generation_id {
        Some(generation_id) if !generation_id.is_empty() => format!("call_{generation_id}_{index}"),
        _ => format!("call_{index}"),
    }
}

/// Map a Cohere finish reason to an `OpenAI` finish reason
pub fn finish_reason(finish_reason: Option<&str>, has_tool_calls: bool) -> &'static str {
    match finish_reason {
        None | Some("COMPLETE") if has_tool_calls => "tool_calls",
        None | Some("COMPLETE") => "stop",
        Some("ERROR_TOXIC") => "content_filter",
        Some(_) => "length",
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn usage(tokens: Option<CohereTokens>) -> UsageView {
    tokens.map_or_else(UsageView::default, |tokens| {
        UsageView::new(tokens.input_tokens.max(0.0) as u32, tokens.output_tokens.max(0.0) as u32)
    })
}

/// Tool calls of a response in the `OpenAI` shape
pub fn tool_calls(resp: &CohereResponse) -> Vec<OpenAiToolCall> {
    resp.tool_calls
        .iter()
        .flatten()
        .enumerate()
        .map(|(index, call)| {
            let arguments = serde_json::to_string(&call.parameters).unwrap_or_else(|_| "{}".to_owned());
            OpenAiToolCall::function(
                synthetic_call_id(resp.generation_id.as_deref(), index),
                call.name.clone(),
                arguments,
            )
        })
        .collect()
}

impl From<&CohereResponse> for OpenAiResponse {
    fn from(resp: &CohereResponse) -> Self {
        let tool_calls = tool_calls(resp);
        let has_tool_calls = !tool_calls.is_empty();
        let usage = usage(resp.meta.and_then(|meta| meta.token_counts()));
        let content = if resp.text.is_empty() && has_tool_calls {
            None
        } else {
            Some(resp.text.clone())
        };

        Self {
            id: resp.generation_id.clone().unwrap_or_else(|| UNKNOWN_ID.to_owned()),
            object: "chat.completion".to_owned(),
            created: super::now_secs(),
            model: RESPONSE_MODEL.to_owned(),
            choices: vec![OpenAiChoice {
                index: 0,
                message: OpenAiChoiceMessage::assistant(content, has_tool_calls.then_some(tool_calls)),
                finish_reason: Some(finish_reason(resp.finish_reason.as_deref(), has_tool_calls).to_owned()),
            }],
            usage: Some(OpenAiUsage {
                prompt_tokens: usage.input_tokens,
                completion_tokens: usage.output_tokens,
                total_tokens: usage.total(),
            }),
        }
    }
}
