//! Conversion between the `OpenAI` contract and the Anthropic Messages API

use crate::protocol::anthropic::{
    AnthropicContent, AnthropicContentBlock, AnthropicImageSource, AnthropicMessage, AnthropicRequest,
    AnthropicResponse, AnthropicResponseBlock, AnthropicTool, AnthropicToolChoice, AnthropicToolResultContent,
};
use crate::protocol::openai::{
    OpenAiChoice, OpenAiChoiceMessage, OpenAiContent, OpenAiContentPart, OpenAiMessage, OpenAiRequest,
    OpenAiResponse, OpenAiStop, OpenAiToolCall, OpenAiUsage,
};
use crate::types::Role;

/// Default max tokens when not specified (Anthropic requires this field)
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

// -- Request: OpenAI -> Anthropic --

impl From<&OpenAiRequest> for AnthropicRequest {
    fn from(req: &OpenAiRequest) -> Self {
        let mut system_parts = Vec::new();
        let mut messages: Vec<AnthropicMessage> = Vec::new();

        for msg in &req.messages {
            match Role::from_wire(&msg.role) {
                Role::System => {
                    let text = msg.content.as_ref().map(OpenAiContent::as_text).unwrap_or_default();
                    if !text.is_empty() {
                        system_parts.push(text);
                    }
                }
                Role::Tool => push_tool_result(&mut messages, msg),
                Role::Assistant => messages.push(assistant_message(msg)),
                Role::User => messages.push(AnthropicMessage {
                    role: "user".to_owned(),
                    content: user_content(msg.content.as_ref()),
                }),
            }
        }

        let tools = req.tools.as_ref().map(|tools| {
            tools
                .iter()
                .filter_map(|tool| tool.function.as_ref())
                .map(|function| AnthropicTool {
                    name: function.name.clone(),
                    description: function.description.clone(),
                    input_schema: function
                        .parameters
                        .clone()
                        .unwrap_or_else(|| serde_json::json!({"type": "object"})),
                })
                .collect()
        });

        Self {
            model: req.model.clone(),
            max_tokens: req.max_output_tokens().unwrap_or(DEFAULT_MAX_TOKENS),
            system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
            messages,
            temperature: req.temperature,
            top_p: req.top_p,
            stop_sequences: req.stop.clone().map(OpenAiStop::into_vec),
            stream: req.stream.filter(|stream| *stream),
            tools,
            tool_choice: req.tool_choice.as_ref().and_then(tool_choice),
        }
    }
}

/// Append a tool result, merging into the previous turn when it also
/// carries only tool results
fn push_tool_result(messages: &mut Vec<AnthropicMessage>, msg: &OpenAiMessage) {
    let block = AnthropicContentBlock::ToolResult {
        tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
        content: msg.content.as_ref().map(tool_result_content),
        is_error: None,
    };

    if let Some(last) = messages.last_mut()
        && last.role == "user"
        && let AnthropicContent::Blocks(blocks) = &mut last.content
        && blocks
            .iter()
            .all(|b| matches!(b, AnthropicContentBlock::ToolResult { .. }))
    {
        blocks.push(block);
        return;
    }

    messages.push(AnthropicMessage {
        role: "user".to_owned(),
        content: AnthropicContent::Blocks(vec![block]),
    });
}

fn tool_result_content(content: &OpenAiContent) -> AnthropicToolResultContent {
    match content {
        OpenAiContent::Text(text) => AnthropicToolResultContent::Text(text.clone()),
        OpenAiContent::Parts(parts) => AnthropicToolResultContent::Blocks(parts.iter().filter_map(content_block).collect()),
    }
}

fn assistant_message(msg: &OpenAiMessage) -> AnthropicMessage {
    let text = msg.content.as_ref().map(OpenAiContent::as_text).unwrap_or_default();

    let content = match &msg.tool_calls {
        Some(tool_calls) if !tool_calls.is_empty() => {
            let mut blocks = Vec::with_capacity(tool_calls.len() + 1);
            if !text.is_empty() {
                blocks.push(AnthropicContentBlock::Text { text });
            }
            blocks.extend(tool_calls.iter().map(|call| AnthropicContentBlock::ToolUse {
                id: call.id.clone(),
                name: call.function.name.clone(),
                input: super::parse_arguments(&call.function.arguments),
            }));
            AnthropicContent::Blocks(blocks)
        }
        _ => AnthropicContent::Text(text),
    };

    AnthropicMessage {
        role: "assistant".to_owned(),
        content,
    }
}

fn user_content(content: Option<&OpenAiContent>) -> AnthropicContent {
    match content {
        None => AnthropicContent::Text(String::new()),
        Some(OpenAiContent::Text(text)) => AnthropicContent::Text(text.clone()),
        Some(OpenAiContent::Parts(parts)) => AnthropicContent::Blocks(parts.iter().filter_map(content_block).collect()),
    }
}

/// Parts Anthropic has no block for are dropped
fn content_block(part: &OpenAiContentPart) -> Option<AnthropicContentBlock> {
    let block = match part {
        OpenAiContentPart::Text { text } => AnthropicContentBlock::Text { text: text.clone() },
        OpenAiContentPart::ImageUrl { image_url } => {
            let source = match super::split_data_uri(&image_url.url) {
                Some((media_type, data)) => AnthropicImageSource::Base64 {
                    media_type: media_type.to_owned(),
                    data: data.to_owned(),
                },
                None => AnthropicImageSource::Url {
                    url: image_url.url.clone(),
                },
            };
            AnthropicContentBlock::Image { source }
        }
        OpenAiContentPart::Image { data, mime_type } => AnthropicContentBlock::Image {
            source: AnthropicImageSource::Base64 {
                media_type: mime_type.clone().unwrap_or_else(|| "image/png".to_owned()),
                data: data.clone(),
            },
        },
        OpenAiContentPart::Other(_) => return None,
    };
    Some(block)
}

/// Map an `OpenAI` `tool_choice` onto Anthropic's
fn tool_choice(choice: &serde_json::Value) -> Option<AnthropicToolChoice> {
    let choice_type = |choice_type: &str| AnthropicToolChoice {
        choice_type: choice_type.to_owned(),
        name: None,
    };

    match choice {
        serde_json::Value::String(mode) => match mode.as_str() {
            "auto" => Some(choice_type("auto")),
            "required" => Some(choice_type("any")),
            "none" => Some(choice_type("none")),
            _ => None,
        },
        serde_json::Value::Object(object) => object
            .get("function")
            .and_then(|function| function.get("name"))
            .and_then(serde_json::Value::as_str)
            .map(|name| AnthropicToolChoice {
                choice_type: "tool".to_owned(),
                name: Some(name.to_owned()),
            }),
        _ => None,
    }
}

// -- Response: Anthropic -> OpenAI --

/// Map an Anthropic stop reason to an `OpenAI` finish reason
pub fn finish_reason(stop_reason: &str) -> &'static str {
    match stop_reason {
        "max_tokens" => "length",
        "tool_use" => "tool_calls",
        "refusal" => "content_filter",
        _ => "stop",
    }
}

impl From<&AnthropicResponse> for OpenAiResponse {
    fn from(resp: &AnthropicResponse) -> Self {
        let mut text = String::new();
        let mut tool_calls = Vec::new();

        for block in &resp.content {
            match block {
                AnthropicResponseBlock::Text { text: fragment } => text.push_str(fragment),
                AnthropicResponseBlock::ToolUse { id, name, input } => {
                    let arguments = serde_json::to_string(input).unwrap_or_else(|_| "{}".to_owned());
                    tool_calls.push(OpenAiToolCall::function(id.clone(), name.clone(), arguments));
                }
                AnthropicResponseBlock::Unknown => {}
            }
        }

        let content = if text.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(text)
        };

        Self {
            id: resp.id.clone(),
            object: "chat.completion".to_owned(),
            created: super::now_secs(),
            model: resp.model.clone(),
            choices: vec![OpenAiChoice {
                index: 0,
                message: OpenAiChoiceMessage::assistant(content, (!tool_calls.is_empty()).then_some(tool_calls)),
                finish_reason: Some(finish_reason(resp.stop_reason.as_deref().unwrap_or("end_turn")).to_owned()),
            }],
            usage: Some(OpenAiUsage {
                prompt_tokens: resp.usage.input_tokens,
                completion_tokens: resp.usage.output_tokens,
                total_tokens: resp.usage.input_tokens.saturating_add(resp.usage.output_tokens),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(value: serde_json::Value) -> OpenAiRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn hoists_system_and_defaults_max_tokens() {
        let req = request(serde_json::json!({
            "model": "claude-sonnet-4-5",
            "messages": [
                {"role": "system", "content": "be brief"},
                {"role": "developer", "content": "use metric units"},
                {"role": "user", "content": "hi"}
            ],
            "stop": "END"
        }));

        let out = AnthropicRequest::from(&req);

        assert_eq!(out.system.as_deref(), Some("be brief\n\nuse metric units"));
        assert_eq!(out.max_tokens, DEFAULT_MAX_TOKENS);
        assert_eq!(out.messages.len(), 1);
        assert_eq!(out.stop_sequences, Some(vec!["END".to_owned()]));
        assert!(out.stream.is_none());
    }

    #[test]
    fn merges_consecutive_tool_results() {
        let req = request(serde_json::json!({
            "model": "claude-sonnet-4-5",
            "max_completion_tokens": 100,
            "messages": [
                {"role": "user", "content": "weather in both?"},
                {"role": "assistant", "content": null, "tool_calls": [
                    {"id": "toolu_1", "type": "function", "function": {"name": "weather", "arguments": "{\"city\":\"Oslo\"}"}},
                    {"id": "toolu_2", "type": "function", "function": {"name": "weather", "arguments": "{\"city\":"}}
                ]},
                {"role": "tool", "tool_call_id": "toolu_1", "content": "cold"},
                {"role": "tool", "tool_call_id": "toolu_2", "content": "warm"}
            ]
        }));

        let out = AnthropicRequest::from(&req);

        assert_eq!(out.max_tokens, 100);
        assert_eq!(out.messages.len(), 3);

        let AnthropicContent::Blocks(assistant) = &out.messages[1].content else {
            panic!("expected blocks");
        };
        assert_eq!(
            assistant[1],
            AnthropicContentBlock::ToolUse {
                id: "toolu_2".to_owned(),
                name: "weather".to_owned(),
                input: serde_json::json!({}),
            }
        );

        let AnthropicContent::Blocks(results) = &out.messages[2].content else {
            panic!("expected blocks");
        };
        assert_eq!(out.messages[2].role, "user");
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn image_parts_become_base64_sources() {
        let req = request(serde_json::json!({
            "model": "claude-sonnet-4-5",
            "messages": [
                {"role": "assistant", "tool_calls": [{"id": "t1", "type": "function", "function": {"name": "shot", "arguments": "{}"}}]},
                {"role": "tool", "tool_call_id": "t1", "content": [
                    {"type": "text", "text": "page"},
                    {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,aGk="}}
                ]}
            ]
        }));

        let out = AnthropicRequest::from(&req);
        let AnthropicContent::Blocks(blocks) = &out.messages[1].content else {
            panic!("expected blocks");
        };
        let AnthropicContentBlock::ToolResult {
            content: Some(AnthropicToolResultContent::Blocks(content)),
            ..
        } = &blocks[0]
        else {
            panic!("expected tool result blocks");
        };
        assert_eq!(
            content[1],
            AnthropicContentBlock::Image {
                source: AnthropicImageSource::Base64 {
                    media_type: "image/jpeg".to_owned(),
                    data: "aGk=".to_owned(),
                },
            }
        );
    }

    #[test]
    fn drops_parts_without_an_anthropic_block() {
        let req = request(serde_json::json!({
            "model": "claude-sonnet-4-5",
            "messages": [
                {"role": "user", "content": [
                    {"type": "text", "text": "listen"},
                    {"type": "input_audio", "input_audio": {"data": "UklGRg==", "format": "wav"}}
                ]},
                {"role": "assistant", "tool_calls": [{"id": "t1", "type": "function", "function": {"name": "read", "arguments": "{}"}}]},
                {"role": "tool", "tool_call_id": "t1", "content": [
                    {"type": "text", "text": "ok"},
                    {"type": "resource", "resource": {"uri": "file:///a.txt", "text": "a"}}
                ]}
            ]
        }));

        let out = AnthropicRequest::from(&req);

        assert_eq!(
            out.messages[0].content,
            AnthropicContent::Blocks(vec![AnthropicContentBlock::Text {
                text: "listen".to_owned()
            }])
        );
        let AnthropicContent::Blocks(blocks) = &out.messages[2].content else {
            panic!("expected blocks");
        };
        let AnthropicContentBlock::ToolResult {
            content: Some(AnthropicToolResultContent::Blocks(content)),
            ..
        } = &blocks[0]
        else {
            panic!("expected tool result blocks");
        };
        assert_eq!(content, &[AnthropicContentBlock::Text { text: "ok".to_owned() }]);
    }

    #[test]
    fn maps_tool_choice() {
        assert_eq!(tool_choice(&serde_json::json!("required")).unwrap().choice_type, "any");
        assert_eq!(
            tool_choice(&serde_json::json!({"type": "function", "function": {"name": "search"}})),
            Some(AnthropicToolChoice {
                choice_type: "tool".to_owned(),
                name: Some("search".to_owned()),
            })
        );
        assert!(tool_choice(&serde_json::json!(42)).is_none());
    }

    #[test]
    fn converts_tool_use_response() {
        let resp: AnthropicResponse = serde_json::from_value(serde_json::json!({
            "id": "msg_1",
            "type": "message",
            "role": "assistant",
            "model": "claude-sonnet-4-5",
            "content": [{"type": "tool_use", "id": "toolu_1", "name": "search", "input": {"q": "rust"}}],
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
        .unwrap();

        let out = OpenAiResponse::from(&resp);
        let choice = &out.choices[0];

        assert_eq!(choice.finish_reason.as_deref(), Some("tool_calls"));
        assert!(choice.message.content.is_none());
        let calls = choice.message.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.arguments, r#"{"q":"rust"}"#);
        assert_eq!(out.usage.unwrap().total_tokens, 15);
    }
}
