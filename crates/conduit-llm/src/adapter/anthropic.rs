//! Adapters for the Anthropic Messages API

use crate::convert::anthropic::finish_reason;
use crate::protocol::anthropic::{
    AnthropicRequest, AnthropicResponse, AnthropicResponseBlock, AnthropicStreamContentBlock, AnthropicStreamDelta,
    AnthropicStreamEvent, AnthropicUsage,
};
use crate::protocol::openai::{
    OpenAiRequest, OpenAiResponse, OpenAiStreamDelta, OpenAiStreamFunctionCall, OpenAiStreamToolCall,
};
use crate::types::{CanonicalToolCall, ChunkProcessingResult, StreamAccumulatorState, UsageView};

use super::{AdapterContext, MaterializedRequest, RequestAdapter, ResponseAdapter, StagedRequest, StreamAdapter, sse};

// -- Request --

#[derive(Debug, Clone)]
pub struct AnthropicRequestAdapter {
    staged: StagedRequest,
}

impl AnthropicRequestAdapter {
    pub fn new(request: OpenAiRequest, context: AdapterContext) -> Self {
        Self {
            staged: StagedRequest::new(request, context),
        }
    }
}

impl RequestAdapter for AnthropicRequestAdapter {
    type ProviderRequest = AnthropicRequest;

    fn staged(&self) -> &StagedRequest {
        &self.staged
    }

    fn staged_mut(&mut self) -> &mut StagedRequest {
        &mut self.staged
    }

    fn to_provider_request(&self) -> MaterializedRequest<AnthropicRequest> {
        let (request, compression) = self.staged.prepare();
        MaterializedRequest {
            request: AnthropicRequest::from(&request),
            compression,
        }
    }
}

// -- Response --

#[derive(Debug, Clone)]
pub struct AnthropicResponseAdapter {
    response: AnthropicResponse,
}

impl AnthropicResponseAdapter {
    pub const fn new(response: AnthropicResponse) -> Self {
        Self { response }
    }
}

impl ResponseAdapter for AnthropicResponseAdapter {
    type ProviderResponse = AnthropicResponse;

    fn get_id(&self) -> &str {
        &self.response.id
    }

    fn get_model(&self) -> &str {
        &self.response.model
    }

    fn get_text(&self) -> String {
        self.response
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicResponseBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn get_tool_calls(&self) -> Vec<CanonicalToolCall> {
        self.response
            .content
            .iter()
            .filter_map(|block| match block {
                AnthropicResponseBlock::ToolUse { id, name, input } => Some(CanonicalToolCall {
                    id: id.clone(),
                    name: name.clone(),
                    arguments: if input.is_object() {
                        input.clone()
                    } else {
                        serde_json::json!({})
                    },
                    is_error: false,
                }),
                _ => None,
            })
            .collect()
    }

    fn get_usage(&self) -> UsageView {
        UsageView::new(self.response.usage.input_tokens, self.response.usage.output_tokens)
    }

    fn get_original_response(&self) -> &AnthropicResponse {
        &self.response
    }

    fn to_chat_completion(&self) -> OpenAiResponse {
        OpenAiResponse::from(&self.response)
    }
}

// -- Stream --

/// Accumulates an Anthropic event stream
///
/// Tool calls are keyed by content block index. The native stop reason is
/// kept alongside the mapped one so the native response can be rebuilt.
#[derive(Debug)]
pub struct AnthropicStreamAdapter {
    state: StreamAccumulatorState<AnthropicStreamEvent>,
    native_stop_reason: Option<String>,
    stop_sequence: Option<String>,
}

impl Default for AnthropicStreamAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl AnthropicStreamAdapter {
    pub fn new() -> Self {
        Self {
            state: StreamAccumulatorState::new(),
            native_stop_reason: None,
            stop_sequence: None,
        }
    }

    fn merge_usage(&mut self, usage: AnthropicUsage) {
        let current = self.state.usage.unwrap_or_default();
        self.state.usage = Some(UsageView::new(
            current.input_tokens.max(usage.input_tokens),
            current.output_tokens.max(usage.output_tokens),
        ));
    }

    /// Downstream position of the tool call opened at `block_index`
    fn tool_position(&self, block_index: u32) -> Option<u32> {
        self.state
            .tool_calls
            .iter()
            .position(|call| call.index == block_index)
            .and_then(|position| u32::try_from(position).ok())
    }

    fn replay(&self, event: &AnthropicStreamEvent) -> Option<String> {
        let tool_call = match event {
            AnthropicStreamEvent::ContentBlockStart {
                index,
                content_block: AnthropicStreamContentBlock::ToolUse { id, name, .. },
            } => OpenAiStreamToolCall {
                index: self.tool_position(*index)?,
                id: Some(id.clone()),
                tool_type: Some("function".to_owned()),
                function: Some(OpenAiStreamFunctionCall {
                    name: Some(name.clone()),
                    arguments: Some(String::new()),
                }),
            },
            AnthropicStreamEvent::ContentBlockDelta {
                index,
                delta: AnthropicStreamDelta::InputJsonDelta { partial_json },
            } => OpenAiStreamToolCall {
                index: self.tool_position(*index)?,
                id: None,
                tool_type: None,
                function: Some(OpenAiStreamFunctionCall {
                    name: None,
                    arguments: Some(partial_json.clone()),
                }),
            },
            _ => return None,
        };

        let delta = OpenAiStreamDelta {
            tool_calls: Some(vec![tool_call]),
            ..OpenAiStreamDelta::default()
        };
        Some(sse::data(&sse::chunk(&self.state, delta, None)))
    }
}

impl StreamAdapter for AnthropicStreamAdapter {
    type Chunk = AnthropicStreamEvent;
    type ProviderResponse = AnthropicResponse;

    fn state(&self) -> &StreamAccumulatorState<AnthropicStreamEvent> {
        &self.state
    }

    fn process_chunk(&mut self, event: AnthropicStreamEvent) -> ChunkProcessingResult {
        self.state.record_chunk();
        let mut result = ChunkProcessingResult::default();

        match &event {
            AnthropicStreamEvent::MessageStart { message } => {
                self.state.response_id.clone_from(&message.id);
                self.state.model.clone_from(&message.model);
                if let Some(usage) = message.usage {
                    self.merge_usage(usage);
                }
            }
            AnthropicStreamEvent::ContentBlockStart { index, content_block } => match content_block {
                AnthropicStreamContentBlock::Text { text } if !text.is_empty() => {
                    self.state.text.push_str(text);
                    result.sse_data = Some(self.format_text_delta_sse(text));
                }
                AnthropicStreamContentBlock::ToolUse { id, name, .. } => {
                    let slot = self.state.tool_call_slot(*index);
                    slot.id.clone_from(id);
                    slot.name.clone_from(name);
                    result.is_tool_call_chunk = true;
                }
                _ => {}
            },
            AnthropicStreamEvent::ContentBlockDelta { index, delta } => match delta {
                AnthropicStreamDelta::TextDelta { text } => {
                    self.state.text.push_str(text);
                    if !text.is_empty() {
                        result.sse_data = Some(self.format_text_delta_sse(text));
                    }
                }
                AnthropicStreamDelta::InputJsonDelta { partial_json } => {
                    self.state.tool_call_slot(*index).arguments.push_str(partial_json);
                    result.is_tool_call_chunk = true;
                }
                AnthropicStreamDelta::Unknown => {}
            },
            AnthropicStreamEvent::MessageDelta { delta, usage } => {
                if let Some(usage) = usage {
                    self.merge_usage(*usage);
                }
                if let Some(reason) = &delta.stop_reason {
                    self.state.stop_reason = Some(finish_reason(reason).to_owned());
                    self.native_stop_reason = Some(reason.clone());
                    self.stop_sequence.clone_from(&delta.stop_sequence);
                    result.is_final = self.state.finish();
                }
            }
            AnthropicStreamEvent::MessageStop => result.is_final = self.state.finish(),
            AnthropicStreamEvent::Error { error } => {
                tracing::warn!(error_type = %error.error_type, message = %error.message, "anthropic stream error");
                result.sse_data = Some(sse::error(&error.message, &error.error_type));
            }
            AnthropicStreamEvent::ContentBlockStop { .. }
            | AnthropicStreamEvent::Ping
            | AnthropicStreamEvent::Unknown => {}
        }

        if result.is_tool_call_chunk {
            self.state.raw_tool_call_events.push(event);
        }

        result
    }

    fn get_raw_tool_call_events(&self) -> Vec<String> {
        self.state
            .raw_tool_call_events
            .iter()
            .filter_map(|event| self.replay(event))
            .collect()
    }

    fn to_provider_response(&self) -> AnthropicResponse {
        let mut content = Vec::new();
        if !self.state.text.is_empty() {
            content.push(AnthropicResponseBlock::Text {
                text: self.state.text.clone(),
            });
        }
        content.extend(self.state.tool_calls.iter().map(|call| AnthropicResponseBlock::ToolUse {
            id: call.id.clone(),
            name: call.name.clone(),
            input: crate::convert::parse_arguments(&call.arguments),
        }));

        let usage = self.state.usage.unwrap_or_default();
        AnthropicResponse {
            id: self.state.response_id.clone(),
            response_type: "message".to_owned(),
            role: "assistant".to_owned(),
            content,
            model: self.state.model.clone(),
            stop_reason: Some(self.native_stop_reason.clone().unwrap_or_else(|| "end_turn".to_owned())),
            stop_sequence: self.stop_sequence.clone(),
            usage: AnthropicUsage {
                input_tokens: usage.input_tokens,
                output_tokens: usage.output_tokens,
            },
        }
    }
}
