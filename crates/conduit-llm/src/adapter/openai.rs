//! Adapters for OpenAI-compatible providers
//!
//! The native format is the downstream format, so requests pass through
//! after staging and streamed text chunks are forwarded verbatim.

use crate::protocol::openai::{
    OpenAiChoice, OpenAiChoiceMessage, OpenAiRequest, OpenAiResponse, OpenAiStreamChunk, OpenAiToolCall,
};
use crate::types::{CanonicalToolCall, ChunkProcessingResult, StreamAccumulatorState, UsageView};

use super::{AdapterContext, MaterializedRequest, RequestAdapter, ResponseAdapter, StagedRequest, StreamAdapter, sse};

// -- Request --

#[derive(Debug, Clone)]
pub struct OpenAiRequestAdapter {
    staged: StagedRequest,
}

impl OpenAiRequestAdapter {
    pub fn new(request: OpenAiRequest, context: AdapterContext) -> Self {
        Self {
            staged: StagedRequest::new(request, context),
        }
    }
}

impl RequestAdapter for OpenAiRequestAdapter {
    type ProviderRequest = OpenAiRequest;

    fn staged(&self) -> &StagedRequest {
        &self.staged
    }

    fn staged_mut(&mut self) -> &mut StagedRequest {
        &mut self.staged
    }

    fn to_provider_request(&self) -> MaterializedRequest<OpenAiRequest> {
        let (request, compression) = self.staged.prepare();
        MaterializedRequest { request, compression }
    }
}

// -- Response --

#[derive(Debug, Clone)]
pub struct OpenAiResponseAdapter {
    response: OpenAiResponse,
}

impl OpenAiResponseAdapter {
    pub const fn new(response: OpenAiResponse) -> Self {
        Self { response }
    }

    fn message(&self) -> Option<&OpenAiChoiceMessage> {
        self.response.choices.first().map(|choice| &choice.message)
    }
}

impl ResponseAdapter for OpenAiResponseAdapter {
    type ProviderResponse = OpenAiResponse;

    fn get_id(&self) -> &str {
        &self.response.id
    }

    fn get_model(&self) -> &str {
        &self.response.model
    }

    fn get_text(&self) -> String {
        self.message()
            .and_then(|message| message.content.clone())
            .unwrap_or_default()
    }

    fn get_tool_calls(&self) -> Vec<CanonicalToolCall> {
        self.message()
            .and_then(|message| message.tool_calls.as_ref())
            .map(|calls| calls.iter().map(canonical_tool_call).collect())
            .unwrap_or_default()
    }

    fn get_usage(&self) -> UsageView {
        self.response
            .usage
            .map(|usage| UsageView::new(usage.prompt_tokens, usage.completion_tokens))
            .unwrap_or_default()
    }

    fn get_original_response(&self) -> &OpenAiResponse {
        &self.response
    }

    fn to_chat_completion(&self) -> OpenAiResponse {
        self.response.clone()
    }
}

pub fn canonical_tool_call(call: &OpenAiToolCall) -> CanonicalToolCall {
    CanonicalToolCall {
        id: call.id.clone(),
        name: call.function.name.clone(),
        arguments: crate::convert::parse_arguments(&call.function.arguments),
        is_error: false,
    }
}

// -- Stream --

#[derive(Debug)]
pub struct OpenAiStreamAdapter {
    state: StreamAccumulatorState<OpenAiStreamChunk>,
}

impl Default for OpenAiStreamAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl OpenAiStreamAdapter {
    pub fn new() -> Self {
        Self {
            state: StreamAccumulatorState::new(),
        }
    }
}

impl StreamAdapter for OpenAiStreamAdapter {
    type Chunk = OpenAiStreamChunk;
    type ProviderResponse = OpenAiResponse;

    fn state(&self) -> &StreamAccumulatorState<OpenAiStreamChunk> {
        &self.state
    }

    fn process_chunk(&mut self, chunk: OpenAiStreamChunk) -> ChunkProcessingResult {
        self.state.record_chunk();

        if self.state.response_id.is_empty() && !chunk.id.is_empty() {
            self.state.response_id.clone_from(&chunk.id);
        }
        if self.state.model.is_empty() && !chunk.model.is_empty() {
            self.state.model.clone_from(&chunk.model);
        }

        let mut terminal = false;
        if let Some(usage) = chunk.usage {
            self.state.usage = Some(UsageView::new(usage.prompt_tokens, usage.completion_tokens));
            terminal = true;
        }

        let mut text = String::new();
        let mut is_tool_call_chunk = false;

        for choice in &chunk.choices {
            if let Some(content) = &choice.delta.content {
                text.push_str(content);
            }

            for delta in choice.delta.tool_calls.iter().flatten() {
                is_tool_call_chunk = true;
                let slot = self.state.tool_call_slot(delta.index);
                if let Some(id) = delta.id.as_ref().filter(|id| !id.is_empty()) {
                    slot.id.clone_from(id);
                }
                if let Some(function) = &delta.function {
                    if let Some(name) = function.name.as_ref().filter(|name| !name.is_empty()) {
                        slot.name.clone_from(name);
                    }
                    if let Some(arguments) = &function.arguments {
                        slot.arguments.push_str(arguments);
                    }
                }
            }

            if let Some(reason) = &choice.finish_reason {
                self.state.stop_reason = Some(reason.clone());
                terminal = true;
            }
        }

        let sse_data = if text.is_empty() {
            None
        } else if is_tool_call_chunk || terminal {
            Some(self.format_text_delta_sse(&text))
        } else {
            Some(sse::data(&chunk))
        };
        self.state.text.push_str(&text);

        if is_tool_call_chunk {
            self.state.raw_tool_call_events.push(tool_call_only(chunk));
        }

        ChunkProcessingResult {
            sse_data,
            is_tool_call_chunk,
            is_final: terminal && self.state.finish(),
        }
    }

    fn get_raw_tool_call_events(&self) -> Vec<String> {
        self.state.raw_tool_call_events.iter().map(sse::data).collect()
    }

    fn to_provider_response(&self) -> OpenAiResponse {
        let tool_calls: Vec<_> = self
            .state
            .tool_calls
            .iter()
            .map(|call| OpenAiToolCall::function(call.id.clone(), call.name.clone(), call.arguments.clone()))
            .collect();

        let content = if self.state.text.is_empty() && !tool_calls.is_empty() {
            None
        } else {
            Some(self.state.text.clone())
        };

        OpenAiResponse {
            id: self.state.response_id.clone(),
            object: "chat.completion".to_owned(),
            created: crate::convert::now_secs(),
            model: self.state.model.clone(),
            choices: vec![OpenAiChoice {
                index: 0,
                message: OpenAiChoiceMessage::assistant(content, (!tool_calls.is_empty()).then_some(tool_calls)),
                finish_reason: Some(self.state.stop_reason.clone().unwrap_or_else(|| "stop".to_owned())),
            }],
            usage: self.state.usage.map(sse::usage),
        }
    }
}

/// Chunk reduced to its tool-call deltas, for replay after the text
fn tool_call_only(mut chunk: OpenAiStreamChunk) -> OpenAiStreamChunk {
    chunk.usage = None;
    for choice in &mut chunk.choices {
        choice.delta.content = None;
        choice.delta.role = None;
        choice.finish_reason = None;
    }
    chunk
}
