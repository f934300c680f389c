//! Adapters for the Cohere v1 Chat API
//!
//! Cohere does not assign tool call ids, so calls are given synthetic ids
//! derived from the generation id and the call's position.

use crate::convert::cohere::{RESPONSE_MODEL, UNKNOWN_ID, finish_reason, synthetic_call_id, tool_calls, usage};
use crate::protocol::cohere::{
    CohereMeta, CohereRequest, CohereResponse, CohereStreamEvent, CohereTokens, CohereToolCall,
};
use crate::protocol::openai::{
    OpenAiRequest, OpenAiResponse, OpenAiStreamDelta, OpenAiStreamFunctionCall, OpenAiStreamToolCall,
};
use crate::types::{CanonicalToolCall, ChunkProcessingResult, StreamAccumulatorState, UsageView};

use super::{AdapterContext, MaterializedRequest, RequestAdapter, ResponseAdapter, StagedRequest, StreamAdapter, sse};

// -- Request --

#[derive(Debug, Clone)]
pub struct CohereRequestAdapter {
    staged: StagedRequest,
}

impl CohereRequestAdapter {
    pub fn new(request: OpenAiRequest, context: AdapterContext) -> Self {
        Self {
            staged: StagedRequest::new(request, context),
        }
    }
}

impl RequestAdapter for CohereRequestAdapter {
    type ProviderRequest = CohereRequest;

    fn staged(&self) -> &StagedRequest {
        &self.staged
    }

    fn staged_mut(&mut self) -> &mut StagedRequest {
        &mut self.staged
    }

    fn to_provider_request(&self) -> MaterializedRequest<CohereRequest> {
        let (request, compression) = self.staged.prepare();
        MaterializedRequest {
            request: CohereRequest::from(&request),
            compression,
        }
    }
}

// -- Response --

#[derive(Debug, Clone)]
pub struct CohereResponseAdapter {
    response: CohereResponse,
}

impl CohereResponseAdapter {
    pub const fn new(response: CohereResponse) -> Self {
        Self { response }
    }
}

impl ResponseAdapter for CohereResponseAdapter {
    type ProviderResponse = CohereResponse;

    fn get_id(&self) -> &str {
        self.response.generation_id.as_deref().unwrap_or(UNKNOWN_ID)
    }

    fn get_model(&self) -> &str {
        RESPONSE_MODEL
    }

    fn get_text(&self) -> String {
        self.response.text.clone()
    }

    fn get_tool_calls(&self) -> Vec<CanonicalToolCall> {
        tool_calls(&self.response)
            .iter()
            .map(super::openai::canonical_tool_call)
            .collect()
    }

    fn get_usage(&self) -> UsageView {
        usage(self.response.meta.and_then(|meta| meta.token_counts()))
    }

    fn get_original_response(&self) -> &CohereResponse {
        &self.response
    }

    fn to_chat_completion(&self) -> OpenAiResponse {
        OpenAiResponse::from(&self.response)
    }
}

// -- Stream --

#[derive(Debug)]
pub struct CohereStreamAdapter {
    state: StreamAccumulatorState<CohereStreamEvent>,
    native_finish_reason: Option<String>,
}

impl Default for CohereStreamAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl CohereStreamAdapter {
    pub fn new() -> Self {
        Self {
            state: StreamAccumulatorState::new(),
            native_finish_reason: None,
        }
    }

    fn generation_id(&self) -> Option<&str> {
        Some(self.state.response_id.as_str()).filter(|id| !id.is_empty())
    }

    /// Slot for the call at `index`, given its synthetic id on creation
    fn slot(&mut self, index: u32) -> &mut crate::types::AccumulatedToolCall {
        let position = self
            .state
            .tool_calls
            .iter()
            .position(|call| call.index == index)
            .unwrap_or(self.state.tool_calls.len());
        let id = synthetic_call_id(self.generation_id(), position);

        let slot = self.state.tool_call_slot(index);
        if slot.id.is_empty() {
            slot.id = id;
        }
        slot
    }

    /// Recompute synthetic ids once the generation id is known
    ///
    /// Held tool call chunks are only replayed after the stream ends, so
    /// no earlier id has reached the caller.
    fn rederive_call_ids(&mut self) {
        let generation_id = self.generation_id().map(str::to_owned);
        for (position, call) in self.state.tool_calls.iter_mut().enumerate() {
            call.id = synthetic_call_id(generation_id.as_deref(), position);
        }
    }

    fn position(&self, index: u32) -> Option<u32> {
        self.state
            .tool_calls
            .iter()
            .position(|call| call.index == index)
            .and_then(|position| u32::try_from(position).ok())
    }

    fn tool_chunk(&self, tool_calls: Vec<OpenAiStreamToolCall>) -> String {
        let delta = OpenAiStreamDelta {
            tool_calls: Some(tool_calls),
            ..OpenAiStreamDelta::default()
        };
        sse::data(&sse::chunk(&self.state, delta, None))
    }

    fn replay(&self, event: &CohereStreamEvent) -> Option<String> {
        match event {
            CohereStreamEvent::ToolCallsChunk {
                tool_call_delta: Some(delta),
                ..
            } => {
                let index = delta.index.unwrap_or(0);
                let position = self.position(index)?;
                let call = self.state.tool_calls.get(usize::try_from(position).ok()?)?;
                let opening = delta.name.is_some();
                Some(self.tool_chunk(vec![OpenAiStreamToolCall {
                    index: position,
                    id: opening.then(|| call.id.clone()),
                    tool_type: opening.then(|| "function".to_owned()),
                    function: Some(OpenAiStreamFunctionCall {
                        name: delta.name.clone(),
                        arguments: Some(delta.parameters.clone().unwrap_or_default()),
                    }),
                }]))
            }
            CohereStreamEvent::ToolCallsGeneration { .. } => {
                let calls = self
                    .state
                    .tool_calls
                    .iter()
                    .zip(0u32..)
                    .map(|(call, position)| OpenAiStreamToolCall {
                        index: position,
                        id: Some(call.id.clone()),
                        tool_type: Some("function".to_owned()),
                        function: Some(OpenAiStreamFunctionCall {
                            name: Some(call.name.clone()),
                            arguments: Some(call.arguments.clone()),
                        }),
                    })
                    .collect();
                Some(self.tool_chunk(calls))
            }
            _ => None,
        }
    }
}

impl StreamAdapter for CohereStreamAdapter {
    type Chunk = CohereStreamEvent;
    type ProviderResponse = CohereResponse;

    fn state(&self) -> &StreamAccumulatorState<CohereStreamEvent> {
        &self.state
    }

    fn process_chunk(&mut self, event: CohereStreamEvent) -> ChunkProcessingResult {
        self.state.record_chunk();
        let mut result = ChunkProcessingResult::default();

        match &event {
            CohereStreamEvent::StreamStart { generation_id } => {
                if let Some(id) = generation_id {
                    self.state.response_id.clone_from(id);
                }
                RESPONSE_MODEL.clone_into(&mut self.state.model);
            }
            CohereStreamEvent::TextGeneration { text } => {
                self.state.text.push_str(text);
                if !text.is_empty() {
                    result.sse_data = Some(self.format_text_delta_sse(text));
                }
            }
            CohereStreamEvent::ToolCallsChunk { tool_call_delta, .. } => {
                if let Some(delta) = tool_call_delta {
                    let index = delta
                        .index
                        .or_else(|| self.state.tool_calls.last().map(|call| call.index))
                        .unwrap_or(0);
                    let slot = self.slot(index);
                    if let Some(name) = delta.name.as_ref().filter(|name| !name.is_empty()) {
                        slot.name.clone_from(name);
                    }
                    if let Some(parameters) = &delta.parameters {
                        slot.arguments.push_str(parameters);
                    }
                    result.is_tool_call_chunk = true;
                }
            }
            CohereStreamEvent::ToolCallsGeneration { tool_calls, .. } => {
                // Calls already assembled from chunks are complete
                if !self.state.has_tool_calls() {
                    for (index, call) in (0u32..).zip(tool_calls) {
                        let arguments = serde_json::to_string(&call.parameters).unwrap_or_else(|_| "{}".to_owned());
                        let slot = self.slot(index);
                        slot.name.clone_from(&call.name);
                        slot.arguments.push_str(&arguments);
                    }
                    result.is_tool_call_chunk = !tool_calls.is_empty();
                }
            }
            CohereStreamEvent::StreamEnd { finish_reason: reason, response } => {
                if let Some(response) = response {
                    if self.state.response_id.is_empty()
                        && let Some(id) = &response.generation_id
                    {
                        self.state.response_id.clone_from(id);
                        self.rederive_call_ids();
                    }
                    if let Some(tokens) = response.meta.and_then(|meta| meta.token_counts()) {
                        self.state.usage = Some(usage(Some(tokens)));
                    }
                }
                let reason = reason
                    .clone()
                    .or_else(|| response.as_ref().and_then(|r| r.finish_reason.clone()));
                self.state.stop_reason =
                    Some(finish_reason(reason.as_deref(), self.state.has_tool_calls()).to_owned());
                self.native_finish_reason = reason;
                result.is_final = self.state.finish();
            }
            CohereStreamEvent::Other => {}
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

    fn to_provider_response(&self) -> CohereResponse {
        let tool_calls: Vec<_> = self
            .state
            .tool_calls
            .iter()
            .map(|call| CohereToolCall {
                name: call.name.clone(),
                parameters: crate::convert::parse_arguments(&call.arguments),
            })
            .collect();

        CohereResponse {
            response_id: None,
            text: self.state.text.clone(),
            generation_id: self.generation_id().map(str::to_owned),
            finish_reason: Some(self.native_finish_reason.clone().unwrap_or_else(|| "COMPLETE".to_owned())),
            tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            meta: self.state.usage.map(|usage| CohereMeta {
                tokens: Some(CohereTokens {
                    input_tokens: f64::from(usage.input_tokens),
                    output_tokens: f64::from(usage.output_tokens),
                }),
                billed_units: None,
            }),
        }
    }
}
