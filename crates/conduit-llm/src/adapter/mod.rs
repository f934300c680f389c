//! Request, response and stream adapters
//!
//! One adapter set per wire family translates between the downstream
//! `OpenAI` contract and the provider's native protocol. Adapters are
//! request-scoped and never shared.

pub mod anthropic;
pub mod cohere;
pub mod openai;
pub mod sse;
mod staged;

use std::collections::HashMap;
use std::sync::Arc;

use http::HeaderMap;
use http::header::{CACHE_CONTROL, CONNECTION, CONTENT_TYPE, HeaderValue};
use serde::Serialize;

pub use staged::{StagedRequest, UNKNOWN_TOOL_NAME, resolve_tool_name};

use crate::compression::ToolCompressor;
use crate::policy::ContentPolicy;
use crate::protocol::openai::{OpenAiMessage, OpenAiRequest, OpenAiResponse, OpenAiStreamDelta};
use crate::types::{
    CanonicalMessage, CanonicalToolCall, CanonicalToolDefinition, CanonicalToolResult, ChunkProcessingResult,
    StreamAccumulatorState, ToolCompressionStats, UsageView,
};

/// Native request ready to send, with what compression did to it
#[derive(Debug, Clone)]
pub struct MaterializedRequest<R> {
    pub request: R,
    /// `None` when compression is disabled
    pub compression: Option<ToolCompressionStats>,
}

/// Shared collaborators a request adapter applies during materialization
#[derive(Debug, Clone, Default)]
pub struct AdapterContext {
    pub policy: Arc<ContentPolicy>,
    pub compressor: Option<ToolCompressor>,
}

// -- Request adapter --

/// Builds the provider-native request for one downstream request
///
/// Reads never observe staged edits except the model override; edits only
/// take effect in [`RequestAdapter::to_provider_request`].
pub trait RequestAdapter: Send {
    type ProviderRequest: Serialize + Send;

    fn staged(&self) -> &StagedRequest;

    fn staged_mut(&mut self) -> &mut StagedRequest;

    /// Apply staged edits to a copy and convert it to the native format
    fn to_provider_request(&self) -> MaterializedRequest<Self::ProviderRequest>;

    fn get_model(&self) -> &str {
        self.staged().model()
    }

    fn get_messages(&self) -> Vec<CanonicalMessage> {
        self.staged().messages()
    }

    fn get_tool_results(&self) -> Vec<CanonicalToolResult> {
        self.staged().tool_results()
    }

    fn get_tools(&self) -> Vec<CanonicalToolDefinition> {
        self.staged().tools()
    }

    fn has_tools(&self) -> bool {
        !self.get_tools().is_empty()
    }

    fn is_streaming(&self) -> bool {
        self.staged().is_streaming()
    }

    fn get_provider_messages(&self) -> &[OpenAiMessage] {
        &self.staged().original().messages
    }

    fn get_original_request(&self) -> &OpenAiRequest {
        self.staged().original()
    }

    fn set_model(&mut self, model: String) {
        self.staged_mut().set_model(model);
    }

    /// Replace a tool result's content when the request is materialized
    fn update_tool_result(&mut self, tool_call_id: String, content: String) {
        self.staged_mut().update_tool_result(tool_call_id, content);
    }

    fn apply_tool_result_updates(&mut self, updates: HashMap<String, String>) {
        self.staged_mut().apply_tool_result_updates(updates);
    }
}

// -- Response adapter --

/// Reads one completed native response
pub trait ResponseAdapter: Send {
    type ProviderResponse: Serialize + Send;

    fn get_id(&self) -> &str;

    fn get_model(&self) -> &str;

    fn get_text(&self) -> String;

    /// Tool calls with parsed arguments; malformed arguments become `{}`
    fn get_tool_calls(&self) -> Vec<CanonicalToolCall>;

    fn has_tool_calls(&self) -> bool {
        !self.get_tool_calls().is_empty()
    }

    fn get_usage(&self) -> UsageView;

    fn get_original_response(&self) -> &Self::ProviderResponse;

    /// Downstream rendering of the response
    fn to_chat_completion(&self) -> OpenAiResponse;

    /// Downstream response whose only output is `content_message`
    fn to_refusal_response(&self, refusal_message: &str, content_message: &str) -> OpenAiResponse {
        tracing::info!(id = self.get_id(), refusal = refusal_message, "replacing response with refusal");

        let mut response = self.to_chat_completion();
        if let Some(choice) = response.choices.first_mut() {
            choice.message.role = "assistant".to_owned();
            choice.message.content = Some(content_message.to_owned());
            choice.message.refusal = None;
            choice.message.tool_calls = None;
            choice.finish_reason = Some("stop".to_owned());
        }
        response
    }
}

// -- Stream adapter --

/// Accumulates one native stream and renders downstream SSE fragments
pub trait StreamAdapter: Send {
    /// Native stream event
    type Chunk: Send;
    type ProviderResponse: Serialize + Send;

    fn state(&self) -> &StreamAccumulatorState<Self::Chunk>;

    /// Fold one native event into the state
    fn process_chunk(&mut self, chunk: Self::Chunk) -> ChunkProcessingResult;

    /// Retained tool-call events rendered as downstream SSE fragments
    fn get_raw_tool_call_events(&self) -> Vec<String>;

    /// Native non-streamed response equivalent to what was accumulated
    fn to_provider_response(&self) -> Self::ProviderResponse;

    fn get_sse_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/event-stream"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers
    }

    fn format_text_delta_sse(&self, text: &str) -> String {
        sse::data(&sse::chunk(self.state(), sse::text_delta(text), None))
    }

    /// Whole text as a role chunk followed by a content chunk
    fn format_complete_text_sse(&self, text: &str) -> Vec<String> {
        let role = OpenAiStreamDelta {
            role: Some("assistant".to_owned()),
            ..OpenAiStreamDelta::default()
        };
        vec![
            sse::data(&sse::chunk(self.state(), role, None)),
            self.format_text_delta_sse(text),
        ]
    }

    /// Closing chunk with the finish reason and usage, then `[DONE]`
    fn format_end_sse(&self) -> String {
        let state = self.state();
        let finish_reason = state.stop_reason.clone().unwrap_or_else(|| "stop".to_owned());

        let mut chunk = sse::chunk(state, OpenAiStreamDelta::default(), Some(finish_reason));
        chunk.usage = state.usage.map(sse::usage);

        format!("{}{}", sse::data(&chunk), sse::DONE)
    }
}
