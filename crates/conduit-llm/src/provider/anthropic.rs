//! Anthropic Messages wire family

use super::{ProviderFamily, WireFamily, mock_id, mock_text, mock_words};
use crate::adapter::AdapterContext;
use crate::adapter::anthropic::{AnthropicRequestAdapter, AnthropicResponseAdapter, AnthropicStreamAdapter};
use crate::client::StreamFormat;
use crate::protocol::anthropic::{
    AnthropicErrorResponse, AnthropicMessageDelta, AnthropicRequest, AnthropicResponse, AnthropicResponseBlock,
    AnthropicStreamContentBlock, AnthropicStreamDelta, AnthropicStreamEvent, AnthropicStreamMessage, AnthropicUsage,
};
use crate::protocol::openai::OpenAiRequest;

/// Messages API version sent with every request
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const MOCK_INPUT_TOKENS: u32 = 12;

#[derive(Debug, Clone, Copy)]
pub struct AnthropicFamily;

impl ProviderFamily for AnthropicFamily {
    const WIRE: WireFamily = WireFamily::Anthropic;
    const STREAM_FORMAT: StreamFormat = StreamFormat::Sse;

    type NativeRequest = AnthropicRequest;
    type NativeResponse = AnthropicResponse;
    type Chunk = AnthropicStreamEvent;

    type RequestAdapter = AnthropicRequestAdapter;
    type ResponseAdapter = AnthropicResponseAdapter;
    type StreamAdapter = AnthropicStreamAdapter;

    fn create_request_adapter(request: OpenAiRequest, context: AdapterContext) -> AnthropicRequestAdapter {
        AnthropicRequestAdapter::new(request, context)
    }

    fn create_response_adapter(response: AnthropicResponse) -> AnthropicResponseAdapter {
        AnthropicResponseAdapter::new(response)
    }

    fn create_stream_adapter() -> AnthropicStreamAdapter {
        AnthropicStreamAdapter::new()
    }

    fn endpoint() -> &'static str {
        "/messages"
    }

    fn authorize(builder: reqwest::RequestBuilder, api_key: Option<&str>) -> reqwest::RequestBuilder {
        let builder = builder.header("anthropic-version", ANTHROPIC_VERSION);
        match api_key {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }

    fn prepare(request: &mut AnthropicRequest, stream: bool) {
        request.stream = Some(stream);
    }

    fn parse_error_message(body: &str) -> Option<String> {
        serde_json::from_str::<AnthropicErrorResponse>(body)
            .ok()
            .map(|envelope| envelope.error.message)
            .filter(|message| !message.is_empty())
    }

    fn mock_response(request: &AnthropicRequest) -> AnthropicResponse {
        let text = mock_text(&request.model);
        let output_tokens = u32::try_from(mock_words(&text).len()).unwrap_or(u32::MAX);

        AnthropicResponse {
            id: mock_id("msg_"),
            response_type: "message".to_owned(),
            role: "assistant".to_owned(),
            content: vec![AnthropicResponseBlock::Text { text }],
            model: request.model.clone(),
            stop_reason: Some("end_turn".to_owned()),
            stop_sequence: None,
            usage: AnthropicUsage {
                input_tokens: MOCK_INPUT_TOKENS,
                output_tokens,
            },
        }
    }

    fn mock_stream(request: &AnthropicRequest) -> Vec<AnthropicStreamEvent> {
        let words = mock_words(&mock_text(&request.model));
        let output_tokens = u32::try_from(words.len()).unwrap_or(u32::MAX);

        let mut events = vec![
            AnthropicStreamEvent::MessageStart {
                message: AnthropicStreamMessage {
                    id: mock_id("msg_"),
                    model: request.model.clone(),
                    usage: Some(AnthropicUsage {
                        input_tokens: MOCK_INPUT_TOKENS,
                        output_tokens: 1,
                    }),
                },
            },
            AnthropicStreamEvent::ContentBlockStart {
                index: 0,
                content_block: AnthropicStreamContentBlock::Text { text: String::new() },
            },
            AnthropicStreamEvent::Ping,
        ];
        events.extend(words.into_iter().map(|text| AnthropicStreamEvent::ContentBlockDelta {
            index: 0,
            delta: AnthropicStreamDelta::TextDelta { text },
        }));
        events.extend([
            AnthropicStreamEvent::ContentBlockStop { index: 0 },
            AnthropicStreamEvent::MessageDelta {
                delta: AnthropicMessageDelta {
                    stop_reason: Some("end_turn".to_owned()),
                    stop_sequence: None,
                },
                usage: Some(AnthropicUsage {
                    input_tokens: 0,
                    output_tokens,
                }),
            },
            AnthropicStreamEvent::MessageStop,
        ]);

        events
    }
}
