//! OpenAI-compatible wire family
//!
//! Covers `OpenAI` itself and every provider speaking the Chat Completions
//! protocol (`DeepSeek`, Cerebras, Gemini's compatibility endpoint, vLLM,
//! Ollama, Zhipu).

use super::{ProviderFamily, WireFamily, mock_id, mock_text, mock_words};
use crate::adapter::AdapterContext;
use crate::adapter::openai::{OpenAiRequestAdapter, OpenAiResponseAdapter, OpenAiStreamAdapter};
use crate::client::StreamFormat;
use crate::protocol::openai::{
    OpenAiChoice, OpenAiChoiceMessage, OpenAiErrorResponse, OpenAiRequest, OpenAiResponse, OpenAiStreamChoice,
    OpenAiStreamChunk, OpenAiStreamDelta, OpenAiStreamOptions, OpenAiUsage,
};

/// Prompt tokens reported by mock responses
const MOCK_PROMPT_TOKENS: u32 = 12;

#[derive(Debug, Clone, Copy)]
pub struct OpenAiFamily;

impl ProviderFamily for OpenAiFamily {
    const WIRE: WireFamily = WireFamily::OpenAiCompatible;
    const STREAM_FORMAT: StreamFormat = StreamFormat::Sse;

    type NativeRequest = OpenAiRequest;
    type NativeResponse = OpenAiResponse;
    type Chunk = OpenAiStreamChunk;

    type RequestAdapter = OpenAiRequestAdapter;
    type ResponseAdapter = OpenAiResponseAdapter;
    type StreamAdapter = OpenAiStreamAdapter;

    fn create_request_adapter(request: OpenAiRequest, context: AdapterContext) -> OpenAiRequestAdapter {
        OpenAiRequestAdapter::new(request, context)
    }

    fn create_response_adapter(response: OpenAiResponse) -> OpenAiResponseAdapter {
        OpenAiResponseAdapter::new(response)
    }

    fn create_stream_adapter() -> OpenAiStreamAdapter {
        OpenAiStreamAdapter::new()
    }

    fn endpoint() -> &'static str {
        "/chat/completions"
    }

    fn authorize(builder: reqwest::RequestBuilder, api_key: Option<&str>) -> reqwest::RequestBuilder {
        match api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn prepare(request: &mut OpenAiRequest, stream: bool) {
        request.stream = Some(stream);
        request.stream_options = stream.then_some(OpenAiStreamOptions { include_usage: true });
    }

    fn parse_error_message(body: &str) -> Option<String> {
        serde_json::from_str::<OpenAiErrorResponse>(body)
            .ok()
            .map(|envelope| envelope.error.message)
            .filter(|message| !message.is_empty())
    }

    fn mock_response(request: &OpenAiRequest) -> OpenAiResponse {
        let text = mock_text(&request.model);
        let completion_tokens = u32::try_from(mock_words(&text).len()).unwrap_or(u32::MAX);

        OpenAiResponse {
            id: mock_id("chatcmpl-"),
            object: "chat.completion".to_owned(),
            created: crate::convert::now_secs(),
            model: request.model.clone(),
            choices: vec![OpenAiChoice {
                index: 0,
                message: OpenAiChoiceMessage::assistant(Some(text), None),
                finish_reason: Some("stop".to_owned()),
            }],
            usage: Some(OpenAiUsage {
                prompt_tokens: MOCK_PROMPT_TOKENS,
                completion_tokens,
                total_tokens: MOCK_PROMPT_TOKENS + completion_tokens,
            }),
        }
    }

    fn mock_stream(request: &OpenAiRequest) -> Vec<OpenAiStreamChunk> {
        let id = mock_id("chatcmpl-");
        let created = crate::convert::now_secs();
        let chunk = |delta: OpenAiStreamDelta, finish_reason: Option<&str>| OpenAiStreamChunk {
            id: id.clone(),
            object: "chat.completion.chunk".to_owned(),
            created,
            model: request.model.clone(),
            choices: vec![OpenAiStreamChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(str::to_owned),
            }],
            usage: None,
        };

        let words = mock_words(&mock_text(&request.model));
        let completion_tokens = u32::try_from(words.len()).unwrap_or(u32::MAX);

        let mut chunks = vec![chunk(
            OpenAiStreamDelta {
                role: Some("assistant".to_owned()),
                ..OpenAiStreamDelta::default()
            },
            None,
        )];
        chunks.extend(words.into_iter().map(|word| {
            chunk(
                OpenAiStreamDelta {
                    content: Some(word),
                    ..OpenAiStreamDelta::default()
                },
                None,
            )
        }));
        chunks.push(chunk(OpenAiStreamDelta::default(), Some("stop")));

        let include_usage = request
            .stream_options
            .as_ref()
            .is_some_and(|options| options.include_usage);
        if include_usage {
            let mut usage = chunk(OpenAiStreamDelta::default(), None);
            usage.choices.clear();
            usage.usage = Some(OpenAiUsage {
                prompt_tokens: MOCK_PROMPT_TOKENS,
                completion_tokens,
                total_tokens: MOCK_PROMPT_TOKENS + completion_tokens,
            });
            chunks.push(usage);
        }

        chunks
    }
}
