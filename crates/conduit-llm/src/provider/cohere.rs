//! Cohere v1 Chat wire family
//!
//! Streams are newline-delimited JSON rather than SSE.

use super::{ProviderFamily, WireFamily, mock_id, mock_text, mock_words};
use crate::adapter::AdapterContext;
use crate::adapter::cohere::{CohereRequestAdapter, CohereResponseAdapter, CohereStreamAdapter};
use crate::client::StreamFormat;
use crate::protocol::cohere::{
    CohereErrorResponse, CohereMeta, CohereRequest, CohereResponse, CohereStreamEvent, CohereTokens,
};
use crate::protocol::openai::OpenAiRequest;

const MOCK_INPUT_TOKENS: f64 = 12.0;

#[derive(Debug, Clone, Copy)]
pub struct CohereFamily;

impl ProviderFamily for CohereFamily {
    const WIRE: WireFamily = WireFamily::Cohere;
    const STREAM_FORMAT: StreamFormat = StreamFormat::Ndjson;

    type NativeRequest = CohereRequest;
    type NativeResponse = CohereResponse;
    type Chunk = CohereStreamEvent;

    type RequestAdapter = CohereRequestAdapter;
    type ResponseAdapter = CohereResponseAdapter;
    type StreamAdapter = CohereStreamAdapter;

    fn create_request_adapter(request: OpenAiRequest, context: AdapterContext) -> CohereRequestAdapter {
        CohereRequestAdapter::new(request, context)
    }

    fn create_response_adapter(response: CohereResponse) -> CohereResponseAdapter {
        CohereResponseAdapter::new(response)
    }

    fn create_stream_adapter() -> CohereStreamAdapter {
        CohereStreamAdapter::new()
    }

    fn endpoint() -> &'static str {
        "/chat"
    }

    fn authorize(builder: reqwest::RequestBuilder, api_key: Option<&str>) -> reqwest::RequestBuilder {
        match api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    fn prepare(request: &mut CohereRequest, stream: bool) {
        request.stream = Some(stream);
    }

    fn parse_error_message(body: &str) -> Option<String> {
        serde_json::from_str::<CohereErrorResponse>(body)
            .ok()
            .map(|envelope| envelope.message)
            .filter(|message| !message.is_empty())
    }

    fn mock_response(request: &CohereRequest) -> CohereResponse {
        let text = mock_text(&request.model);
        let words = mock_words(&text);

        CohereResponse {
            response_id: Some(mock_id("")),
            generation_id: Some(mock_id("")),
            finish_reason: Some("COMPLETE".to_owned()),
            meta: Some(mock_meta(words.len())),
            text,
            tool_calls: None,
        }
    }

    fn mock_stream(request: &CohereRequest) -> Vec<CohereStreamEvent> {
        let mut response = Self::mock_response(request);
        let words = mock_words(&response.text);
        response.generation_id = Some(mock_id(""));

        let mut events = vec![CohereStreamEvent::StreamStart {
            generation_id: response.generation_id.clone(),
        }];
        events.extend(words.into_iter().map(|text| CohereStreamEvent::TextGeneration { text }));
        events.push(CohereStreamEvent::StreamEnd {
            finish_reason: Some("COMPLETE".to_owned()),
            response: Some(response),
        });

        events
    }
}

#[allow(clippy::cast_precision_loss)]
fn mock_meta(output_words: usize) -> CohereMeta {
    let tokens = CohereTokens {
        input_tokens: MOCK_INPUT_TOKENS,
        output_tokens: output_words as f64,
    };
    CohereMeta {
        tokens: Some(tokens),
        billed_units: Some(tokens),
    }
}
