//! Downstream SSE framing

use serde::Serialize;

use crate::protocol::openai::{OpenAiStreamChoice, OpenAiStreamChunk, OpenAiStreamDelta, OpenAiUsage};
use crate::types::{StreamAccumulatorState, UsageView};

/// Stream terminator
pub const DONE: &str = "data: [DONE]\n\n";

/// Frame a value as one SSE `data:` event
pub fn data<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .map(|json| format!("data: {json}\n\n"))
        .unwrap_or_default()
}

/// Frame an error as one SSE `data:` event in the `OpenAI` error shape
pub fn error(message: &str, error_type: &str) -> String {
    data(&serde_json::json!({
        "error": {
            "message": message,
            "type": error_type,
        }
    }))
}

/// Downstream chunk for the stream `state` belongs to
///
/// Uses a generated id until the provider has sent one.
pub fn chunk<E>(
    state: &StreamAccumulatorState<E>,
    delta: OpenAiStreamDelta,
    finish_reason: Option<String>,
) -> OpenAiStreamChunk {
    let id = if state.response_id.is_empty() {
        fallback_id()
    } else {
        state.response_id.clone()
    };

    OpenAiStreamChunk {
        id,
        object: "chat.completion.chunk".to_owned(),
        created: crate::convert::now_secs(),
        model: state.model.clone(),
        choices: vec![OpenAiStreamChoice {
            index: 0,
            delta,
            finish_reason,
        }],
        usage: None,
    }
}

pub fn text_delta(text: &str) -> OpenAiStreamDelta {
    OpenAiStreamDelta {
        content: Some(text.to_owned()),
        ..OpenAiStreamDelta::default()
    }
}

pub const fn usage(usage: UsageView) -> OpenAiUsage {
    OpenAiUsage {
        prompt_tokens: usage.input_tokens,
        completion_tokens: usage.output_tokens,
        total_tokens: usage.total(),
    }
}

fn fallback_id() -> String {
    let millis = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0);
    format!("chatcmpl-{millis}")
}
