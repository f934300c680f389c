//! Upstream stream to downstream SSE relay
//!
//! Pull-based: nothing is read from upstream until the response body asks
//! for the next frame, so a downstream disconnect drops the upstream
//! connection with the body.

use std::collections::VecDeque;
use std::convert::Infallible;

use futures_util::{Stream, StreamExt};
use tracing::Instrument;

use crate::adapter::{StreamAdapter, sse};
use crate::client::ChunkStream;
use crate::error::LlmError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Streaming,
    Closing,
    Done,
}

struct Relay<A: StreamAdapter> {
    adapter: A,
    upstream: ChunkStream<A::Chunk>,
    pending: VecDeque<String>,
    phase: Phase,
    error_message: fn(&LlmError) -> String,
}

impl<A: StreamAdapter> Relay<A> {
    async fn next_frame(&mut self) -> Option<String> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Some(frame);
            }

            match self.phase {
                Phase::Done => return None,
                Phase::Closing => self.close(),
                Phase::Streaming => match self.upstream.next().await {
                    Some(Ok(chunk)) => {
                        if let Some(frame) = self.adapter.process_chunk(chunk).sse_data {
                            self.pending.push_back(frame);
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "upstream stream failed");
                        self.pending
                            .push_back(sse::error(&(self.error_message)(&e), e.error_type()));
                        self.phase = Phase::Closing;
                    }
                    None => self.phase = Phase::Closing,
                },
            }
        }
    }

    /// Queue the held-back tool call events and the closing frames
    fn close(&mut self) {
        self.pending.extend(self.adapter.get_raw_tool_call_events());
        self.pending.push_back(self.adapter.format_end_sse());
        self.phase = Phase::Done;

        let state = self.adapter.state();
        let usage = state.usage.unwrap_or_default();
        tracing::info!(
            response_id = %state.response_id,
            model = %state.model,
            text_len = state.text.len(),
            tool_calls = state.tool_calls.len(),
            finish_reason = state.stop_reason.as_deref().unwrap_or("stop"),
            finished = state.is_finished(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            time_to_first_chunk_ms = state.timing.time_to_first_chunk().map(|d| d.as_millis()),
            "stream completed"
        );
    }
}

/// Drive `adapter` over `upstream` and yield downstream SSE frames
///
/// Text is forwarded as it arrives. Tool call events are held back and
/// replayed before the closing chunk. An upstream error becomes an SSE
/// error event followed by the closing frames. `error_message` renders
/// that error for the caller.
pub fn relay<A>(
    adapter: A,
    upstream: ChunkStream<A::Chunk>,
    error_message: fn(&LlmError) -> String,
    span: tracing::Span,
) -> impl Stream<Item = Result<String, Infallible>> + Send + 'static
where
    A: StreamAdapter + 'static,
{
    let relay = Relay {
        adapter,
        upstream,
        pending: VecDeque::new(),
        phase: Phase::Streaming,
        error_message,
    };

    futures_util::stream::unfold(relay, move |mut relay| {
        async move { relay.next_frame().await.map(|frame| (Ok(frame), relay)) }.instrument(span.clone())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::openai::OpenAiStreamAdapter;
    use crate::protocol::openai::OpenAiStreamChunk;

    fn chunk(value: serde_json::Value) -> Result<OpenAiStreamChunk, LlmError> {
        Ok(serde_json::from_value(value).unwrap())
    }

    fn upstream(items: Vec<Result<OpenAiStreamChunk, LlmError>>) -> ChunkStream<OpenAiStreamChunk> {
        Box::pin(futures_util::stream::iter(items))
    }

    async fn frames(items: Vec<Result<OpenAiStreamChunk, LlmError>>) -> Vec<String> {
        relay(
            OpenAiStreamAdapter::new(),
            upstream(items),
            |e| e.to_string(),
            tracing::Span::none(),
        )
        .map(|frame| frame.unwrap_or_default())
        .collect()
        .await
    }

    #[tokio::test]
    async fn text_then_held_tool_calls_then_close() {
        let frames = frames(vec![
            chunk(serde_json::json!({"id": "c1", "model": "m", "choices": [
                {"index": 0, "delta": {"content": "Looking"}, "finish_reason": null}
            ]})),
            chunk(serde_json::json!({"id": "c1", "model": "m", "choices": [
                {"index": 0, "delta": {"tool_calls": [
                    {"index": 0, "id": "call_1", "function": {"name": "search", "arguments": "{}"}}
                ]}, "finish_reason": null}
            ]})),
            chunk(serde_json::json!({"id": "c1", "model": "m", "choices": [
                {"index": 0, "delta": {}, "finish_reason": "tool_calls"}
            ]})),
        ])
        .await;

        assert_eq!(frames.len(), 3);
        assert!(frames[0].contains("\"content\":\"Looking\""));
        assert!(frames[1].contains("\"name\":\"search\""));
        assert!(!frames[1].contains("finish_reason\":\"tool_calls"));
        assert!(frames[2].contains("\"finish_reason\":\"tool_calls\""));
        assert!(frames[2].ends_with(sse::DONE));
    }

    #[tokio::test]
    async fn upstream_error_is_reported_then_closed() {
        let frames = frames(vec![
            chunk(serde_json::json!({"id": "c1", "model": "m", "choices": [
                {"index": 0, "delta": {"content": "Hi"}, "finish_reason": null}
            ]})),
            Err(LlmError::Streaming("connection reset".to_owned())),
            chunk(serde_json::json!({"id": "c1", "model": "m", "choices": [
                {"index": 0, "delta": {"content": "never sent"}, "finish_reason": null}
            ]})),
        ])
        .await;

        assert_eq!(frames.len(), 3);
        insta::assert_snapshot!(
            frames[1].trim_end(),
            @r#"data: {"error":{"message":"streaming error: connection reset","type":"streaming_error"}}"#
        );
        assert!(frames[2].ends_with(sse::DONE));
        assert!(!frames.concat().contains("never sent"));
    }

    #[tokio::test]
    async fn empty_upstream_still_closes() {
        let frames = frames(Vec::new()).await;

        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("\"finish_reason\":\"stop\""));
        assert!(frames[0].ends_with(sse::DONE));
    }
}
