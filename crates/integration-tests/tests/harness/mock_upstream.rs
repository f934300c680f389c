//! Mock upstream speaking the OpenAI, Anthropic and Cohere native protocols
//!
//! Every request is recorded so tests can assert on what the gateway
//! actually sent upstream.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

/// Reply text served by every protocol
pub const CONTENT: &str = "Hello from mock upstream";

/// Arguments of the canned tool call
pub const TOOL_ARGUMENTS: &str = r#"{"location":"San Francisco"}"#;

/// One request as received by the mock
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: &'static str,
    pub headers: HeaderMap,
    pub body: Value,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Mock upstream that returns predictable responses
pub struct MockUpstream {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
}

struct MockState {
    requests: Mutex<Vec<RecordedRequest>>,
    /// Answer every request with this status and body
    failure: Option<(StatusCode, Value)>,
    /// Reply with a tool call instead of text
    tool_call: bool,
}

impl MockUpstream {
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_inner(None, false).await
    }

    /// Start a mock that answers with a `get_weather` tool call
    pub async fn start_with_tool_call() -> anyhow::Result<Self> {
        Self::start_inner(None, true).await
    }

    /// Start a mock that fails every request
    pub async fn start_failing(status: u16, body: Value) -> anyhow::Result<Self> {
        let status = StatusCode::from_u16(status)?;
        Self::start_inner(Some((status, body)), false).await
    }

    async fn start_inner(failure: Option<(StatusCode, Value)>, tool_call: bool) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            requests: Mutex::new(Vec::new()),
            failure,
            tool_call,
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(openai_chat))
            .route("/v1/messages", routing::post(anthropic_messages))
            .route("/v1/chat", routing::post(cohere_chat))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self { addr, shutdown, state })
    }

    /// Base URL for configuring the mock as a provider
    ///
    /// Includes `/v1`; providers append their own endpoint path.
    pub fn base_url(&self) -> String {
        format!("http://{}/v1", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().expect("lock").clone()
    }

    /// The most recent request
    pub fn last_request(&self) -> RecordedRequest {
        self.requests().pop().expect("at least one request")
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

impl MockState {
    /// Record the request and return the configured failure, if any
    fn receive(&self, path: &'static str, headers: HeaderMap, body: &Value) -> Option<Response> {
        self.requests.lock().expect("lock").push(RecordedRequest {
            path,
            headers,
            body: body.clone(),
        });

        self.failure
            .as_ref()
            .map(|(status, body)| (*status, Json(body.clone())).into_response())
    }
}

fn is_stream(body: &Value) -> bool {
    body["stream"].as_bool().unwrap_or(false)
}

fn words() -> Vec<String> {
    CONTENT.split(' ').map(|word| format!("{word} ")).collect()
}

fn sse(events: &[(Option<&str>, Value)], terminator: bool) -> Response {
    let mut body = String::new();
    for (event, data) in events {
        if let Some(event) = event {
            body.push_str(&format!("event: {event}\n"));
        }
        body.push_str(&format!("data: {data}\n\n"));
    }
    if terminator {
        body.push_str("data: [DONE]\n\n");
    }

    (StatusCode::OK, [(header::CONTENT_TYPE, "text/event-stream")], body).into_response()
}

// -- OpenAI --

async fn openai_chat(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Some(failure) = state.receive("/v1/chat/completions", headers, &body) {
        return failure;
    }

    let model = body["model"].as_str().unwrap_or_default().to_owned();
    let usage = json!({"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15});

    if !is_stream(&body) {
        let message = if state.tool_call {
            json!({
                "role": "assistant",
                "content": null,
                "tool_calls": [{
                    "id": "call_test_123",
                    "type": "function",
                    "function": {"name": "get_weather", "arguments": TOOL_ARGUMENTS}
                }]
            })
        } else {
            json!({"role": "assistant", "content": CONTENT})
        };
        let finish_reason = if state.tool_call { "tool_calls" } else { "stop" };

        return Json(json!({
            "id": "chatcmpl-test-123",
            "object": "chat.completion",
            "created": 1_700_000_000,
            "model": model,
            "choices": [{"index": 0, "message": message, "finish_reason": finish_reason}],
            "usage": usage
        }))
        .into_response();
    }

    let chunk = |delta: Value, finish_reason: Value| {
        json!({
            "id": "chatcmpl-test-stream",
            "object": "chat.completion.chunk",
            "created": 1_700_000_000,
            "model": model,
            "choices": [{"index": 0, "delta": delta, "finish_reason": finish_reason}]
        })
    };

    let mut events = vec![(None, chunk(json!({"role": "assistant", "content": ""}), Value::Null))];
    if state.tool_call {
        events.push((
            None,
            chunk(
                json!({"tool_calls": [{"index": 0, "id": "call_test_stream", "type": "function", "function": {"name": "get_weather", "arguments": ""}}]}),
                Value::Null,
            ),
        ));
        for fragment in [r#"{"location":"#, r#""San Francisco"}"#] {
            events.push((
                None,
                chunk(json!({"tool_calls": [{"index": 0, "function": {"arguments": fragment}}]}), Value::Null),
            ));
        }
        events.push((None, chunk(json!({}), json!("tool_calls"))));
    } else {
        for word in words() {
            events.push((None, chunk(json!({"content": word}), Value::Null)));
        }
        events.push((None, chunk(json!({}), json!("stop"))));
    }

    if body["stream_options"]["include_usage"].as_bool() == Some(true) {
        let mut usage_chunk = chunk(json!({}), Value::Null);
        usage_chunk["choices"] = json!([]);
        usage_chunk["usage"] = usage;
        events.push((None, usage_chunk));
    }

    sse(&events, true)
}

// -- Anthropic --

async fn anthropic_messages(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Some(failure) = state.receive("/v1/messages", headers, &body) {
        return failure;
    }

    let model = body["model"].as_str().unwrap_or_default().to_owned();

    if !is_stream(&body) {
        let (content, stop_reason) = if state.tool_call {
            (
                json!([
                    {"type": "text", "text": "Checking."},
                    {"type": "tool_use", "id": "toolu_01", "name": "get_weather", "input": {"location": "San Francisco"}}
                ]),
                "tool_use",
            )
        } else {
            (json!([{"type": "text", "text": CONTENT}]), "end_turn")
        };

        return Json(json!({
            "id": "msg_test_123",
            "type": "message",
            "role": "assistant",
            "model": model,
            "content": content,
            "stop_reason": stop_reason,
            "stop_sequence": null,
            "usage": {"input_tokens": 10, "output_tokens": 5}
        }))
        .into_response();
    }

    let mut events = vec![
        (
            Some("message_start"),
            json!({"type": "message_start", "message": {
                "id": "msg_test_stream", "type": "message", "role": "assistant", "model": model,
                "content": [], "stop_reason": null, "usage": {"input_tokens": 10, "output_tokens": 1}
            }}),
        ),
        (Some("ping"), json!({"type": "ping"})),
    ];

    let stop_reason = if state.tool_call {
        events.push((
            Some("content_block_start"),
            json!({"type": "content_block_start", "index": 0,
                "content_block": {"type": "tool_use", "id": "toolu_01", "name": "get_weather", "input": {}}}),
        ));
        for fragment in [r#"{"location":"#, r#""San Francisco"}"#] {
            events.push((
                Some("content_block_delta"),
                json!({"type": "content_block_delta", "index": 0,
                    "delta": {"type": "input_json_delta", "partial_json": fragment}}),
            ));
        }
        "tool_use"
    } else {
        events.push((
            Some("content_block_start"),
            json!({"type": "content_block_start", "index": 0, "content_block": {"type": "text", "text": ""}}),
        ));
        for word in words() {
            events.push((
                Some("content_block_delta"),
                json!({"type": "content_block_delta", "index": 0, "delta": {"type": "text_delta", "text": word}}),
            ));
        }
        "end_turn"
    };

    events.push((Some("content_block_stop"), json!({"type": "content_block_stop", "index": 0})));
    events.push((
        Some("message_delta"),
        json!({"type": "message_delta", "delta": {"stop_reason": stop_reason, "stop_sequence": null},
            "usage": {"output_tokens": 5}}),
    ));
    events.push((Some("message_stop"), json!({"type": "message_stop"})));

    sse(&events, false)
}

// -- Cohere --

async fn cohere_chat(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if let Some(failure) = state.receive("/v1/chat", headers, &body) {
        return failure;
    }

    let tool_calls = json!([{"name": "get_weather", "parameters": {"location": "San Francisco"}}]);
    let text = if state.tool_call { "" } else { CONTENT };
    let mut response = json!({
        "response_id": "resp-test",
        "generation_id": "gen-test",
        "text": text,
        "finish_reason": "COMPLETE",
        "meta": {"tokens": {"input_tokens": 10, "output_tokens": 5}}
    });
    if state.tool_call {
        response["tool_calls"] = tool_calls.clone();
    }

    if !is_stream(&body) {
        return Json(response).into_response();
    }

    let mut events = vec![json!({"event_type": "stream-start", "generation_id": "gen-test", "is_finished": false})];
    if state.tool_call {
        events.push(json!({"event_type": "tool-calls-generation", "tool_calls": tool_calls}));
    } else {
        for word in words() {
            events.push(json!({"event_type": "text-generation", "text": word}));
        }
    }
    events.push(json!({"event_type": "stream-end", "finish_reason": "COMPLETE", "response": response}));

    let body: String = events.iter().map(|event| format!("{event}\n")).collect();
    (StatusCode::OK, [(header::CONTENT_TYPE, "application/stream+json")], body).into_response()
}
