mod harness;

use conduit_config::LlmProviderType;
use harness::config::ConfigBuilder;
use harness::mock_upstream::{CONTENT, MockUpstream, TOOL_ARGUMENTS};
use harness::server::TestServer;
use harness::sse;
use serde_json::json;

fn chat(stream: bool) -> serde_json::Value {
    json!({
        "model": "claude-sonnet-4-5",
        "messages": [
            {"role": "system", "content": "Be brief."},
            {"role": "user", "content": "What is the weather?"}
        ],
        "stream": stream,
        "max_tokens": 256
    })
}

async fn setup(mock: &MockUpstream) -> TestServer {
    let config = ConfigBuilder::new()
        .with_provider("claude", LlmProviderType::Anthropic, &mock.base_url())
        .build();
    TestServer::start(config).await.unwrap()
}

#[tokio::test]
async fn request_is_translated_to_messages_api() {
    let mock = MockUpstream::start().await.unwrap();
    let server = setup(&mock).await;

    server.complete("claude", &chat(false)).await;

    let sent = mock.last_request();
    assert_eq!(sent.path, "/v1/messages");
    assert_eq!(sent.header("x-api-key"), Some("test-key"));
    assert_eq!(sent.header("anthropic-version"), Some("2023-06-01"));
    assert_eq!(sent.body["system"], "Be brief.");
    assert_eq!(sent.body["max_tokens"], 256);
    assert_eq!(sent.body["messages"].as_array().unwrap().len(), 1);
    assert_eq!(sent.body["messages"][0]["role"], "user");
}

#[tokio::test]
async fn response_is_normalized() {
    let mock = MockUpstream::start().await.unwrap();
    let server = setup(&mock).await;

    let (status, body) = server.complete("claude", &chat(false)).await;

    assert_eq!(status, 200);
    assert_eq!(body["id"], "msg_test_123");
    assert_eq!(body["object"], "chat.completion");
    assert_eq!(body["choices"][0]["message"]["content"], CONTENT);
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["usage"]["prompt_tokens"], 10);
    assert_eq!(body["usage"]["completion_tokens"], 5);
}

#[tokio::test]
async fn tool_use_becomes_tool_calls() {
    let mock = MockUpstream::start_with_tool_call().await.unwrap();
    let server = setup(&mock).await;

    let (_, body) = server.complete("claude", &chat(false)).await;

    let call = &body["choices"][0]["message"]["tool_calls"][0];
    assert_eq!(call["id"], "toolu_01");
    assert_eq!(call["function"]["name"], "get_weather");
    let arguments: serde_json::Value = serde_json::from_str(call["function"]["arguments"].as_str().unwrap()).unwrap();
    assert_eq!(arguments, json!({"location": "San Francisco"}));
    assert_eq!(body["choices"][0]["finish_reason"], "tool_calls");
}

#[tokio::test]
async fn stream_is_normalized_to_chunks() {
    let mock = MockUpstream::start().await.unwrap();
    let server = setup(&mock).await;

    let lines = server.stream("claude", &chat(true)).await;

    assert_eq!(lines.last().map(String::as_str), Some("[DONE]"));
    let chunks = sse::chunks(&lines);
    assert!(chunks.iter().all(|chunk| chunk["object"] == "chat.completion.chunk"));
    assert_eq!(sse::content(&chunks).trim_end(), CONTENT);

    let last = chunks.last().unwrap();
    assert_eq!(last["id"], "msg_test_stream");
    assert_eq!(last["choices"][0]["finish_reason"], "stop");
    assert_eq!(last["usage"]["prompt_tokens"], 10);
    assert_eq!(last["usage"]["completion_tokens"], 5);
}

#[tokio::test]
async fn streamed_tool_use_is_replayed_as_tool_calls() {
    let mock = MockUpstream::start_with_tool_call().await.unwrap();
    let server = setup(&mock).await;

    let lines = server.stream("claude", &chat(true)).await;
    let chunks = sse::chunks(&lines);

    assert_eq!(sse::tool_names(&chunks), ["get_weather"]);
    assert_eq!(sse::tool_arguments(&chunks), [TOOL_ARGUMENTS]);
    assert_eq!(chunks.last().unwrap()["choices"][0]["finish_reason"], "tool_calls");
}
