mod harness;

use conduit_config::LlmProviderType;
use harness::config::ConfigBuilder;
use harness::mock_upstream::{CONTENT, MockUpstream};
use harness::server::TestServer;
use harness::sse;
use serde_json::json;

fn chat(stream: bool) -> serde_json::Value {
    json!({
        "model": "command-r-plus",
        "messages": [
            {"role": "system", "content": "Be brief."},
            {"role": "user", "content": "Hi"},
            {"role": "assistant", "content": "Hello!"},
            {"role": "user", "content": "What is the weather?"}
        ],
        "stream": stream
    })
}

async fn setup(mock: &MockUpstream) -> TestServer {
    let config = ConfigBuilder::new()
        .with_provider("cohere", LlmProviderType::Cohere, &mock.base_url())
        .build();
    TestServer::start(config).await.unwrap()
}

#[tokio::test]
async fn request_is_translated_to_chat_api() {
    let mock = MockUpstream::start().await.unwrap();
    let server = setup(&mock).await;

    server.complete("cohere", &chat(false)).await;

    let sent = mock.last_request();
    assert_eq!(sent.path, "/v1/chat");
    assert_eq!(sent.header("authorization"), Some("Bearer test-key"));
    assert_eq!(sent.body["message"], "What is the weather?");

    let roles: Vec<_> = sent.body["chat_history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["role"].as_str().unwrap().to_owned())
        .collect();
    assert_eq!(roles, ["SYSTEM", "USER", "CHATBOT"]);
}

#[tokio::test]
async fn response_is_normalized() {
    let mock = MockUpstream::start().await.unwrap();
    let server = setup(&mock).await;

    let (status, body) = server.complete("cohere", &chat(false)).await;

    assert_eq!(status, 200);
    assert_eq!(body["id"], "gen-test");
    assert_eq!(body["choices"][0]["message"]["content"], CONTENT);
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
    assert_eq!(body["usage"]["total_tokens"], 15);
}

#[tokio::test]
async fn tool_calls_get_synthetic_ids() {
    let mock = MockUpstream::start_with_tool_call().await.unwrap();
    let server = setup(&mock).await;

    let (_, body) = server.complete("cohere", &chat(false)).await;

    let call = &body["choices"][0]["message"]["tool_calls"][0];
    assert_eq!(call["id"], "call_gen-test_0");
    assert_eq!(call["function"]["name"], "get_weather");
    assert_eq!(body["choices"][0]["finish_reason"], "tool_calls");
}

#[tokio::test]
async fn ndjson_stream_is_normalized_to_sse() {
    let mock = MockUpstream::start().await.unwrap();
    let server = setup(&mock).await;

    let lines = server.stream("cohere", &chat(true)).await;

    assert_eq!(lines.last().map(String::as_str), Some("[DONE]"));
    let chunks = sse::chunks(&lines);
    assert_eq!(sse::content(&chunks).trim_end(), CONTENT);

    let last = chunks.last().unwrap();
    assert_eq!(last["choices"][0]["finish_reason"], "stop");
    assert_eq!(last["usage"]["completion_tokens"], 5);
}

#[tokio::test]
async fn streamed_tool_calls_are_replayed() {
    let mock = MockUpstream::start_with_tool_call().await.unwrap();
    let server = setup(&mock).await;

    let lines = server.stream("cohere", &chat(true)).await;
    let chunks = sse::chunks(&lines);

    assert_eq!(sse::tool_names(&chunks), ["get_weather"]);
    let arguments: serde_json::Value = serde_json::from_str(&sse::tool_arguments(&chunks)[0]).unwrap();
    assert_eq!(arguments, json!({"location": "San Francisco"}));
    assert_eq!(chunks.last().unwrap()["choices"][0]["finish_reason"], "tool_calls");
}
