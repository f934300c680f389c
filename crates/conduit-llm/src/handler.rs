//! Axum route handlers for the OpenAI-compatible Chat Completions endpoint
//!
//! Every provider route accepts the same request shape. The handler
//! resolves the route, picks the provider family and relays the native
//! response back in Chat Completions form.

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use http::HeaderMap;
use secrecy::SecretString;
use tracing::{Instrument, Span};

use crate::adapter::{MaterializedRequest, RequestAdapter, ResponseAdapter, StreamAdapter};
use crate::error::LlmError;
use crate::protocol::openai::OpenAiRequest;
use crate::provider::{AnthropicFamily, CohereFamily, OpenAiFamily, ProviderFactory, ProviderFamily, WireFamily};
use crate::relay::relay;
use crate::state::{LlmState, Route};

/// Build the LLM router
pub fn llm_router(state: LlmState) -> Router {
    Router::new()
        .route("/v1/{provider}/chat/completions", routing::post(chat_completions))
        .with_state(state)
}

/// Handle `POST /v1/{provider}/chat/completions`
async fn chat_completions(
    State(state): State<LlmState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let route = match state.route(&provider) {
        Ok(route) => route.clone(),
        Err(e) => {
            tracing::debug!(provider = %provider, "unknown provider route");
            return error_response(&e, &e.to_string());
        }
    };

    let request: OpenAiRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            let error = LlmError::InvalidRequest(format!("malformed body: {e}"));
            return error_response(&error, &error.to_string());
        }
    };

    match route.provider.family() {
        WireFamily::OpenAiCompatible => proxy::<OpenAiFamily>(&state, &route, &headers, request).await,
        WireFamily::Anthropic => proxy::<AnthropicFamily>(&state, &route, &headers, request).await,
        WireFamily::Cohere => proxy::<CohereFamily>(&state, &route, &headers, request).await,
    }
}

async fn proxy<F: ProviderFamily>(
    state: &LlmState,
    route: &Route,
    headers: &HeaderMap,
    request: OpenAiRequest,
) -> Response {
    let factory = ProviderFactory::<F>::new(route.provider);

    let span = tracing::info_span!(
        "llm.request",
        otel.name = factory.span_name(),
        route = %route.name,
        provider = %route.provider,
        interaction = factory.interaction_type(),
        model = %request.model,
        stream = request.stream.unwrap_or(false),
    );

    async {
        match forward(&factory, state, route, headers, request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(status = e.status_code().as_u16(), error = %e, "request failed");
                error_response(&e, &factory.extract_error_message(&e))
            }
        }
    }
    .instrument(span)
    .await
}

async fn forward<F: ProviderFamily>(
    factory: &ProviderFactory<F>,
    state: &LlmState,
    route: &Route,
    headers: &HeaderMap,
    request: OpenAiRequest,
) -> Result<Response, LlmError> {
    let api_key = factory
        .extract_api_key(headers)
        .map(SecretString::from)
        .or_else(|| route.api_key.clone());

    let client = factory.create_client(api_key, state.client_options(route))?;
    let adapter = factory.create_request_adapter(request, state.adapter_context(route.provider));

    let MaterializedRequest {
        request: native,
        compression,
    } = adapter.to_provider_request();

    if let Some(stats) = compression
        && stats.had_tool_results()
    {
        tracing::info!(
            tokens_before = stats.tokens_before(),
            tokens_after = stats.tokens_after(),
            tokens_saved = stats.tokens_saved(),
            cost_savings = stats.cost_savings(),
            effective = stats.was_effective(),
            "tool result compression"
        );
    }

    if adapter.is_streaming() {
        let upstream = factory.execute_stream(&client, native).await?;
        let stream_adapter = factory.create_stream_adapter();
        let sse_headers = stream_adapter.get_sse_headers();
        let frames = relay(stream_adapter, upstream, F::extract_error_message, Span::current());

        return Ok((sse_headers, Body::from_stream(frames)).into_response());
    }

    let response = factory.create_response_adapter(factory.execute(&client, native).await?);
    let usage = response.get_usage();
    tracing::info!(
        response_id = response.get_id(),
        input_tokens = usage.input_tokens,
        output_tokens = usage.output_tokens,
        tool_calls = response.get_tool_calls().len(),
        "completion received"
    );

    Ok(Json(response.to_chat_completion()).into_response())
}

/// Render an error as an OpenAI-style JSON body
fn error_response(error: &LlmError, message: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "message": message,
            "type": error.error_type(),
        }
    });

    (error.status_code(), Json(body)).into_response()
}
