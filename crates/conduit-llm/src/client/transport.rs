use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use super::{ChunkStream, StreamFormat, decode};
use crate::error::LlmError;
use crate::provider::ProviderFamily;

/// Transport posting JSON to one upstream endpoint
#[derive(Debug)]
pub(super) struct HttpTransport {
    http: reqwest::Client,
    url: String,
    api_key: Option<SecretString>,
    request_timeout: Duration,
}

impl HttpTransport {
    pub(super) const fn new(
        http: reqwest::Client,
        url: String,
        api_key: Option<SecretString>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            http,
            url,
            api_key,
            request_timeout,
        }
    }

    pub(super) fn url(&self) -> &str {
        &self.url
    }

    fn builder<F: ProviderFamily>(&self, request: &F::NativeRequest) -> reqwest::RequestBuilder {
        let builder = self.http.post(&self.url).json(request);
        F::authorize(builder, self.api_key.as_ref().map(ExposeSecret::expose_secret))
    }

    pub(super) async fn send<F: ProviderFamily>(
        &self,
        request: &F::NativeRequest,
    ) -> Result<F::NativeResponse, LlmError> {
        let response = self
            .builder::<F>(request)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| transport_error(&self.url, &e))?;

        if !response.status().is_success() {
            return Err(upstream_error(&self.url, response).await);
        }

        let body = response.bytes().await.map_err(|e| transport_error(&self.url, &e))?;
        serde_json::from_slice(&body).map_err(|e| LlmError::Transport(format!("failed to parse response: {e}")))
    }

    /// Send a streaming request
    ///
    /// No total deadline applies; the stream lives as long as the upstream
    /// keeps it open.
    pub(super) async fn send_stream<F: ProviderFamily>(
        &self,
        request: &F::NativeRequest,
    ) -> Result<ChunkStream<F::Chunk>, LlmError> {
        let response = self
            .builder::<F>(request)
            .send()
            .await
            .map_err(|e| transport_error(&self.url, &e))?;

        if !response.status().is_success() {
            return Err(upstream_error(&self.url, response).await);
        }

        let bytes = response.bytes_stream();
        Ok(match F::STREAM_FORMAT {
            StreamFormat::Sse => decode::decode_sse(bytes),
            StreamFormat::Ndjson => decode::decode_ndjson(bytes),
        })
    }
}

fn transport_error(url: &str, error: &reqwest::Error) -> LlmError {
    tracing::error!(url, error = %error, "upstream request failed");
    LlmError::Transport(error.to_string())
}

async fn upstream_error(url: &str, response: reqwest::Response) -> LlmError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(url, status, "upstream returned error");
    LlmError::Upstream { status, body }
}
