//! Upstream client bound to one provider family
//!
//! In mock mode the client answers from the family's canned payloads and
//! never touches the network.

mod decode;
mod transport;

use std::marker::PhantomData;
use std::pin::Pin;
use std::time::Duration;

use futures_util::Stream;
use secrecy::SecretString;
use url::Url;

pub use decode::{decode_ndjson, decode_sse};

use self::transport::HttpTransport;
use crate::error::LlmError;
use crate::provider::{ProviderFamily, ProviderId};

/// Base URL used by `openai` routes without one configured
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Native stream events as they are decoded
pub type ChunkStream<C> = Pin<Box<dyn Stream<Item = Result<C, LlmError>> + Send>>;

/// Framing of a streamed response body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFormat {
    /// `text/event-stream` with JSON `data:` payloads
    Sse,
    /// One JSON object per line
    Ndjson,
}

/// Per-route client settings
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub mock_mode: bool,
    /// Overrides the provider's default base URL
    pub base_url: Option<Url>,
    /// Shared connection pool
    pub http: reqwest::Client,
    /// Deadline for non-streaming requests
    pub request_timeout: Duration,
}

#[derive(Debug)]
enum Transport {
    Http(HttpTransport),
    Mock,
}

/// Client for one provider, typed by its wire family
#[derive(Debug)]
pub struct ProviderClient<F> {
    provider: ProviderId,
    transport: Transport,
    _family: PhantomData<fn() -> F>,
}

impl<F: ProviderFamily> ProviderClient<F> {
    pub(crate) fn new(
        provider: ProviderId,
        api_key: Option<SecretString>,
        options: ClientOptions,
    ) -> Result<Self, LlmError> {
        let transport = if options.mock_mode {
            Transport::Mock
        } else {
            let base_url = match &options.base_url {
                Some(url) => url.as_str().to_owned(),
                None => provider
                    .default_base_url()
                    .or_else(|| (provider == ProviderId::Openai).then_some(OPENAI_BASE_URL))
                    .ok_or_else(|| anyhow::anyhow!("provider '{provider}' requires a base_url"))?
                    .to_owned(),
            };
            let url = format!("{}{}", base_url.trim_end_matches('/'), F::endpoint());

            Transport::Http(HttpTransport::new(options.http, url, api_key, options.request_timeout))
        };

        Ok(Self {
            provider,
            transport,
            _family: PhantomData,
        })
    }

    pub const fn provider(&self) -> ProviderId {
        self.provider
    }

    pub const fn is_mock(&self) -> bool {
        matches!(self.transport, Transport::Mock)
    }

    /// Endpoint requests are posted to; `None` in mock mode
    pub fn url(&self) -> Option<&str> {
        match &self.transport {
            Transport::Http(http) => Some(http.url()),
            Transport::Mock => None,
        }
    }

    pub(crate) async fn send(&self, request: &F::NativeRequest) -> Result<F::NativeResponse, LlmError> {
        match &self.transport {
            Transport::Http(http) => http.send::<F>(request).await,
            Transport::Mock => Ok(F::mock_response(request)),
        }
    }

    pub(crate) async fn send_stream(&self, request: &F::NativeRequest) -> Result<ChunkStream<F::Chunk>, LlmError> {
        match &self.transport {
            Transport::Http(http) => http.send_stream::<F>(request).await,
            Transport::Mock => Ok(Box::pin(futures_util::stream::iter(
                F::mock_stream(request).into_iter().map(Ok),
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::StreamExt;

    use super::*;
    use crate::adapter::{AdapterContext, RequestAdapter, ResponseAdapter};
    use crate::protocol::openai::OpenAiRequest;
    use crate::provider::{AnthropicFamily, CohereFamily, OpenAiFamily, ProviderFactory};

    fn options(mock_mode: bool, base_url: Option<&str>) -> ClientOptions {
        ClientOptions {
            mock_mode,
            base_url: base_url.map(|url| Url::parse(url).unwrap()),
            http: reqwest::Client::new(),
            request_timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn endpoint_urls() {
        let client = ProviderFactory::<OpenAiFamily>::new(ProviderId::Openai)
            .create_client(None, options(false, None))
            .unwrap();
        assert_eq!(client.url(), Some("https://api.openai.com/v1/chat/completions"));

        let client = ProviderFactory::<OpenAiFamily>::new(ProviderId::Deepseek)
            .create_client(None, options(false, None))
            .unwrap();
        assert_eq!(client.url(), Some("https://api.deepseek.com/chat/completions"));

        let client = ProviderFactory::<AnthropicFamily>::new(ProviderId::Anthropic)
            .create_client(None, options(false, Some("http://127.0.0.1:9000/v1/")))
            .unwrap();
        assert_eq!(client.url(), Some("http://127.0.0.1:9000/v1/messages"));

        let client = ProviderFactory::<CohereFamily>::new(ProviderId::Cohere)
            .create_client(None, options(false, None))
            .unwrap();
        assert_eq!(client.url(), Some("https://api.cohere.com/v1/chat"));
    }

    #[test]
    fn vllm_requires_base_url() {
        let err = ProviderFactory::<OpenAiFamily>::new(ProviderId::Vllm)
            .create_client(None, options(false, None))
            .unwrap_err();
        assert!(err.to_string().contains("requires a base_url"));

        let client = ProviderFactory::<OpenAiFamily>::new(ProviderId::Vllm)
            .create_client(None, options(true, None))
            .unwrap();
        assert!(client.is_mock());
        assert_eq!(client.url(), None);
    }

    #[tokio::test]
    async fn mock_mode_serves_canned_payloads() {
        let factory = ProviderFactory::<CohereFamily>::new(ProviderId::Cohere);
        let client = factory.create_client(None, options(true, None)).unwrap();
        let request: OpenAiRequest = serde_json::from_value(serde_json::json!({
            "model": "command-r",
            "messages": [{"role": "user", "content": "hi"}]
        }))
        .unwrap();
        let native = factory
            .create_request_adapter(request, AdapterContext::default())
            .to_provider_request()
            .request;

        let response = factory.execute(&client, native.clone()).await.unwrap();
        let adapter = factory.create_response_adapter(response);
        assert!(adapter.get_text().contains("command-r"));

        let events: Vec<_> = factory.execute_stream(&client, native).await.unwrap().collect().await;
        assert!(events.iter().all(Result::is_ok));
        assert!(events.len() > 2);
    }
}
