//! Provider registry and per-family wiring
//!
//! A [`ProviderId`] names an upstream service and maps onto one of three
//! wire families. Each family implements [`ProviderFamily`], whose
//! associated types pin the adapters and native payloads, so everything
//! past route selection is statically dispatched.

pub mod anthropic;
pub mod cohere;
pub mod openai;

use std::marker::PhantomData;

use async_trait::async_trait;
use conduit_config::LlmProviderType;
use http::HeaderMap;
use http::header::AUTHORIZATION;
use secrecy::SecretString;
use serde::Serialize;
use serde::de::DeserializeOwned;

pub use anthropic::AnthropicFamily;
pub use cohere::CohereFamily;
pub use openai::OpenAiFamily;

use crate::adapter::{AdapterContext, RequestAdapter, ResponseAdapter, StreamAdapter};
use crate::client::{ChunkStream, ClientOptions, ProviderClient, StreamFormat};
use crate::compression::TokenizerFamily;
use crate::error::LlmError;
use crate::protocol::openai::OpenAiRequest;

/// Message used when an error carries no usable text
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Upstream service a route points at
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr, strum::EnumIter,
)]
#[strum(serialize_all = "lowercase")]
pub enum ProviderId {
    Openai,
    Deepseek,
    Cerebras,
    Gemini,
    Vllm,
    Ollama,
    Zhipuai,
    Anthropic,
    Cohere,
}

/// Native protocol spoken by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum WireFamily {
    OpenAiCompatible,
    Anthropic,
    Cohere,
}

impl From<LlmProviderType> for ProviderId {
    fn from(provider_type: LlmProviderType) -> Self {
        match provider_type {
            LlmProviderType::Openai => Self::Openai,
            LlmProviderType::Deepseek => Self::Deepseek,
            LlmProviderType::Cerebras => Self::Cerebras,
            LlmProviderType::Gemini => Self::Gemini,
            LlmProviderType::Vllm => Self::Vllm,
            LlmProviderType::Ollama => Self::Ollama,
            LlmProviderType::Zhipuai => Self::Zhipuai,
            LlmProviderType::Anthropic => Self::Anthropic,
            LlmProviderType::Cohere => Self::Cohere,
        }
    }
}

impl ProviderId {
    pub const fn family(self) -> WireFamily {
        match self {
            Self::Anthropic => WireFamily::Anthropic,
            Self::Cohere => WireFamily::Cohere,
            _ => WireFamily::OpenAiCompatible,
        }
    }

    /// Base URL used when the route does not configure one
    ///
    /// `None` means the client default (`openai`) or that the route must
    /// configure one (`vllm`).
    pub const fn default_base_url(self) -> Option<&'static str> {
        match self {
            Self::Openai | Self::Vllm => None,
            Self::Deepseek => Some("https://api.deepseek.com"),
            Self::Cerebras => Some("https://api.cerebras.ai/v1"),
            Self::Gemini => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
            Self::Ollama => Some("http://localhost:11434/v1"),
            Self::Zhipuai => Some("https://open.bigmodel.cn/api/paas/v4"),
            Self::Anthropic => Some("https://api.anthropic.com/v1"),
            Self::Cohere => Some("https://api.cohere.com/v1"),
        }
    }

    /// Name of the tracing span wrapping one upstream call
    pub const fn span_name(self) -> &'static str {
        match self {
            Self::Openai => "openai.chat.completions",
            Self::Deepseek => "deepseek.chat.completions",
            Self::Cerebras => "cerebras.chat.completions",
            Self::Gemini => "gemini.chat.completions",
            Self::Vllm => "vllm.chat.completions",
            Self::Ollama => "ollama.chat.completions",
            Self::Zhipuai => "zhipuai.chat.completions",
            Self::Anthropic => "anthropic.messages",
            Self::Cohere => "cohere.chat",
        }
    }

    pub const fn interaction_type(self) -> &'static str {
        match self {
            Self::Openai => "openai:chatCompletions",
            Self::Deepseek => "deepseek:chatCompletions",
            Self::Cerebras => "cerebras:chatCompletions",
            Self::Gemini => "gemini:chatCompletions",
            Self::Vllm => "vllm:chatCompletions",
            Self::Ollama => "ollama:chatCompletions",
            Self::Zhipuai => "zhipuai:chatCompletions",
            Self::Anthropic => "anthropic:messages",
            Self::Cohere => "cohere:chat",
        }
    }

    pub const fn tokenizer_family(self) -> TokenizerFamily {
        match self.family() {
            WireFamily::OpenAiCompatible => TokenizerFamily::OpenAi,
            WireFamily::Anthropic => TokenizerFamily::Anthropic,
            WireFamily::Cohere => TokenizerFamily::Cohere,
        }
    }

    /// Whether streamed requests ask for a trailing usage chunk
    pub const fn include_stream_usage(self) -> bool {
        matches!(self.family(), WireFamily::OpenAiCompatible)
    }

    /// API key sent by the downstream caller, if any
    ///
    /// Anthropic routes read `x-api-key` first. The `Bearer` scheme is
    /// stripped in any case; a scheme with no token counts as no key.
    pub fn extract_api_key(self, headers: &HeaderMap) -> Option<String> {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
        };

        let raw = match self {
            Self::Anthropic => header("x-api-key").or_else(|| header(AUTHORIZATION.as_str())),
            _ => header(AUTHORIZATION.as_str()),
        }?;

        let key = match raw.split_once(' ') {
            Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") => token.trim(),
            None if raw.eq_ignore_ascii_case("bearer") => "",
            _ => raw,
        };
        (!key.is_empty()).then(|| key.to_owned())
    }
}

// -- Provider family --

/// One native wire protocol and its adapter set
#[async_trait]
pub trait ProviderFamily: Send + Sync + Sized + 'static {
    const WIRE: WireFamily;
    /// How streamed responses are framed
    const STREAM_FORMAT: StreamFormat;

    type NativeRequest: Serialize + Send + Sync;
    type NativeResponse: Serialize + DeserializeOwned + Send;
    type Chunk: Serialize + DeserializeOwned + Send + 'static;

    type RequestAdapter: RequestAdapter<ProviderRequest = Self::NativeRequest>;
    type ResponseAdapter: ResponseAdapter<ProviderResponse = Self::NativeResponse>;
    type StreamAdapter: StreamAdapter<Chunk = Self::Chunk, ProviderResponse = Self::NativeResponse> + 'static;

    fn create_request_adapter(request: OpenAiRequest, context: AdapterContext) -> Self::RequestAdapter;

    fn create_response_adapter(response: Self::NativeResponse) -> Self::ResponseAdapter;

    fn create_stream_adapter() -> Self::StreamAdapter;

    /// Path appended to the base URL
    fn endpoint() -> &'static str;

    /// Attach credentials and protocol headers
    fn authorize(builder: reqwest::RequestBuilder, api_key: Option<&str>) -> reqwest::RequestBuilder;

    /// Set the streaming flags on an outgoing request
    fn prepare(request: &mut Self::NativeRequest, stream: bool);

    /// Message from the provider's error envelope
    fn parse_error_message(body: &str) -> Option<String>;

    /// Human-readable message for any error, never empty
    fn extract_error_message(error: &LlmError) -> String {
        if let LlmError::Upstream { body, .. } = error
            && let Some(message) = Self::parse_error_message(body)
        {
            return message;
        }

        match error {
            LlmError::Transport(message) | LlmError::Streaming(message) | LlmError::InvalidRequest(message)
                if message.trim().is_empty() =>
            {
                INTERNAL_ERROR_MESSAGE.to_owned()
            }
            _ => error.to_string(),
        }
    }

    /// Canned response served in mock mode
    fn mock_response(request: &Self::NativeRequest) -> Self::NativeResponse;

    /// Canned stream served in mock mode
    fn mock_stream(request: &Self::NativeRequest) -> Vec<Self::Chunk>;

    /// Send a non-streaming request
    async fn execute(
        client: &ProviderClient<Self>,
        mut request: Self::NativeRequest,
    ) -> Result<Self::NativeResponse, LlmError> {
        Self::prepare(&mut request, false);
        client.send(&request).await
    }

    /// Send a streaming request and decode the native event stream
    async fn execute_stream(
        client: &ProviderClient<Self>,
        mut request: Self::NativeRequest,
    ) -> Result<ChunkStream<Self::Chunk>, LlmError> {
        Self::prepare(&mut request, true);
        client.send_stream(&request).await
    }
}

/// Entry point for one provider: adapters, client and metadata
#[derive(Debug, Clone, Copy)]
pub struct ProviderFactory<F> {
    provider: ProviderId,
    _family: PhantomData<fn() -> F>,
}

impl<F: ProviderFamily> ProviderFactory<F> {
    pub const fn new(provider: ProviderId) -> Self {
        Self {
            provider,
            _family: PhantomData,
        }
    }

    pub const fn provider(&self) -> ProviderId {
        self.provider
    }

    pub fn create_request_adapter(&self, request: OpenAiRequest, context: AdapterContext) -> F::RequestAdapter {
        F::create_request_adapter(request, context)
    }

    pub fn create_response_adapter(&self, response: F::NativeResponse) -> F::ResponseAdapter {
        F::create_response_adapter(response)
    }

    pub fn create_stream_adapter(&self) -> F::StreamAdapter {
        F::create_stream_adapter()
    }

    pub fn extract_api_key(&self, headers: &HeaderMap) -> Option<String> {
        self.provider.extract_api_key(headers)
    }

    pub const fn base_url(&self) -> Option<&'static str> {
        self.provider.default_base_url()
    }

    pub const fn span_name(&self) -> &'static str {
        self.provider.span_name()
    }

    pub const fn interaction_type(&self) -> &'static str {
        self.provider.interaction_type()
    }

    /// Client bound to this provider
    ///
    /// # Errors
    ///
    /// Returns an error if no base URL is configured and the provider has
    /// no default
    pub fn create_client(
        &self,
        api_key: Option<SecretString>,
        options: ClientOptions,
    ) -> Result<ProviderClient<F>, LlmError> {
        ProviderClient::new(self.provider, api_key, options)
    }

    pub async fn execute(
        &self,
        client: &ProviderClient<F>,
        request: F::NativeRequest,
    ) -> Result<F::NativeResponse, LlmError> {
        F::execute(client, request).await
    }

    pub async fn execute_stream(
        &self,
        client: &ProviderClient<F>,
        request: F::NativeRequest,
    ) -> Result<ChunkStream<F::Chunk>, LlmError> {
        F::execute_stream(client, request).await
    }

    pub fn extract_error_message(&self, error: &LlmError) -> String {
        F::extract_error_message(error)
    }
}

/// Words of a mock reply, each with its trailing space except the last
pub(crate) fn mock_words(text: &str) -> Vec<String> {
    let words: Vec<_> = text.split(' ').collect();
    let last = words.len().saturating_sub(1);
    words
        .iter()
        .enumerate()
        .map(|(index, word)| if index == last { (*word).to_owned() } else { format!("{word} ") })
        .collect()
}

pub(crate) fn mock_text(model: &str) -> String {
    format!("This is a mock response from {model}.")
}

pub(crate) fn mock_id(prefix: &str) -> String {
    format!("{prefix}{}", uuid::Uuid::new_v4().simple())
}
