//! Shared state behind the LLM routes
//!
//! Built once from configuration and never mutated afterwards.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use conduit_config::LlmConfig;
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::adapter::AdapterContext;
use crate::client::ClientOptions;
use crate::compression::{ToolCompressor, Tokenizers};
use crate::error::LlmError;
use crate::policy::ContentPolicy;
use crate::pricing::{PricingLookup, StaticPricing};
use crate::provider::ProviderId;

/// A configured provider route
#[derive(Debug, Clone)]
pub struct Route {
    /// Route name, the `{provider}` path segment
    pub name: String,
    pub provider: ProviderId,
    /// Key used when the caller sends none
    pub api_key: Option<SecretString>,
    pub base_url: Option<Url>,
}

/// Shared state for LLM route handlers
#[derive(Clone)]
pub struct LlmState {
    inner: Arc<LlmStateInner>,
}

struct LlmStateInner {
    routes: HashMap<String, Route>,
    policy: Arc<ContentPolicy>,
    compression: Option<Compression>,
    mock_mode: bool,
    request_timeout: Duration,
    http: reqwest::Client,
}

struct Compression {
    tokenizers: Tokenizers,
    pricing: Arc<dyn PricingLookup>,
}

impl LlmState {
    /// Build state from configuration with tiktoken counting and
    /// configured prices
    ///
    /// # Errors
    ///
    /// Returns an error if a content policy pattern does not compile
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let compression = config.compression.enabled.then(|| Compression {
            tokenizers: Tokenizers::tiktoken(),
            pricing: Arc::new(StaticPricing::from_config(&config.pricing)),
        });

        Self::build(config, compression)
    }

    /// Build state with injected token counting and pricing
    ///
    /// The collaborators are only used when compression is enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if a content policy pattern does not compile
    pub fn with_collaborators(
        config: &LlmConfig,
        tokenizers: Tokenizers,
        pricing: Arc<dyn PricingLookup>,
    ) -> Result<Self, LlmError> {
        let compression = config
            .compression
            .enabled
            .then_some(Compression { tokenizers, pricing });

        Self::build(config, compression)
    }

    fn build(config: &LlmConfig, compression: Option<Compression>) -> Result<Self, LlmError> {
        let policy = ContentPolicy::from_config(&config.content_policy)
            .map_err(|e| anyhow::anyhow!("invalid content policy: {e}"))?;

        let routes: HashMap<_, _> = config
            .providers
            .iter()
            .filter(|(_, provider)| provider.enabled)
            .map(|(name, provider)| {
                let route = Route {
                    name: name.clone(),
                    provider: ProviderId::from(provider.provider_type),
                    api_key: provider
                        .api_key
                        .clone()
                        .filter(|key| !key.expose_secret().is_empty()),
                    base_url: provider.base_url.clone(),
                };
                (name.clone(), route)
            })
            .collect();

        for route in routes.values() {
            tracing::debug!(
                route = %route.name,
                provider = %route.provider,
                family = %route.provider.family(),
                has_key = route.api_key.is_some(),
                "registered provider route"
            );
        }

        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;

        Ok(Self {
            inner: Arc::new(LlmStateInner {
                routes,
                policy: Arc::new(policy),
                compression,
                mock_mode: config.mock_mode,
                request_timeout: config.request_timeout,
                http,
            }),
        })
    }

    /// Route registered under `name`
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ProviderNotFound`] if no enabled route has that
    /// name
    pub fn route(&self, name: &str) -> Result<&Route, LlmError> {
        self.inner.routes.get(name).ok_or_else(|| LlmError::ProviderNotFound {
            provider: name.to_owned(),
        })
    }

    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.inner.routes.values()
    }

    pub fn is_mock_mode(&self) -> bool {
        self.inner.mock_mode
    }

    /// Collaborators applied while materializing requests for `provider`
    pub fn adapter_context(&self, provider: ProviderId) -> AdapterContext {
        AdapterContext {
            policy: Arc::clone(&self.inner.policy),
            compressor: self.inner.compression.as_ref().map(|compression| {
                ToolCompressor::new(
                    compression.tokenizers.for_family(provider.tokenizer_family()),
                    Arc::clone(&compression.pricing),
                )
            }),
        }
    }

    pub fn client_options(&self, route: &Route) -> ClientOptions {
        ClientOptions {
            mock_mode: self.inner.mock_mode,
            base_url: route.base_url.clone(),
            http: self.inner.http.clone(),
            request_timeout: self.inner.request_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use conduit_config::Config;

    use super::*;
    use crate::compression::{Tokenizer, TokenizerMessage};

    struct CharCount;

    impl Tokenizer for CharCount {
        fn count_tokens(&self, messages: &[TokenizerMessage]) -> usize {
            messages.iter().map(|m| m.content.len()).sum()
        }
    }

    fn config(raw: &str) -> LlmConfig {
        Config::from_toml(raw).unwrap().llm
    }

    #[test]
    fn registers_enabled_routes_only() {
        let state = LlmState::from_config(&config(
            r#"
            [llm.providers.fast]
            type = "deepseek"
            api_key = "sk-test"

            [llm.providers.claude]
            type = "anthropic"

            [llm.providers.off]
            type = "cohere"
            enabled = false

            [llm.providers.blank]
            type = "openai"
            api_key = ""
            "#,
        ))
        .unwrap();

        assert_eq!(state.routes().count(), 3);
        assert!(state.route("blank").unwrap().api_key.is_none());
        assert_eq!(state.route("fast").unwrap().provider, ProviderId::Deepseek);
        assert!(state.route("fast").unwrap().api_key.is_some());
        assert_eq!(state.route("claude").unwrap().provider, ProviderId::Anthropic);

        let err = state.route("off").unwrap_err();
        assert!(matches!(err, LlmError::ProviderNotFound { provider } if provider == "off"));
        assert!(!state.is_mock_mode());
    }

    #[test]
    fn compressor_only_when_enabled() {
        let raw = r#"
            [llm.providers.deepseek]
            type = "deepseek"
        "#;
        let state = LlmState::from_config(&config(raw)).unwrap();
        assert!(state.adapter_context(ProviderId::Deepseek).compressor.is_none());

        let mut enabled = config(raw);
        enabled.compression.enabled = true;
        let tokenizers = Tokenizers::uniform(Arc::new(CharCount));
        let state = LlmState::with_collaborators(&enabled, tokenizers, Arc::new(StaticPricing::default())).unwrap();
        assert!(state.adapter_context(ProviderId::Deepseek).compressor.is_some());
    }

    #[test]
    fn client_options_follow_route() {
        let state = LlmState::from_config(&config(
            r#"
            [llm]
            mock_mode = true
            request_timeout = "30s"

            [llm.providers.local]
            type = "vllm"
            base_url = "http://localhost:8000/v1"
            "#,
        ))
        .unwrap();

        let options = state.client_options(state.route("local").unwrap());
        assert!(options.mock_mode);
        assert_eq!(options.request_timeout, Duration::from_secs(30));
        assert_eq!(options.base_url.unwrap().as_str(), "http://localhost:8000/v1");
    }
}
