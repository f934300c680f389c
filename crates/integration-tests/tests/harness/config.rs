//! Programmatic configuration builder for integration tests

use std::net::SocketAddr;

use conduit_config::{Config, LlmProviderConfig, LlmProviderType, ModelPricing, ServerConfig};
use secrecy::SecretString;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with minimal defaults
    pub fn new() -> Self {
        Self {
            config: Config {
                server: ServerConfig {
                    listen_address: Some(SocketAddr::from(([127, 0, 0, 1], 0))),
                    ..ServerConfig::default()
                },
                ..Config::default()
            },
        }
    }

    /// Add a provider route pointed at a mock upstream
    pub fn with_provider(mut self, name: &str, provider_type: LlmProviderType, base_url: &str) -> Self {
        self.config.llm.providers.insert(
            name.to_owned(),
            LlmProviderConfig {
                provider_type,
                api_key: Some(SecretString::from("test-key")),
                base_url: Some(base_url.parse().expect("valid URL")),
                enabled: true,
            },
        );
        self
    }

    /// Add a provider route with no configured key or base URL
    pub fn with_bare_provider(mut self, name: &str, provider_type: LlmProviderType) -> Self {
        self.config.llm.providers.insert(
            name.to_owned(),
            LlmProviderConfig {
                provider_type,
                api_key: None,
                base_url: None,
                enabled: true,
            },
        );
        self
    }

    pub fn with_mock_mode(mut self) -> Self {
        self.config.llm.mock_mode = true;
        self
    }

    pub fn with_compression(mut self) -> Self {
        self.config.llm.compression.enabled = true;
        self
    }

    pub fn with_pricing(mut self, model: &str, input: f64, output: f64) -> Self {
        self.config
            .llm
            .pricing
            .insert(model.to_owned(), ModelPricing { input, output });
        self
    }

    pub fn with_max_image_bytes(mut self, max_image_bytes: usize) -> Self {
        self.config.llm.content_policy.max_image_bytes = max_image_bytes;
        self
    }

    /// Disable health endpoint
    pub fn without_health(mut self) -> Self {
        self.config.server.health.enabled = false;
        self
    }

    /// Build the final config
    pub fn build(self) -> Config {
        self.config
    }
}
