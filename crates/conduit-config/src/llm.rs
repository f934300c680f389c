use std::time::Duration;

use indexmap::IndexMap;
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use url::Url;

/// Default upper bound for a single inline image, in decoded bytes
pub const DEFAULT_MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Model name patterns known to accept image input
///
/// Matched case-insensitively against the target model name.
pub const DEFAULT_VISION_MODELS: &[&str] = &[
    r"gpt-4o",
    r"gpt-4\.1",
    r"gpt-4-turbo",
    r"gpt-5",
    r"^o[134](-|$)",
    r"claude-3",
    r"claude-(opus|sonnet|haiku)-4",
    r"gemini",
    r"llava",
    r"pixtral",
    r"vision",
    r"-vl\b",
    r"glm-4(\.\d+)?v",
    r"llama-4",
];

/// Top-level LLM configuration
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Whether the LLM endpoints are mounted
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Serve canned responses instead of calling upstream providers
    #[serde(default)]
    pub mock_mode: bool,
    /// Upstream request timeout (e.g. "120s", "2m")
    #[serde(default = "default_request_timeout", deserialize_with = "deserialize_duration")]
    pub request_timeout: Duration,
    /// Provider configurations keyed by route name
    #[serde(default)]
    pub providers: IndexMap<String, LlmProviderConfig>,
    /// Tool result compression
    #[serde(default)]
    pub compression: CompressionConfig,
    /// Image handling for tool results
    #[serde(default)]
    pub content_policy: ContentPolicyConfig,
    /// Per-model token prices in USD per million tokens
    #[serde(default)]
    pub pricing: IndexMap<String, ModelPricing>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mock_mode: false,
            request_timeout: default_request_timeout(),
            providers: IndexMap::new(),
            compression: CompressionConfig::default(),
            content_policy: ContentPolicyConfig::default(),
            pricing: IndexMap::new(),
        }
    }
}

/// Configuration for a single LLM provider
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LlmProviderConfig {
    /// Upstream provider
    #[serde(rename = "type")]
    pub provider_type: LlmProviderType,
    /// API key used when the client does not send one
    #[serde(default)]
    pub api_key: Option<SecretString>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<Url>,
    /// Whether the route is served
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Supported upstream providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderType {
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

/// Tool result compression settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompressionConfig {
    /// Re-encode JSON tool results as TOON when it saves tokens
    #[serde(default)]
    pub enabled: bool,
}

/// Image handling settings for tool results
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentPolicyConfig {
    /// Largest image forwarded upstream, in decoded bytes
    #[serde(default = "default_max_image_bytes")]
    pub max_image_bytes: usize,
    /// Regex patterns for models that accept images
    ///
    /// Replaces the built-in list when set.
    #[serde(default)]
    pub vision_models: Option<Vec<String>>,
}

impl Default for ContentPolicyConfig {
    fn default() -> Self {
        Self {
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            vision_models: None,
        }
    }
}

impl ContentPolicyConfig {
    /// Effective vision model patterns
    pub fn vision_model_patterns(&self) -> Vec<String> {
        self.vision_models.clone().unwrap_or_else(|| {
            DEFAULT_VISION_MODELS
                .iter()
                .map(|pattern| (*pattern).to_owned())
                .collect()
        })
    }
}

/// Token prices for a model, USD per million tokens
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelPricing {
    pub input: f64,
    #[serde(default)]
    pub output: f64,
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    duration_str::parse(&raw).map_err(|e| serde::de::Error::custom(format!("invalid duration '{raw}': {e}")))
}

const fn default_request_timeout() -> Duration {
    Duration::from_secs(120)
}

#[allow(clippy::missing_const_for_fn)]
fn default_true() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_max_image_bytes() -> usize {
    DEFAULT_MAX_IMAGE_BYTES
}

#[cfg(test)]
mod tests {
    use indoc::indoc;
    use secrecy::ExposeSecret;

    use super::*;

    #[test]
    fn defaults_when_section_is_empty() {
        let config: LlmConfig = toml::from_str("").unwrap();

        assert!(config.enabled);
        assert!(!config.mock_mode);
        assert!(!config.compression.enabled);
        assert_eq!(config.request_timeout, Duration::from_secs(120));
        assert_eq!(config.content_policy.max_image_bytes, DEFAULT_MAX_IMAGE_BYTES);
        assert_eq!(config.content_policy.vision_model_patterns().len(), DEFAULT_VISION_MODELS.len());
    }

    #[test]
    fn parses_providers_in_order() {
        let config: LlmConfig = toml::from_str(indoc! {r#"
            request_timeout = "30s"

            [providers.deepseek]
            type = "deepseek"
            api_key = "sk-test"

            [providers.local]
            type = "vllm"
            base_url = "http://localhost:8000/v1"
            enabled = false
        "#})
        .unwrap();

        let names: Vec<_> = config.providers.keys().cloned().collect();
        assert_eq!(names, ["deepseek", "local"]);

        let deepseek = &config.providers["deepseek"];
        assert_eq!(deepseek.provider_type, LlmProviderType::Deepseek);
        assert_eq!(deepseek.api_key.as_ref().unwrap().expose_secret(), "sk-test");
        assert!(deepseek.enabled);

        let local = &config.providers["local"];
        assert_eq!(local.provider_type, LlmProviderType::Vllm);
        assert_eq!(local.base_url.as_ref().unwrap().as_str(), "http://localhost:8000/v1");
        assert!(!local.enabled);

        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn parses_pricing_and_policy() {
        let config: LlmConfig = toml::from_str(indoc! {r#"
            [compression]
            enabled = true

            [content_policy]
            max_image_bytes = 1024
            vision_models = ["^my-vision-"]

            [pricing."deepseek-chat"]
            input = 0.27
            output = 1.1
        "#})
        .unwrap();

        assert!(config.compression.enabled);
        assert_eq!(config.content_policy.max_image_bytes, 1024);
        assert_eq!(config.content_policy.vision_model_patterns(), ["^my-vision-"]);

        let price = config.pricing["deepseek-chat"];
        assert!((price.input - 0.27).abs() < f64::EPSILON);
        assert!((price.output - 1.1).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_unknown_provider_type() {
        let err = toml::from_str::<LlmConfig>(indoc! {r#"
            [providers.x]
            type = "bedrock"
        "#})
        .unwrap_err();

        insta::assert_snapshot!(err.message(), @"unknown variant `bedrock`, expected one of `openai`, `deepseek`, `cerebras`, `gemini`, `vllm`, `ollama`, `zhipuai`, `anthropic`, `cohere`");
    }

    #[test]
    fn rejects_invalid_duration() {
        let err = toml::from_str::<LlmConfig>(r#"request_timeout = "soon""#).unwrap_err();
        assert!(err.message().contains("invalid duration 'soon'"));
    }
}
