use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, expansion or parsing
    /// fails, or validation rejects the result
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing or validation fails
    pub fn from_toml(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if no provider is configured, a provider, policy
    /// or pricing entry is invalid, or the health probe or trace sampling
    /// settings are out of range
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_server()?;
        self.validate_telemetry()?;
        self.validate_llm_providers()?;
        self.validate_content_policy()?;
        self.validate_pricing()?;
        Ok(())
    }

    fn validate_server(&self) -> anyhow::Result<()> {
        let health = &self.server.health;
        if !health.enabled {
            return Ok(());
        }

        if !health.path.starts_with('/') {
            anyhow::bail!("server.health.path '{}' must start with '/'", health.path);
        }
        if health.overlaps_llm_routes() {
            anyhow::bail!("server.health.path '{}' must not be under /v1", health.path);
        }

        Ok(())
    }

    fn validate_telemetry(&self) -> anyhow::Result<()> {
        let tracing = self.telemetry.as_ref().and_then(|t| t.tracing.as_ref());
        if let Some(tracing) = tracing
            && !tracing.has_valid_sampling_rate()
        {
            anyhow::bail!("telemetry.tracing.sampling_rate must be between 0.0 and 1.0");
        }

        Ok(())
    }

    fn validate_llm_providers(&self) -> anyhow::Result<()> {
        if !self.llm.enabled {
            return Ok(());
        }

        if !self.llm.providers.values().any(|p| p.enabled) {
            anyhow::bail!("at least one enabled LLM provider must be configured");
        }

        for name in self.llm.providers.keys() {
            if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
                anyhow::bail!("provider name '{name}' must be non-empty and contain only [A-Za-z0-9_-]");
            }
        }

        if self.llm.request_timeout.is_zero() {
            anyhow::bail!("llm.request_timeout must be greater than zero");
        }

        Ok(())
    }

    fn validate_content_policy(&self) -> anyhow::Result<()> {
        for pattern in self.llm.content_policy.vision_model_patterns() {
            regex::Regex::new(&pattern)
                .map_err(|e| anyhow::anyhow!("invalid vision model pattern '{pattern}': {e}"))?;
        }

        if self.llm.content_policy.max_image_bytes == 0 {
            anyhow::bail!("llm.content_policy.max_image_bytes must be greater than zero");
        }

        Ok(())
    }

    fn validate_pricing(&self) -> anyhow::Result<()> {
        for (model, price) in &self.llm.pricing {
            if !price.input.is_finite() || price.input < 0.0 || !price.output.is_finite() || price.output < 0.0 {
                anyhow::bail!("pricing for model '{model}' must be finite and non-negative");
            }
        }

        Ok(())
    }
}
