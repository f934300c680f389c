use serde::Deserialize;

/// Liveness probe served next to the `/v1/{provider}` routes
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HealthConfig {
    /// Mount the probe at all
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Absolute path of the probe; must stay outside `/v1/`
    #[serde(default = "default_path")]
    pub path: String,
}

impl HealthConfig {
    /// Whether the probe path would shadow or collide with a provider route
    pub fn overlaps_llm_routes(&self) -> bool {
        self.path == "/v1" || self.path.starts_with("/v1/")
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            path: default_path(),
        }
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_enabled() -> bool {
    true
}

fn default_path() -> String {
    "/health".to_owned()
}
