use serde::Deserialize;

use super::exporters::ExporterConfig;

/// Sampling and export of `llm.request` spans
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TracingConfig {
    /// Fraction of requests traced, in `0.0..=1.0`
    #[serde(default = "default_sampling_rate")]
    pub sampling_rate: f64,
    /// Follow the caller's `traceparent` sampling decision when present
    #[serde(default = "default_parent_based")]
    pub parent_based: bool,
    /// Span exporter, replacing `telemetry.exporter`
    #[serde(default)]
    pub exporter: Option<ExporterConfig>,
}

impl TracingConfig {
    pub fn has_valid_sampling_rate(&self) -> bool {
        (0.0..=1.0).contains(&self.sampling_rate)
    }
}

#[allow(clippy::missing_const_for_fn)]
fn default_sampling_rate() -> f64 {
    1.0
}

#[allow(clippy::missing_const_for_fn)]
fn default_parent_based() -> bool {
    true
}
