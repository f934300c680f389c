//! Configuration for the Conduit gateway
//!
//! Loaded from a TOML file with `{{ env.VAR }}` placeholders expanded
//! before deserialization.

#![allow(clippy::must_use_candidate)]

mod env;
pub mod health;
pub mod llm;
mod loader;
pub mod server;
pub mod telemetry;

use serde::Deserialize;

pub use health::*;
pub use llm::*;
pub use server::*;
pub use telemetry::TelemetryConfig;

/// Top-level Conduit configuration
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// LLM provider configuration
    #[serde(default)]
    pub llm: LlmConfig,
    /// Telemetry configuration
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}
