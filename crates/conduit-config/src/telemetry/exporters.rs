use std::collections::HashMap;

use serde::Deserialize;
use url::Url;

/// OTLP collector receiving gateway spans
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExporterConfig {
    /// Collector endpoint, e.g. `http://otel-collector:4317`
    pub endpoint: Url,
    #[serde(default)]
    pub protocol: ExportProtocol,
    /// Extra headers for the collector, honored over `http_proto` only
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

/// Wire protocol spoken to the collector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExportProtocol {
    #[default]
    Grpc,
    HttpProto,
}
