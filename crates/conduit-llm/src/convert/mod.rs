//! Conversion between the downstream `OpenAI` contract and native wire formats
//!
//! Each submodule handles one provider family. OpenAI-compatible providers
//! need no conversion beyond what the adapters do.

use std::time::{SystemTime, UNIX_EPOCH};

pub mod anthropic;
pub mod cohere;

/// Seconds since the Unix epoch, `0` if the clock is before it
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Parse a tool-call arguments string
///
/// Providers occasionally emit truncated or empty argument strings; those
/// become an empty object rather than an error.
pub fn parse_arguments(arguments: &str) -> serde_json::Value {
    match serde_json::from_str::<serde_json::Value>(arguments) {
        Ok(value) if value.is_object() => value,
        _ => serde_json::Value::Object(serde_json::Map::new()),
    }
}

/// Split a `data:{mime};base64,{data}` URI into media type and payload
pub fn split_data_uri(url: &str) -> Option<(&str, &str)> {
    let rest = url.strip_prefix("data:")?;
    let (header, data) = rest.split_once(',')?;
    let media_type = header.strip_suffix(";base64")?;
    Some((media_type, data))
}

pub fn data_uri(media_type: &str, data: &str) -> String {
    format!("data:{media_type};base64,{data}")
}
