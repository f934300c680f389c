//! Tool result compression
//!
//! JSON tool results are re-encoded as TOON when, and only when, that
//! strictly lowers the token count. Token counts come from the injected
//! tokenizer and savings are priced with the injected lookup.

pub mod tokenizer;
pub mod toon;

use std::borrow::Cow;
use std::sync::Arc;

pub use tokenizer::{TiktokenTokenizer, Tokenizer, TokenizerFamily, TokenizerMessage, Tokenizers};

use crate::pricing::PricingLookup;
use crate::protocol::openai::{OpenAiContent, OpenAiMessage};
use crate::types::ToolCompressionStats;

/// Re-encodes JSON tool results for one provider family
#[derive(Clone)]
pub struct ToolCompressor {
    tokenizer: Arc<dyn Tokenizer>,
    pricing: Arc<dyn PricingLookup>,
}

impl std::fmt::Debug for ToolCompressor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCompressor").finish_non_exhaustive()
    }
}

impl ToolCompressor {
    pub fn new(tokenizer: Arc<dyn Tokenizer>, pricing: Arc<dyn PricingLookup>) -> Self {
        Self { tokenizer, pricing }
    }

    /// Compress string tool results in place
    ///
    /// Results that are not JSON are left alone and excluded from the
    /// totals. `model` selects the input price used for `cost_savings`.
    pub fn compress(&self, messages: &mut [OpenAiMessage], model: &str) -> ToolCompressionStats {
        let mut had_tool_results = false;
        let mut compressed = 0usize;
        let mut tokens_before = 0usize;
        let mut tokens_after = 0usize;

        for message in messages.iter_mut().filter(|m| m.is_tool()) {
            had_tool_results = true;

            let Some(OpenAiContent::Text(content)) = &message.content else {
                continue;
            };

            let Some((before, after, encoded)) = self.encode(content) else {
                tracing::debug!(
                    tool_call_id = message.tool_call_id.as_deref().unwrap_or_default(),
                    "skipping compression, tool result is not json"
                );
                continue;
            };
            tokens_before += before;

            if after < before {
                tokens_after += after;
                compressed += 1;
                message.content = Some(OpenAiContent::Text(encoded));
            } else {
                tokens_after += before;
            }
        }

        let saved = tokens_before.saturating_sub(tokens_after);
        let cost_savings = if saved > 0 {
            self.pricing
                .find_by_model(model)
                .map_or(0.0, |price| tokens_to_f64(saved) * price.price_per_million_input / 1_000_000.0)
        } else {
            0.0
        };

        let stats = ToolCompressionStats::new(tokens_before, tokens_after, cost_savings, had_tool_results);

        if had_tool_results {
            tracing::debug!(
                model,
                compressed,
                tokens_before,
                tokens_after,
                cost_savings,
                "tool result compression complete"
            );
        }

        stats
    }

    /// Token counts of the unwrapped JSON and its TOON form, and the TOON text
    fn encode(&self, content: &str) -> Option<(usize, usize, String)> {
        let unwrapped = unwrap_tool_content(content);
        let value = serde_json::from_str::<serde_json::Value>(&unwrapped).ok()?;
        let encoded = toon::encode(&value);

        Some((self.count(&unwrapped), self.count(&encoded), encoded))
    }

    fn count(&self, content: &str) -> usize {
        self.tokenizer.count_tokens(&[TokenizerMessage::user(content)])
    }
}

#[allow(clippy::cast_precision_loss)]
const fn tokens_to_f64(tokens: usize) -> f64 {
    tokens as f64
}

/// Unwrap MCP text content to the payload it carries
///
/// A JSON array of text blocks, or an object whose `content` is one, becomes
/// the blocks' text joined by newlines. Anything else is returned as is.
pub fn unwrap_tool_content(content: &str) -> Cow<'_, str> {
    let Ok(value) = serde_json::from_str::<serde_json::Value>(content) else {
        return Cow::Borrowed(content);
    };

    let blocks = match &value {
        serde_json::Value::Array(blocks) => blocks,
        serde_json::Value::Object(object) => match object.get("content") {
            Some(serde_json::Value::Array(blocks)) => blocks,
            _ => return Cow::Borrowed(content),
        },
        _ => return Cow::Borrowed(content),
    };

    let texts: Option<Vec<&str>> = blocks.iter().map(text_block).collect();
    match texts {
        Some(texts) if !texts.is_empty() => Cow::Owned(texts.join("\n")),
        _ => Cow::Borrowed(content),
    }
}

fn text_block(block: &serde_json::Value) -> Option<&str> {
    if block.get("type")?.as_str()? != "text" {
        return None;
    }
    block.get("text")?.as_str()
}
