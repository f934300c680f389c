use serde::Serialize;

/// Token counts reported by a provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageView {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl UsageView {
    pub const fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub const fn total(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// Outcome of compressing the tool results of one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCompressionStats {
    tokens_before: usize,
    tokens_after: usize,
    cost_savings: f64,
    was_effective: bool,
    had_tool_results: bool,
}

impl ToolCompressionStats {
    pub(crate) const fn new(tokens_before: usize, tokens_after: usize, cost_savings: f64, had_tool_results: bool) -> Self {
        Self {
            tokens_before,
            tokens_after,
            cost_savings,
            was_effective: tokens_after < tokens_before,
            had_tool_results,
        }
    }

    /// Tokens across all parseable tool results before compression
    pub const fn tokens_before(&self) -> usize {
        self.tokens_before
    }

    /// Tokens across the same tool results as sent upstream
    pub const fn tokens_after(&self) -> usize {
        self.tokens_after
    }

    /// Input cost saved in USD; zero when no price is known
    pub const fn cost_savings(&self) -> f64 {
        self.cost_savings
    }

    /// Whether compression strictly reduced the token count
    pub const fn was_effective(&self) -> bool {
        self.was_effective
    }

    /// Whether the request contained any tool message
    pub const fn had_tool_results(&self) -> bool {
        self.had_tool_results
    }

    pub const fn tokens_saved(&self) -> usize {
        self.tokens_before.saturating_sub(self.tokens_after)
    }
}
