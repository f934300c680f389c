//! Token price lookup consumed by compression accounting

use indexmap::IndexMap;
use conduit_config::ModelPricing;

/// Price of a model in USD per million tokens
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TokenPrice {
    pub price_per_million_input: f64,
    pub price_per_million_output: f64,
}

/// Read-only price source
pub trait PricingLookup: Send + Sync {
    fn find_by_model(&self, model: &str) -> Option<TokenPrice>;
}

/// Prices from the `[llm.pricing]` config table
///
/// Exact model names win; otherwise the longest configured name that
/// prefixes the model matches, so `gpt-4o` also prices `gpt-4o-2024-08-06`.
#[derive(Debug, Clone, Default)]
pub struct StaticPricing {
    prices: Vec<(String, TokenPrice)>,
}

impl StaticPricing {
    pub fn from_config(pricing: &IndexMap<String, ModelPricing>) -> Self {
        let mut prices: Vec<_> = pricing
            .iter()
            .map(|(model, price)| {
                (
                    model.clone(),
                    TokenPrice {
                        price_per_million_input: price.input,
                        price_per_million_output: price.output,
                    },
                )
            })
            .collect();
        prices.sort_by(|(a, _), (b, _)| b.len().cmp(&a.len()));

        Self { prices }
    }
}

impl PricingLookup for StaticPricing {
    fn find_by_model(&self, model: &str) -> Option<TokenPrice> {
        self.prices
            .iter()
            .find(|(name, _)| name == model)
            .or_else(|| self.prices.iter().find(|(name, _)| model.starts_with(name.as_str())))
            .map(|(_, price)| *price)
    }
}
