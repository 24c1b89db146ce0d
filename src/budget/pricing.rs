//! Token pricing for LLM cost accounting

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Token counts reported by an LLM response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// USD price per million tokens for one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPrice {
    pub fn cost(&self, usage: TokenUsage) -> f64 {
        (usage.input_tokens as f64 / 1_000_000.0) * self.input_per_million
            + (usage.output_tokens as f64 / 1_000_000.0) * self.output_per_million
    }
}

/// Price-per-token table keyed by model name
///
/// Unknown models are priced at the most expensive entry so that a missing
/// price never under-reports spend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    models: HashMap<String, ModelPrice>,
}

impl Default for PriceTable {
    fn default() -> Self {
        let mut models = HashMap::new();
        models.insert(
            "gpt-4o".to_string(),
            ModelPrice {
                input_per_million: 2.50,
                output_per_million: 10.00,
            },
        );
        models.insert(
            "gpt-4o-mini".to_string(),
            ModelPrice {
                input_per_million: 0.15,
                output_per_million: 0.60,
            },
        );
        Self { models }
    }
}

impl PriceTable {
    pub fn new(models: HashMap<String, ModelPrice>) -> Self {
        if models.is_empty() {
            return Self::default();
        }
        Self { models }
    }

    pub fn price(&self, model: &str) -> ModelPrice {
        self.models
            .get(model)
            .copied()
            .unwrap_or_else(|| self.most_expensive())
    }

    /// USD cost of `usage` on `model`
    pub fn cost(&self, model: &str, usage: TokenUsage) -> f64 {
        self.price(model).cost(usage)
    }

    /// Estimate the USD cost of a call expected to use roughly `tokens` tokens,
    /// assuming a 70/30 input/output split.
    pub fn estimate(&self, model: &str, tokens: u64) -> f64 {
        let input = tokens * 7 / 10;
        self.cost(model, TokenUsage::new(input, tokens - input))
    }

    fn most_expensive(&self) -> ModelPrice {
        self.models
            .values()
            .copied()
            .max_by(|a, b| {
                (a.input_per_million + a.output_per_million)
                    .total_cmp(&(b.input_per_million + b.output_per_million))
            })
            .unwrap_or(ModelPrice {
                input_per_million: 2.50,
                output_per_million: 10.00,
            })
    }
}
