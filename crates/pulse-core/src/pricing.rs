//! Model pricing and cost calculation
//!
//! Maps (model name, token counts) to a monetary cost via a static price
//! table. Lookup is substring containment over a normalized model name,
//! so "GPT-4o Mini (2024-07)" resolves to the `gpt-4o-mini` entry. The
//! table is ordered: the first matching entry wins, which lets specific
//! names (`gpt-4o-mini`) shadow their prefixes (`gpt-4o`) by being listed
//! first.

use serde::{Deserialize, Serialize};

/// Pricing for a model family (per 1M tokens, USD)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Cost per 1M input tokens (USD)
    pub input_cost_per_million: f64,
    /// Cost per 1M output tokens (USD)
    pub output_cost_per_million: f64,
}

impl ModelPricing {
    /// Calculate cost for given token counts
    #[must_use]
    pub fn calculate_cost(&self, input_tokens: u64, output_tokens: u64) -> f64 {
        let input_cost = (input_tokens as f64 / 1_000_000.0) * self.input_cost_per_million;
        let output_cost = (output_tokens as f64 / 1_000_000.0) * self.output_cost_per_million;
        input_cost + output_cost
    }
}

/// An ordered price table entry: normalized name fragment plus rates.
pub type PriceEntry = (&'static str, ModelPricing);

const fn rates(input: f64, output: f64) -> ModelPricing {
    ModelPricing {
        input_cost_per_million: input,
        output_cost_per_million: output,
    }
}

/// Default price table (per 1M tokens, USD).
///
/// Order matters: more specific fragments must precede their prefixes.
pub const DEFAULT_PRICE_TABLE: &[PriceEntry] = &[
    ("gemini-2.5-flash", rates(0.15, 0.60)),
    ("gemini-2.5-pro", rates(1.25, 10.00)),
    ("gemini-2.0-flash", rates(0.10, 0.40)),
    ("claude-sonnet", rates(3.00, 15.00)),
    ("claude-opus", rates(15.00, 75.00)),
    ("claude-haiku", rates(0.25, 1.25)),
    ("gpt-4o-mini", rates(0.15, 0.60)),
    ("gpt-4o", rates(2.50, 10.00)),
];

/// Cost calculator over an immutable price table.
///
/// The table is injected at construction so tests can substitute their
/// own rates; `CostCalculator::default()` uses [`DEFAULT_PRICE_TABLE`].
#[derive(Debug, Clone)]
pub struct CostCalculator {
    table: Vec<(String, ModelPricing)>,
}

impl Default for CostCalculator {
    fn default() -> Self {
        Self::new(
            DEFAULT_PRICE_TABLE
                .iter()
                .map(|(name, pricing)| (name.to_string(), *pricing)),
        )
    }
}

impl CostCalculator {
    /// Create a calculator from an ordered list of (name fragment, rates).
    pub fn new(entries: impl IntoIterator<Item = (String, ModelPricing)>) -> Self {
        Self {
            table: entries.into_iter().collect(),
        }
    }

    /// Look up pricing for a model name, first matching entry wins.
    #[must_use]
    pub fn pricing_for(&self, model_name: &str) -> Option<&ModelPricing> {
        let normalized = normalize_model_name(model_name);
        self.table
            .iter()
            .find(|(key, _)| normalized.contains(key.as_str()))
            .map(|(_, pricing)| pricing)
    }

    /// Calculate the cost of a request.
    ///
    /// Unknown models cost zero — callers must not treat a zero cost as a
    /// failure signal.
    #[must_use]
    pub fn cost(&self, model_name: &str, input_tokens: u64, output_tokens: u64) -> f64 {
        match self.pricing_for(model_name) {
            Some(pricing) => pricing.calculate_cost(input_tokens, output_tokens),
            None => 0.0,
        }
    }
}

/// Normalize a model name for table lookup: lowercase, with runs of
/// underscores and whitespace collapsed to a single `-`.
#[must_use]
pub fn normalize_model_name(name: &str) -> String {
    let mut normalized = String::with_capacity(name.len());
    let mut in_separator = false;
    for ch in name.chars() {
        if ch == '_' || ch.is_whitespace() {
            if !in_separator {
                normalized.push('-');
                in_separator = true;
            }
        } else {
            for lower in ch.to_lowercase() {
                normalized.push(lower);
            }
            in_separator = false;
        }
    }
    normalized
}
