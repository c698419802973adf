//! Runtime usage metrics
//!
//! `RuntimeMetrics` is the additive counter set shared by the tracker's
//! pending buffer, session heartbeats, and the stored session counters.
//! Merging is a field-wise sum, so it is associative and commutative —
//! the property that makes retried flushes safe: re-sending a delta that
//! was buffered back after a failed flush never changes the final totals.

use serde::{Deserialize, Serialize};

/// Incremental usage counters for one session.
///
/// Every field defaults to zero; a partial report simply leaves the other
/// fields at zero and merges cleanly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeMetrics {
    /// Input (prompt) tokens consumed
    #[serde(default)]
    pub tokens_input: u64,
    /// Output (completion) tokens produced
    #[serde(default)]
    pub tokens_output: u64,
    /// Number of API calls made
    #[serde(default)]
    pub api_calls: u64,
    /// Monetary cost incurred (USD)
    #[serde(default)]
    pub cost_incurred: f64,
    /// Number of errors encountered
    #[serde(default)]
    pub error_count: u64,
}

impl RuntimeMetrics {
    /// Add every counter from `other` into `self`.
    pub fn merge(&mut self, other: &RuntimeMetrics) {
        self.tokens_input += other.tokens_input;
        self.tokens_output += other.tokens_output;
        self.api_calls += other.api_calls;
        self.cost_incurred += other.cost_incurred;
        self.error_count += other.error_count;
    }

    /// Return the field-wise sum of two counter sets.
    #[must_use]
    pub fn merged(mut self, other: &RuntimeMetrics) -> Self {
        self.merge(other);
        self
    }

    /// True iff any counter is strictly positive.
    #[must_use]
    pub fn has_pending_work(&self) -> bool {
        self.tokens_input > 0
            || self.tokens_output > 0
            || self.api_calls > 0
            || self.cost_incurred > 0.0
            || self.error_count > 0
    }
}
