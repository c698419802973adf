//! Agent event adapter
//!
//! Agent frameworks emit opaque event payloads that may carry token
//! usage. This module is a stateless mapping from such an event to a
//! [`RuntimeMetrics`] report; feeding the tracker is the caller's (or
//! [`SessionTracker::observe_event`]'s) job.
//!
//! [`SessionTracker::observe_event`]: crate::tracker::SessionTracker::observe_event

use pulse_core::RuntimeMetrics;
use serde::Deserialize;

/// Token usage attached to an agent event.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct UsageMetadata {
    /// Prompt (input) token count
    #[serde(default)]
    pub prompt_token_count: u64,
    /// Candidate (output) token count
    #[serde(default)]
    pub candidates_token_count: u64,
    /// Total tokens, informational only
    #[serde(default)]
    pub total_token_count: u64,
}

/// An opaque agent framework event. Only the usage field is interpreted;
/// everything else passes through untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AgentEvent {
    /// Token usage, when the event carries any
    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
    /// The rest of the payload, opaque to the tracker
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl AgentEvent {
    /// Extract a metrics report from the event, counting one API call.
    ///
    /// Returns `None` for events without usage data.
    #[must_use]
    pub fn usage_metrics(&self) -> Option<RuntimeMetrics> {
        let usage = self.usage_metadata?;
        Some(RuntimeMetrics {
            tokens_input: usage.prompt_token_count,
            tokens_output: usage.candidates_token_count,
            api_calls: 1,
            ..Default::default()
        })
    }
}
