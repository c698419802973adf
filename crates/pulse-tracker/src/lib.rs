//! Client-side session tracking for the pulse workforce ledger.
//!
//! Agents and tooling embed a [`SessionTracker`] to report runtime usage
//! (tokens, API calls, errors) against work sessions. Metrics are buffered
//! locally and flushed to the ledger on an interval, so transient outages
//! never drop usage data.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod events;
pub mod tracker;
pub mod transport;

pub use config::TrackerConfig;
pub use error::{Error, Result};
pub use events::{AgentEvent, UsageMetadata};
pub use tracker::SessionTracker;
pub use transport::{HttpTransport, StartSessionBody, Transport};
