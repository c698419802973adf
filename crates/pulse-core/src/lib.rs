//! Pulse Core - Domain types and session ledger
//!
//! This crate provides the shared core of Pulse:
//! - Metrics: additive runtime counters and merge semantics
//! - Pricing: model price table and cost calculation
//! - Workers: registry types for humans and AI agents
//! - Sessions: work session lifecycle and daily rollups
//! - Ledger: the in-memory source-of-truth store

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod ledger;
pub mod metrics;
pub mod pricing;
pub mod session;
pub mod worker;

pub use error::{Error, Result};
pub use ledger::{CostBreakdown, SessionLedger, WorkerRuntime, WorkforceSummary};
pub use metrics::RuntimeMetrics;
pub use pricing::{normalize_model_name, CostCalculator, ModelPricing, DEFAULT_PRICE_TABLE};
pub use session::{
    DailyWorkerMetrics, EndSession, NewSession, SessionFilter, SessionStatus, WorkSession,
};
pub use worker::{NewWorker, Worker, WorkerKind, WorkerStatus};
