//! Work session and daily rollup types

use crate::metrics::RuntimeMetrics;
use crate::worker::WorkerKind;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a session.
///
/// `Completed` and `Failed` are terminal; which one is chosen at end time
/// depends on whether the accumulated error count is positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Open session, counters still accumulating
    InProgress,
    /// Ended with no recorded errors
    Completed,
    /// Ended with at least one recorded error
    Failed,
    /// Never properly ended (administratively closed)
    Abandoned,
}

impl SessionStatus {
    /// True for statuses a session can never leave.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::InProgress)
    }
}

/// One bounded, timed unit of work by exactly one worker.
///
/// Counters are mutated additively by heartbeats and the end operation;
/// once the status is terminal the row is immutable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSession {
    /// Unique session ID
    pub id: Uuid,
    /// Worker performing the session
    pub worker_id: Uuid,
    /// Kind of the worker at session start
    pub worker_kind: WorkerKind,
    /// Owning company
    pub company_id: Uuid,
    /// Start time, seconds since the Unix epoch
    pub start_time: i64,
    /// End time, set when the session becomes terminal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    /// end_time − start_time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<i64>,
    /// Accumulated usage counters
    #[serde(flatten)]
    pub metrics: RuntimeMetrics,
    /// Model version reported by the tracker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    /// Task identifier (agent sessions)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Task description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_description: Option<String>,
    /// Free-form notes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Free-form metadata, opaque to aggregation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Lifecycle status
    pub status: SessionStatus,
    /// Row creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Fields accepted by the session start operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewSession {
    /// Task identifier
    #[serde(default)]
    pub task_id: Option<String>,
    /// Task description
    #[serde(default)]
    pub task_description: Option<String>,
    /// Model version; falls back to the worker's registered model
    #[serde(default)]
    pub model_version: Option<String>,
    /// Free-form notes
    #[serde(default)]
    pub notes: Option<String>,
    /// Free-form metadata
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

/// Final payload accepted by the end operation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndSession {
    /// Last unflushed metrics, added before the row is sealed
    #[serde(flatten)]
    pub metrics: RuntimeMetrics,
    /// Closing notes, replacing any existing notes when present
    #[serde(default)]
    pub notes: Option<String>,
}

/// Filters for session listing. All fields are conjunctive.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionFilter {
    /// Only sessions by this worker
    pub worker_id: Option<Uuid>,
    /// Only sessions in this company
    pub company_id: Option<Uuid>,
    /// Only sessions by workers of this kind
    pub worker_kind: Option<WorkerKind>,
    /// Only sessions in this status
    pub status: Option<SessionStatus>,
    /// Only sessions starting at or after this epoch second
    pub start_after: Option<i64>,
    /// Only sessions starting at or before this epoch second
    pub start_before: Option<i64>,
}

impl SessionFilter {
    /// Does `session` pass every set filter?
    #[must_use]
    pub fn matches(&self, session: &WorkSession) -> bool {
        if let Some(worker_id) = self.worker_id {
            if session.worker_id != worker_id {
                return false;
            }
        }
        if let Some(company_id) = self.company_id {
            if session.company_id != company_id {
                return false;
            }
        }
        if let Some(kind) = self.worker_kind {
            if session.worker_kind != kind {
                return false;
            }
        }
        if let Some(status) = self.status {
            if session.status != status {
                return false;
            }
        }
        if let Some(after) = self.start_after {
            if session.start_time < after {
                return false;
            }
        }
        if let Some(before) = self.start_before {
            if session.start_time > before {
                return false;
            }
        }
        true
    }
}

/// Per-worker, per-calendar-date additive rollup of completed sessions.
///
/// Created by the first session a worker ends on a given date; every
/// subsequent end for the same worker+date adds into the same row.
/// Rows are never decremented.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyWorkerMetrics {
    /// Rollup row ID
    pub id: Uuid,
    /// Worker this row aggregates
    pub worker_id: Uuid,
    /// Kind of the worker
    pub worker_kind: WorkerKind,
    /// Owning company
    pub company_id: Uuid,
    /// Calendar date (UTC) the sessions ended on
    pub date: NaiveDate,
    /// Sum of session durations
    pub total_duration_seconds: i64,
    /// Number of sessions ended on this date
    pub sessions_count: u64,
    /// Sum of input tokens
    pub total_tokens_input: u64,
    /// Sum of output tokens
    pub total_tokens_output: u64,
    /// Sum of API calls
    pub total_api_calls: u64,
    /// Sum of cost (USD)
    pub total_cost: f64,
    /// Sessions that ended without errors
    pub tasks_completed: u64,
    /// Sum of error counts
    pub error_count: u64,
}
