//! Session Ledger
//!
//! Durable store of workers, work sessions, and daily rollups. All state
//! lives behind a single `RwLock`, so every operation is atomic from the
//! caller's perspective: concurrent heartbeats for one session serialize
//! their additive updates, and two `end_session` calls for the same
//! worker and date cannot both take the "rollup row does not exist"
//! branch.
//!
//! Updates never overwrite counters, they only add. Combined with the
//! commutativity of [`RuntimeMetrics::merge`], this is what makes
//! at-least-once delivery from trackers safe without deduplication.

use crate::error::{Error, Result};
use crate::metrics::RuntimeMetrics;
use crate::session::{
    DailyWorkerMetrics, EndSession, NewSession, SessionFilter, SessionStatus, WorkSession,
};
use crate::worker::{NewWorker, Worker, WorkerKind, WorkerStatus};
use chrono::{NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Workforce-level counts and today's totals for one company.
#[derive(Debug, Clone, Default, Serialize)]
pub struct WorkforceSummary {
    /// Workers not deactivated
    pub total_workers: u64,
    /// Human workers currently in a session
    pub active_humans: u64,
    /// Agent workers currently in a session
    pub active_agents: u64,
    /// Agent workers registered but idle
    pub idle_agents: u64,
    /// Cost accumulated today (UTC)
    pub total_cost_today: f64,
    /// Sessions ended today (UTC)
    pub total_sessions_today: u64,
}

/// Human-vs-agent cost split for one calendar date.
#[derive(Debug, Clone, Serialize)]
pub struct CostBreakdown {
    /// Calendar date (UTC)
    pub date: NaiveDate,
    /// Cost attributed to human workers
    pub human_cost: f64,
    /// Cost attributed to agent workers
    pub agent_cost: f64,
    /// Total cost
    pub total_cost: f64,
    /// Hours worked by humans
    pub human_hours: f64,
    /// Hours worked by agents
    pub agent_hours: f64,
}

/// Per-worker runtime totals over a date range.
#[derive(Debug, Clone, Serialize)]
pub struct WorkerRuntime {
    /// Worker ID
    pub worker_id: Uuid,
    /// Worker display name
    pub name: String,
    /// Human or agent
    pub worker_kind: WorkerKind,
    /// Model powering the worker, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// Sum of session durations
    pub total_duration_seconds: i64,
    /// Sessions ended in the range
    pub total_sessions: u64,
    /// Sum of input tokens
    pub total_tokens_input: u64,
    /// Sum of output tokens
    pub total_tokens_output: u64,
    /// Sum of cost
    pub total_cost: f64,
    /// Error-free sessions
    pub tasks_completed: u64,
    /// Sum of error counts
    pub total_errors: u64,
}

#[derive(Default)]
struct LedgerState {
    workers: HashMap<Uuid, Worker>,
    sessions: HashMap<Uuid, WorkSession>,
    daily: HashMap<(Uuid, NaiveDate), DailyWorkerMetrics>,
}

/// Session Ledger — the server-side source of truth.
pub struct SessionLedger {
    state: RwLock<LedgerState>,
}

impl SessionLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
        }
    }

    // ------------------------------------------------------------------
    // Workers
    // ------------------------------------------------------------------

    /// Register a worker.
    pub async fn create_worker(&self, new: NewWorker) -> Result<Worker> {
        if new.name.trim().is_empty() {
            return Err(Error::Validation("name is required".to_string()));
        }
        if new.role.trim().is_empty() {
            return Err(Error::Validation("role is required".to_string()));
        }

        let now = Utc::now();
        let worker = Worker {
            id: Uuid::new_v4(),
            company_id: new.company_id,
            kind: new.kind,
            name: new.name,
            role: new.role,
            model_name: new.model_name,
            status: WorkerStatus::Idle,
            created_at: now,
            updated_at: now,
            last_active_at: None,
            metadata: new.metadata,
        };

        let mut state = self.state.write().await;
        state.workers.insert(worker.id, worker.clone());
        Ok(worker)
    }

    /// Get a worker by ID.
    pub async fn get_worker(&self, id: Uuid) -> Result<Worker> {
        let state = self.state.read().await;
        state
            .workers
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("worker {} not found", id)))
    }

    /// List workers, optionally scoped to a company and kind.
    pub async fn list_workers(
        &self,
        company_id: Option<Uuid>,
        kind: Option<WorkerKind>,
    ) -> Vec<Worker> {
        let state = self.state.read().await;
        let mut workers: Vec<Worker> = state
            .workers
            .values()
            .filter(|w| company_id.map_or(true, |c| w.company_id == c))
            .filter(|w| kind.map_or(true, |k| w.kind == k))
            .cloned()
            .collect();
        workers.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        workers
    }

    /// Set a worker's availability status.
    pub async fn set_worker_status(&self, id: Uuid, status: WorkerStatus) -> Result<Worker> {
        let mut state = self.state.write().await;
        let worker = state
            .workers
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("worker {} not found", id)))?;
        worker.status = status;
        worker.updated_at = Utc::now();
        Ok(worker.clone())
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Open a session for a worker.
    ///
    /// Fails with `NotFound` for an unknown worker. Marks the worker
    /// active and stamps its `last_active_at`.
    pub async fn start_session(&self, worker_id: Uuid, new: NewSession) -> Result<WorkSession> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let worker = state
            .workers
            .get_mut(&worker_id)
            .ok_or_else(|| Error::NotFound(format!("worker {} not found", worker_id)))?;

        let model_version = new.model_version.or_else(|| worker.model_name.clone());
        let session = WorkSession {
            id: Uuid::new_v4(),
            worker_id,
            worker_kind: worker.kind,
            company_id: worker.company_id,
            start_time: now.timestamp(),
            end_time: None,
            duration_seconds: None,
            metrics: RuntimeMetrics::default(),
            model_version,
            task_id: new.task_id,
            task_description: new.task_description,
            notes: new.notes,
            metadata: new.metadata,
            status: SessionStatus::InProgress,
            created_at: now,
        };

        worker.status = WorkerStatus::Active;
        worker.last_active_at = Some(now);
        worker.updated_at = now;

        debug!(session_id = %session.id, worker_id = %worker_id, "session started");
        state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    /// Add incremental metrics to an open session (mid-session heartbeat).
    ///
    /// Increments never overwrite, so repeated calls with the same or
    /// different deltas are always safe. Also stamps the owning worker's
    /// `last_active_at`.
    pub async fn heartbeat(
        &self,
        session_id: Uuid,
        metrics: RuntimeMetrics,
    ) -> Result<WorkSession> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| Error::NotFound(format!("session {} not found", session_id)))?;
        if session.status.is_terminal() {
            return Err(Error::InvalidState(format!(
                "session {} already ended",
                session_id
            )));
        }

        session.metrics.merge(&metrics);
        let session = session.clone();

        if let Some(worker) = state.workers.get_mut(&session.worker_id) {
            worker.last_active_at = Some(now);
        }
        Ok(session)
    }

    /// Close a session: add final metrics, compute duration, set terminal
    /// status, return the worker to idle, and fold the session totals
    /// into the daily rollup for (worker, today).
    ///
    /// Ending an already-ended session is rejected with `InvalidState`;
    /// final metrics are never applied twice.
    pub async fn end_session(&self, session_id: Uuid, end: EndSession) -> Result<WorkSession> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let session = state
            .sessions
            .get_mut(&session_id)
            .ok_or_else(|| Error::NotFound(format!("session {} not found", session_id)))?;
        if session.status.is_terminal() {
            return Err(Error::InvalidState(format!(
                "session {} already ended",
                session_id
            )));
        }

        let duration = now.timestamp() - session.start_time;
        session.metrics.merge(&end.metrics);
        session.end_time = Some(now.timestamp());
        session.duration_seconds = Some(duration);
        session.status = if session.metrics.error_count > 0 {
            SessionStatus::Failed
        } else {
            SessionStatus::Completed
        };
        if end.notes.is_some() {
            session.notes = end.notes;
        }
        let session = session.clone();

        if let Some(worker) = state.workers.get_mut(&session.worker_id) {
            worker.status = WorkerStatus::Idle;
            worker.last_active_at = Some(now);
            worker.updated_at = now;
        }

        // Rollup upsert for (worker, today). Atomic with respect to
        // concurrent end calls because we still hold the write lock.
        let date = now.date_naive();
        let completed = u64::from(session.metrics.error_count == 0);
        let row = state
            .daily
            .entry((session.worker_id, date))
            .or_insert_with(|| DailyWorkerMetrics {
                id: Uuid::new_v4(),
                worker_id: session.worker_id,
                worker_kind: session.worker_kind,
                company_id: session.company_id,
                date,
                total_duration_seconds: 0,
                sessions_count: 0,
                total_tokens_input: 0,
                total_tokens_output: 0,
                total_api_calls: 0,
                total_cost: 0.0,
                tasks_completed: 0,
                error_count: 0,
            });
        row.total_duration_seconds += duration;
        row.sessions_count += 1;
        row.total_tokens_input += session.metrics.tokens_input;
        row.total_tokens_output += session.metrics.tokens_output;
        row.total_api_calls += session.metrics.api_calls;
        row.total_cost += session.metrics.cost_incurred;
        row.tasks_completed += completed;
        row.error_count += session.metrics.error_count;

        debug!(session_id = %session.id, status = ?session.status, "session ended");
        Ok(session)
    }

    /// Get a session by ID.
    pub async fn get_session(&self, id: Uuid) -> Result<WorkSession> {
        let state = self.state.read().await;
        state
            .sessions
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("session {} not found", id)))
    }

    /// List sessions matching a filter, newest start first.
    pub async fn list_sessions(&self, filter: &SessionFilter) -> Vec<WorkSession> {
        let state = self.state.read().await;
        let mut sessions: Vec<WorkSession> = state
            .sessions
            .values()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        sessions
    }

    // ------------------------------------------------------------------
    // Rollups & analytics
    // ------------------------------------------------------------------

    /// Daily rollup rows for one worker, newest date first.
    pub async fn worker_daily_metrics(
        &self,
        worker_id: Uuid,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Vec<DailyWorkerMetrics> {
        let state = self.state.read().await;
        let mut rows: Vec<DailyWorkerMetrics> = state
            .daily
            .values()
            .filter(|m| m.worker_id == worker_id)
            .filter(|m| from.map_or(true, |d| m.date >= d))
            .filter(|m| to.map_or(true, |d| m.date <= d))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        rows
    }

    /// Workforce counts plus today's cost and session totals.
    pub async fn workforce_summary(&self, company_id: Uuid) -> WorkforceSummary {
        let state = self.state.read().await;
        let today = Utc::now().date_naive();
        let mut summary = WorkforceSummary::default();

        for worker in state.workers.values() {
            if worker.company_id != company_id || worker.status == WorkerStatus::Inactive {
                continue;
            }
            summary.total_workers += 1;
            match (worker.kind, worker.status) {
                (WorkerKind::Human, WorkerStatus::Active) => summary.active_humans += 1,
                (WorkerKind::Agent, WorkerStatus::Active) => summary.active_agents += 1,
                (WorkerKind::Agent, WorkerStatus::Idle) => summary.idle_agents += 1,
                _ => {}
            }
        }

        for row in state.daily.values() {
            if row.company_id == company_id && row.date == today {
                summary.total_cost_today += row.total_cost;
                summary.total_sessions_today += row.sessions_count;
            }
        }

        summary
    }

    /// Per-date human-vs-agent cost split, ordered by date.
    pub async fn cost_breakdown(
        &self,
        company_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<CostBreakdown> {
        let state = self.state.read().await;
        let mut by_date: HashMap<NaiveDate, CostBreakdown> = HashMap::new();

        for row in state.daily.values() {
            if row.company_id != company_id || row.date < from || row.date > to {
                continue;
            }
            let entry = by_date.entry(row.date).or_insert_with(|| CostBreakdown {
                date: row.date,
                human_cost: 0.0,
                agent_cost: 0.0,
                total_cost: 0.0,
                human_hours: 0.0,
                agent_hours: 0.0,
            });
            let hours = row.total_duration_seconds as f64 / 3600.0;
            match row.worker_kind {
                WorkerKind::Human => {
                    entry.human_cost += row.total_cost;
                    entry.human_hours += hours;
                }
                WorkerKind::Agent => {
                    entry.agent_cost += row.total_cost;
                    entry.agent_hours += hours;
                }
            }
            entry.total_cost += row.total_cost;
        }

        let mut breakdown: Vec<CostBreakdown> = by_date.into_values().collect();
        breakdown.sort_by(|a, b| a.date.cmp(&b.date));
        breakdown
    }

    /// Per-worker runtime totals over a date range, most expensive first.
    pub async fn runtime_analytics(
        &self,
        company_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Vec<WorkerRuntime> {
        let state = self.state.read().await;
        let mut by_worker: HashMap<Uuid, WorkerRuntime> = HashMap::new();

        for row in state.daily.values() {
            if row.company_id != company_id || row.date < from || row.date > to {
                continue;
            }
            let Some(worker) = state.workers.get(&row.worker_id) else {
                continue;
            };
            let entry = by_worker
                .entry(row.worker_id)
                .or_insert_with(|| WorkerRuntime {
                    worker_id: row.worker_id,
                    name: worker.name.clone(),
                    worker_kind: worker.kind,
                    model_name: worker.model_name.clone(),
                    total_duration_seconds: 0,
                    total_sessions: 0,
                    total_tokens_input: 0,
                    total_tokens_output: 0,
                    total_cost: 0.0,
                    tasks_completed: 0,
                    total_errors: 0,
                });
            entry.total_duration_seconds += row.total_duration_seconds;
            entry.total_sessions += row.sessions_count;
            entry.total_tokens_input += row.total_tokens_input;
            entry.total_tokens_output += row.total_tokens_output;
            entry.total_cost += row.total_cost;
            entry.tasks_completed += row.tasks_completed;
            entry.total_errors += row.error_count;
        }

        let mut analytics: Vec<WorkerRuntime> = by_worker.into_values().collect();
        analytics.sort_by(|a, b| {
            b.total_cost
                .partial_cmp(&a.total_cost)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        analytics
    }
}

impl Default for SessionLedger {
    fn default() -> Self {
        Self::new()
    }
}
