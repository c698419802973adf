//! Analytics API endpoints
//!
//! GET /api/analytics/workforce - Workforce counts and today's totals
//! GET /api/analytics/costs     - Human-vs-agent cost split by date
//! GET /api/analytics/runtime   - Per-worker runtime totals

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::{Duration, NaiveDate, Utc};
use pulse_core::{CostBreakdown, WorkerRuntime, WorkforceSummary};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::AppState;

const DEFAULT_RANGE_DAYS: i64 = 30;

/// Company scope for workforce queries.
#[derive(Debug, Deserialize)]
pub struct WorkforceQuery {
    /// Company to summarize
    pub company_id: Uuid,
}

/// Company scope plus an optional date range.
///
/// The range defaults to the last 30 days ending today (UTC).
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    /// Company to report on
    pub company_id: Uuid,
    /// Earliest date to include
    pub from: Option<NaiveDate>,
    /// Latest date to include
    pub to: Option<NaiveDate>,
}

impl RangeQuery {
    fn resolve(&self) -> (NaiveDate, NaiveDate) {
        let to = self.to.unwrap_or_else(|| Utc::now().date_naive());
        let from = self.from.unwrap_or(to - Duration::days(DEFAULT_RANGE_DAYS));
        (from, to)
    }
}

/// Response wrapping the workforce summary.
#[derive(Debug, Serialize)]
pub struct WorkforceResponse {
    /// Counts and today's totals
    pub summary: WorkforceSummary,
}

/// Response wrapping the cost breakdown.
#[derive(Debug, Serialize)]
pub struct CostsResponse {
    /// Per-date cost split, oldest first
    pub breakdown: Vec<CostBreakdown>,
}

/// Response wrapping per-worker runtime totals.
#[derive(Debug, Serialize)]
pub struct RuntimeResponse {
    /// Per-worker totals, most expensive first
    pub workers: Vec<WorkerRuntime>,
}

/// Workforce counts plus today's cost and session totals.
async fn workforce(
    State(state): State<AppState>,
    Query(query): Query<WorkforceQuery>,
) -> Json<WorkforceResponse> {
    let summary = state.ledger.workforce_summary(query.company_id).await;
    Json(WorkforceResponse { summary })
}

/// Human-vs-agent cost split over the date range.
async fn costs(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Json<CostsResponse> {
    let (from, to) = query.resolve();
    let breakdown = state.ledger.cost_breakdown(query.company_id, from, to).await;
    Json(CostsResponse { breakdown })
}

/// Per-worker runtime totals over the date range.
async fn runtime(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Json<RuntimeResponse> {
    let (from, to) = query.resolve();
    let workers = state
        .ledger
        .runtime_analytics(query.company_id, from, to)
        .await;
    Json(RuntimeResponse { workers })
}

/// Create analytics routes over the shared ledger.
pub fn analytics_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/analytics/workforce", get(workforce))
        .route("/api/analytics/costs", get(costs))
        .route("/api/analytics/runtime", get(runtime))
        .with_state(state)
}
