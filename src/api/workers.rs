//! Workers API endpoints
//!
//! POST  /api/workers             - Register a worker
//! GET   /api/workers             - List workers (filterable)
//! GET   /api/workers/:id         - Get worker details
//! PATCH /api/workers/:id/status  - Set worker availability
//! GET   /api/workers/:id/metrics - Daily rollup rows for a worker

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use chrono::NaiveDate;
use pulse_core::{DailyWorkerMetrics, NewWorker, Worker, WorkerKind, WorkerStatus};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiError, AppState};

/// Response wrapping a single worker.
#[derive(Debug, Serialize)]
pub struct WorkerResponse {
    /// The worker row
    pub worker: Worker,
}

/// Response wrapping a worker list.
#[derive(Debug, Serialize)]
pub struct WorkerListResponse {
    /// Matching workers, newest first
    pub workers: Vec<Worker>,
}

/// Query filters for listing workers.
#[derive(Debug, Default, Deserialize)]
pub struct ListWorkersQuery {
    /// Only workers in this company
    pub company_id: Option<Uuid>,
    /// Only workers of this kind
    pub kind: Option<WorkerKind>,
}

/// Request to change a worker's availability.
#[derive(Debug, Deserialize)]
pub struct SetStatusRequest {
    /// New status
    pub status: WorkerStatus,
}

/// Date range for rollup queries.
#[derive(Debug, Default, Deserialize)]
pub struct MetricsQuery {
    /// Earliest date to include
    pub from: Option<NaiveDate>,
    /// Latest date to include
    pub to: Option<NaiveDate>,
}

/// Response wrapping daily rollup rows.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    /// Rollup rows, newest date first
    pub metrics: Vec<DailyWorkerMetrics>,
}

/// Register a worker.
async fn create_worker(
    State(state): State<AppState>,
    Json(new): Json<NewWorker>,
) -> Result<(StatusCode, Json<WorkerResponse>), ApiError> {
    let worker = state.ledger.create_worker(new).await?;
    Ok((StatusCode::CREATED, Json(WorkerResponse { worker })))
}

/// List workers.
async fn list_workers(
    State(state): State<AppState>,
    Query(query): Query<ListWorkersQuery>,
) -> Json<WorkerListResponse> {
    let workers = state.ledger.list_workers(query.company_id, query.kind).await;
    Json(WorkerListResponse { workers })
}

/// Get worker details.
async fn get_worker(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<WorkerResponse>, ApiError> {
    let worker = state.ledger.get_worker(id).await?;
    Ok(Json(WorkerResponse { worker }))
}

/// Set a worker's availability status.
async fn set_worker_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetStatusRequest>,
) -> Result<Json<WorkerResponse>, ApiError> {
    let worker = state.ledger.set_worker_status(id, request.status).await?;
    Ok(Json(WorkerResponse { worker }))
}

/// Daily rollup rows for a worker.
async fn worker_metrics(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<MetricsQuery>,
) -> Result<Json<MetricsResponse>, ApiError> {
    // 404 for unknown workers rather than an empty list.
    state.ledger.get_worker(id).await?;
    let metrics = state
        .ledger
        .worker_daily_metrics(id, query.from, query.to)
        .await;
    Ok(Json(MetricsResponse { metrics }))
}

/// Create worker routes over the shared ledger.
pub fn workers_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/workers", get(list_workers).post(create_worker))
        .route("/api/workers/:id", get(get_worker))
        .route("/api/workers/:id/status", patch(set_worker_status))
        .route("/api/workers/:id/metrics", get(worker_metrics))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;
    use pulse_core::SessionLedger;
    use std::sync::Arc;

    fn test_state() -> AppState {
        AppState {
            ledger: Arc::new(SessionLedger::new()),
        }
    }

    fn new_worker(company_id: Uuid, kind: WorkerKind) -> NewWorker {
        NewWorker {
            company_id,
            kind,
            name: "Worker".to_string(),
            role: "support".to_string(),
            model_name: None,
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_get_worker() {
        let state = test_state();
        let company = Uuid::new_v4();

        let (status, response) = create_worker(
            State(state.clone()),
            Json(new_worker(company, WorkerKind::Human)),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(response.0.worker.status, WorkerStatus::Idle);

        let fetched = get_worker(State(state), Path(response.0.worker.id))
            .await
            .unwrap();
        assert_eq!(fetched.0.worker.id, response.0.worker.id);
    }

    #[tokio::test]
    async fn test_create_worker_empty_name_maps_to_400() {
        let state = test_state();
        let mut new = new_worker(Uuid::new_v4(), WorkerKind::Agent);
        new.name = String::new();

        let result = create_worker(State(state), Json(new)).await;
        let response = result.err().unwrap().into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_list_workers_filters_by_kind() {
        let state = test_state();
        let company = Uuid::new_v4();
        for kind in [WorkerKind::Human, WorkerKind::Agent, WorkerKind::Agent] {
            create_worker(State(state.clone()), Json(new_worker(company, kind)))
                .await
                .unwrap();
        }

        let response = list_workers(
            State(state),
            Query(ListWorkersQuery {
                company_id: Some(company),
                kind: Some(WorkerKind::Agent),
            }),
        )
        .await;
        assert_eq!(response.0.workers.len(), 2);
    }

    #[tokio::test]
    async fn test_metrics_unknown_worker_maps_to_404() {
        let state = test_state();
        let result = worker_metrics(
            State(state),
            Path(Uuid::new_v4()),
            Query(MetricsQuery::default()),
        )
        .await;
        let response = result.err().unwrap().into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
