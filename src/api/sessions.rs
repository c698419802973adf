//! Sessions API endpoints
//!
//! POST /api/sessions/start         - Open a session for a worker
//! POST /api/sessions/:id/heartbeat - Add incremental metrics
//! POST /api/sessions/:id/end       - Close a session
//! GET  /api/sessions               - List sessions (filterable)
//! GET  /api/sessions/:id           - Get session details

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use pulse_core::{
    EndSession, NewSession, RuntimeMetrics, SessionFilter, WorkSession,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ApiError, AppState};

/// Request to open a session.
#[derive(Debug, Deserialize)]
pub struct StartSessionRequest {
    /// Worker the session belongs to
    pub worker_id: Uuid,
    /// Session fields
    #[serde(flatten)]
    pub session: NewSession,
}

/// Response wrapping a single session.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    /// The session row
    pub session: WorkSession,
}

/// Response wrapping a session list.
#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    /// Matching sessions, newest start first
    pub sessions: Vec<WorkSession>,
}

/// Open a session.
async fn start_session(
    State(state): State<AppState>,
    Json(request): Json<StartSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let session = state
        .ledger
        .start_session(request.worker_id, request.session)
        .await?;
    Ok((StatusCode::CREATED, Json(SessionResponse { session })))
}

/// Add incremental metrics to an open session.
async fn heartbeat(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(metrics): Json<RuntimeMetrics>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.ledger.heartbeat(id, metrics).await?;
    Ok(Json(SessionResponse { session }))
}

/// Close a session with its final metrics.
async fn end_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(end): Json<EndSession>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.ledger.end_session(id, end).await?;
    Ok(Json(SessionResponse { session }))
}

/// Get session details.
async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionResponse>, ApiError> {
    let session = state.ledger.get_session(id).await?;
    Ok(Json(SessionResponse { session }))
}

/// List sessions matching the query filters.
async fn list_sessions(
    State(state): State<AppState>,
    Query(filter): Query<SessionFilter>,
) -> Json<SessionListResponse> {
    let sessions = state.ledger.list_sessions(&filter).await;
    Json(SessionListResponse { sessions })
}

/// Create session routes over the shared ledger.
pub fn sessions_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/sessions", get(list_sessions))
        .route("/api/sessions/start", post(start_session))
        .route("/api/sessions/:id", get(get_session))
        .route("/api/sessions/:id/heartbeat", post(heartbeat))
        .route("/api/sessions/:id/end", post(end_session))
        .with_state(state)
}
