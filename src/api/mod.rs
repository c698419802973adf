//! Web API module for Pulse
//!
//! Provides REST API endpoints for:
//! - Worker registration and status
//! - Session lifecycle (start, heartbeat, end)
//! - Daily rollups and workforce analytics

pub mod analytics;
pub mod health;
pub mod sessions;
pub mod workers;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use pulse_core::SessionLedger;
use serde_json::json;
use std::sync::Arc;

pub use analytics::analytics_routes;
pub use health::health_routes;
pub use sessions::sessions_routes;
pub use workers::workers_routes;

/// Shared ledger state for all API handlers.
#[derive(Clone)]
pub struct AppState {
    /// In-memory session ledger
    pub ledger: Arc<SessionLedger>,
}

/// Ledger error carried into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pulse_core::Error);

impl From<pulse_core::Error> for ApiError {
    fn from(err: pulse_core::Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            pulse_core::Error::NotFound(_) => StatusCode::NOT_FOUND,
            pulse_core::Error::Validation(_) => StatusCode::BAD_REQUEST,
            pulse_core::Error::InvalidState(_) => StatusCode::CONFLICT,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Create the API router with all endpoints
pub fn api_router(ledger: Arc<SessionLedger>) -> Router {
    let state = AppState { ledger };
    Router::new()
        .merge(health_routes())
        .merge(sessions_routes(state.clone()))
        .merge(workers_routes(state.clone()))
        .merge(analytics_routes(state))
}
