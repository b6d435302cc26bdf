//! Health check handlers.

use axum::{Json, extract::State, http::StatusCode};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::state::AppState;

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
pub async fn liveness() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the store is not reachable.
pub async fn readiness(State(state): State<AppState>) -> StatusCode {
    if state.db().ping().await {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Body of `GET /api/health`.
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub environment: &'static str,
    pub database: &'static str,
    pub store: &'static str,
}

/// GET /api/health
pub async fn status(State(state): State<AppState>) -> Json<HealthReport> {
    let connected = state.db().ping().await;
    Json(HealthReport {
        status: "healthy",
        timestamp: Utc::now(),
        environment: state.config().environment.as_str(),
        database: if connected { "connected" } else { "disconnected" },
        store: state.db().kind(),
    })
}
