//! Liveness endpoint.

use axum::extract::State;
use axum::{Json, Router, routing::get};
use serde::Serialize;

use crate::state::AppState;

/// Body of `GET /health`.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok`, or `degraded` when events are not being published.
    pub status: &'static str,
    /// Service version.
    pub version: &'static str,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.publisher.is_connected() {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Returns the health check router.
pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
