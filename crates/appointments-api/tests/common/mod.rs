//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use appointments_booking::domain::repository::AppointmentRepository;
use appointments_core::clock::Clock;
use appointments_core::publisher::Publisher;
use appointments_test_support::FixedClock;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use appointments_api::build_router;
use appointments_api::state::AppState;

/// Fixed timestamp used across all integration tests.
pub fn fixed_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock(
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 15, 9, 0, 0).unwrap(),
    ))
}

/// Build the full app router, middleware included, as `main.rs` does.
pub fn build_test_app(repo: Arc<dyn AppointmentRepository>, publisher: Publisher) -> Router {
    build_router(AppState::new(fixed_clock(), repo, publisher))
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body_bytes).unwrap_or(serde_json::Value::Null);

    (status, json)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(
    app: Router,
    uri: &str,
    body: &serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

/// The C1 booking: customer `C1`, 2026-01-15 `[10:00, 10:30)` UTC.
pub fn c1_request() -> serde_json::Value {
    serde_json::json!({
        "customer_id": "C1",
        "start_time": "2026-01-15T10:00:00Z",
        "end_time": "2026-01-15T10:30:00Z",
    })
}
