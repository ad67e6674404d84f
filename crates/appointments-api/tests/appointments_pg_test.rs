//! Integration tests for the booking routes against `PostgreSQL`.
//!
//! Run with `DATABASE_URL` set: `cargo test -p appointments-api -- --ignored`.

mod common;

use std::sync::Arc;

use appointments_core::publisher::Publisher;
use appointments_store::pg_appointment_repository::PgAppointmentRepository;
use axum::http::StatusCode;
use sqlx::PgPool;
use uuid::Uuid;

fn app(pool: PgPool) -> axum::Router {
    common::build_test_app(Arc::new(PgAppointmentRepository::new(pool)), Publisher::Absent)
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_create_then_get_round_trip(pool: PgPool) {
    // POST /appointments
    let (status, created) =
        common::post_json(app(pool.clone()), "/appointments", &common::c1_request()).await;

    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_owned();

    // GET /appointments?id= reads the committed row.
    let (status, fetched) = common::get_json(app(pool), &format!("/appointments?id={id}")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "REQUESTED");
    assert_eq!(fetched["version"], 1);
    assert_eq!(fetched["start_time"], "2026-01-15T10:00:00Z");
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_status_lifecycle_persists(pool: PgPool) {
    let (_, created) =
        common::post_json(app(pool.clone()), "/appointments", &common::c1_request()).await;
    let uri = format!("/appointments/{}/status", created["id"].as_str().unwrap());

    let (confirm, _) = common::post_json(
        app(pool.clone()),
        &uri,
        &serde_json::json!({ "status": "CONFIRMED" }),
    )
    .await;
    let (cancel, cancelled) = common::post_json(
        app(pool.clone()),
        &uri,
        &serde_json::json!({ "status": "CANCELLED" }),
    )
    .await;
    let (reopen, _) = common::post_json(
        app(pool),
        &uri,
        &serde_json::json!({ "status": "CONFIRMED" }),
    )
    .await;

    assert_eq!(confirm, StatusCode::OK);
    assert_eq!(cancel, StatusCode::OK);
    assert_eq!(cancelled["version"], 3);
    assert_eq!(reopen, StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_get_nonexistent_appointment_returns_404(pool: PgPool) {
    let (status, json) =
        common::get_json(app(pool), &format!("/appointments/{}", Uuid::new_v4())).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}
