//! End-to-end pipeline tests: HTTP command service, in-memory broker,
//! projection worker and in-memory read store.

mod common;

use std::sync::Arc;

use appointments_booking::domain::repository::AppointmentRepository;
use appointments_booking::domain::status::AppointmentStatus;
use appointments_core::broker::EventSubscription;
use appointments_core::publisher::Publisher;
use appointments_projection::memory::InMemoryReadModelStore;
use appointments_projection::store::ReadModelStore;
use appointments_projection::worker::{ProjectionWorker, WorkerConfig, WorkerStats};
use appointments_store::memory::InMemoryAppointmentRepository;
use appointments_test_support::InMemoryBroker;
use axum::http::StatusCode;
use tokio::sync::watch;
use uuid::Uuid;

struct Pipeline {
    repo: Arc<InMemoryAppointmentRepository>,
    broker: InMemoryBroker,
    read_store: InMemoryReadModelStore,
    worker: ProjectionWorker,
}

impl Pipeline {
    fn new() -> Self {
        let broker = InMemoryBroker::new();
        let read_store = InMemoryReadModelStore::new();
        let worker = ProjectionWorker::new(
            Arc::new(read_store.clone()),
            Arc::new(broker.clone()),
            common::fixed_clock(),
            WorkerConfig::default(),
        );
        Self {
            repo: Arc::new(InMemoryAppointmentRepository::new()),
            broker,
            read_store,
            worker,
        }
    }

    fn app(&self) -> axum::Router {
        common::build_test_app(
            self.repo.clone(),
            Publisher::Connected(Arc::new(self.broker.clone())),
        )
    }

    fn app_without_publisher(&self) -> axum::Router {
        common::build_test_app(self.repo.clone(), Publisher::Absent)
    }

    async fn project(&self) -> WorkerStats {
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut subscription = self.broker.subscribe();
        self.worker.run(&mut subscription, shutdown_rx).await.unwrap()
    }
}

fn id_of(json: &serde_json::Value) -> Uuid {
    Uuid::parse_str(json["id"].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn test_c1_booking_confirm_and_revert_converges_in_read_model() {
    // Arrange
    let pipeline = Pipeline::new();

    // Act
    let (status, created) =
        common::post_json(pipeline.app(), "/appointments", &common::c1_request()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "REQUESTED");
    let id = id_of(&created);
    let status_uri = format!("/appointments/{id}/status");

    let (status, _) = common::post_json(
        pipeline.app(),
        &status_uri,
        &serde_json::json!({ "status": "CONFIRMED" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = common::post_json(
        pipeline.app(),
        &status_uri,
        &serde_json::json!({ "status": "REQUESTED" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stats = pipeline.project().await;

    // Assert
    let (status, current) = common::get_json(pipeline.app(), &format!("/appointments/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(current["status"], "CONFIRMED");

    assert_eq!(stats.applied, 2);
    let projection = pipeline.read_store.get(id).await.unwrap().unwrap();
    assert_eq!(projection.status, AppointmentStatus::Confirmed);
    assert_eq!(projection.version, 2);
    assert_eq!(projection.duration_minutes, 30);
    assert_eq!(projection.customer_id, "C1");
}

#[tokio::test]
async fn test_unavailable_publisher_still_creates_and_leaves_read_store_untouched() {
    // Arrange
    let pipeline = Pipeline::new();

    // Act
    let (status, created) = common::post_json(
        pipeline.app_without_publisher(),
        "/appointments",
        &common::c1_request(),
    )
    .await;
    let stats = pipeline.project().await;

    // Assert
    assert_eq!(status, StatusCode::CREATED);
    let id = id_of(&created);
    assert!(pipeline.repo.find_by_id(id).await.unwrap().is_some());
    let (status, fetched) =
        common::get_json(pipeline.app_without_publisher(), &format!("/appointments?id={id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["status"], "REQUESTED");
    assert_eq!(stats, WorkerStats::default());
    assert!(pipeline.read_store.is_empty());
}

#[tokio::test]
async fn test_duplicate_and_late_deliveries_are_idempotent() {
    // Arrange: the create event is handed out, requeued, and duplicated.
    let pipeline = Pipeline::new();
    let (_, created) =
        common::post_json(pipeline.app(), "/appointments", &common::c1_request()).await;
    let id = id_of(&created);
    let mut subscription = pipeline.broker.subscribe();
    let first = subscription.next_delivery().await.unwrap().unwrap();
    let create_payload = first.payload().to_vec();
    first.nack(true).await.unwrap();
    pipeline.broker.push_raw(create_payload.clone());
    let (status, _) = common::post_json(
        pipeline.app(),
        &format!("/appointments/{id}/status"),
        &serde_json::json!({ "status": "CANCELLED" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    // Act
    let first_pass = pipeline.project().await;
    pipeline.broker.push_raw(create_payload);
    let late_pass = pipeline.project().await;

    // Assert
    assert_eq!(first_pass.applied, 2);
    assert_eq!(first_pass.skipped, 1);
    assert_eq!(late_pass.skipped, 1);
    assert_eq!(late_pass.applied, 0);
    assert_eq!(pipeline.read_store.len(), 1);
    assert_eq!(pipeline.read_store.writes(), 2);
    let projection = pipeline.read_store.get(id).await.unwrap().unwrap();
    assert_eq!(projection.status, AppointmentStatus::Cancelled);
    assert_eq!(projection.version, 2);
}

#[tokio::test]
async fn test_read_store_outage_converges_after_redelivery() {
    // Arrange
    let pipeline = Pipeline::new();
    let (_, created) =
        common::post_json(pipeline.app(), "/appointments", &common::c1_request()).await;
    let id = id_of(&created);
    // Exhausts the local retries of the first delivery only.
    pipeline
        .read_store
        .fail_next(WorkerConfig::default().read_store_retry.max_attempts);

    // Act
    let stats = pipeline.project().await;

    // Assert
    assert_eq!(stats.requeued, 1);
    assert_eq!(stats.applied, 1);
    assert!(pipeline.broker.dead_letters().is_empty());
    let projection = pipeline.read_store.get(id).await.unwrap().unwrap();
    assert_eq!(projection.status, AppointmentStatus::Requested);
}

#[tokio::test]
async fn test_cors_preflight_is_short_circuited() {
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    let pipeline = Pipeline::new();
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/appointments")
        .header("origin", "http://localhost:5173")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "content-type,x-correlation-id")
        .body(Body::empty())
        .unwrap();

    let response = pipeline.app().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("access-control-allow-origin"));
}
