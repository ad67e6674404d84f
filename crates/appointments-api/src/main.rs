//! Appointments API server entry point.

use std::sync::Arc;

use appointments_api::build_router;
use appointments_api::config::ApiConfig;
use appointments_api::error::AppError;
use appointments_api::state::AppState;
use appointments_api::telemetry;
use appointments_broker::topology::BrokerTopology;
use appointments_core::clock::SystemClock;
use appointments_core::publisher::Publisher;
use appointments_store::pg_appointment_repository::PgAppointmentRepository;
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = ApiConfig::from_env()?;
    let telemetry = telemetry::init("appointments-api", config.otlp_endpoint.as_deref())?;

    info!("Starting appointments API server");

    // Write store.
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("../../migrations").run(&pool).await?;

    let app_state = AppState::new(
        Arc::new(SystemClock),
        Arc::new(PgAppointmentRepository::new(pool)),
        build_publisher(config.broker.as_ref()),
    );
    let app = build_router(app_state);

    info!(addr = %config.listen_addr, "Listening");
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    telemetry.shutdown();
    Ok(())
}

#[cfg(feature = "kafka")]
fn build_publisher(broker: Option<&BrokerTopology>) -> Publisher {
    use appointments_broker::kafka::KafkaEventPublisher;

    let Some(topology) = broker else {
        warn!("KAFKA_BROKERS not set; events will not be published");
        return Publisher::Absent;
    };
    match KafkaEventPublisher::new(topology.clone()) {
        Ok(publisher) => Publisher::Connected(Arc::new(publisher)),
        Err(e) => {
            warn!(error = %e, "broker unavailable; events will not be published");
            Publisher::Absent
        }
    }
}

#[cfg(not(feature = "kafka"))]
fn build_publisher(broker: Option<&BrokerTopology>) -> Publisher {
    if broker.is_some() {
        warn!("built without the kafka feature; KAFKA_BROKERS is ignored and events will not be published");
    } else {
        warn!("KAFKA_BROKERS not set; events will not be published");
    }
    Publisher::Absent
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
