//! Projection worker entry point: Kafka in, Redis out.

use std::sync::Arc;

use appointments_api::config::ProjectorConfig;
use appointments_api::error::AppError;
use appointments_api::telemetry;
use appointments_broker::kafka::{KafkaDeadLetterSink, KafkaSubscription};
use appointments_core::clock::SystemClock;
use appointments_projection::redis_store::RedisReadModelStore;
use appointments_projection::worker::ProjectionWorker;
use tokio::sync::watch;
use tracing::{error, info};

fn dependency(e: impl std::fmt::Display) -> AppError {
    AppError::Dependency(e.to_string())
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    let config = ProjectorConfig::from_env()?;
    let telemetry = telemetry::init("appointments-projector", config.otlp_endpoint.as_deref())?;

    info!(
        topic = %config.broker.events_topic,
        consumer_group = %config.broker.consumer_group,
        "Starting appointments projector"
    );

    let store = RedisReadModelStore::connect(&config.redis_url)
        .await
        .map_err(dependency)?;
    let dead_letters = KafkaDeadLetterSink::new(config.broker.clone()).map_err(dependency)?;
    let mut subscription = KafkaSubscription::new(&config.broker).map_err(dependency)?;

    let worker = ProjectionWorker::new(
        Arc::new(store),
        Arc::new(dead_letters),
        Arc::new(SystemClock),
        config.worker,
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("shutdown signal received"),
            Err(e) => error!(error = %e, "failed to listen for shutdown signal; stopping"),
        }
        let _ = shutdown_tx.send(true);
    });

    // A worker error leaves its delivery uncommitted; exiting hands it back to
    // the consumer group.
    let result = worker.run(&mut subscription, shutdown_rx).await;

    telemetry.shutdown();
    result.map_err(dependency)?;
    Ok(())
}
