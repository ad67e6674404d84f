//! The projection worker: consumes appointment events and applies them to a
//! read store.
//!
//! Delivery handling, per message:
//!
//! 1. Decode. Anything that cannot be decoded now will never decode, so it is
//!    dead-lettered on the first delivery.
//! 2. Upsert with a version guard, retrying read-store failures locally.
//! 3. Ack only after the read store accepted (or ignored as stale) the write.
//!    If local retries are exhausted the message is requeued until the broker
//!    delivery count reaches `max_deliveries`, then dead-lettered.
//!
//! A dead-letter write that keeps failing requeues the message after a backoff
//! instead of acking it. On the last allowed delivery the worker stops with
//! the message unsettled, so it is neither dropped nor cycled forever.
//!
//! Any ack or nack the broker rejects also stops the worker. Consuming on
//! could commit a later offset over the unsettled message.

use std::sync::Arc;

use appointments_core::broker::{DeadLetter, DeadLetterSink, Delivery, EventSubscription};
use appointments_core::clock::Clock;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{ProjectionError, WorkerError};
use crate::projection::AppointmentProjection;
use crate::retry::RetryPolicy;
use crate::store::{ReadModelStore, UpsertOutcome};

/// Tunables for [`ProjectionWorker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Broker deliveries after which a message that still fails is
    /// dead-lettered instead of requeued.
    pub max_deliveries: u32,
    /// Local retries for read-store writes within one delivery.
    pub read_store_retry: RetryPolicy,
    /// Local retries for dead-letter writes. Its backoff, keyed by delivery
    /// count, also delays the requeue when the sink stays down.
    pub dead_letter_retry: RetryPolicy,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_deliveries: 5,
            read_store_retry: RetryPolicy::default(),
            dead_letter_retry: RetryPolicy::default(),
        }
    }
}

/// How a single delivery was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// The projection was written and the message acked.
    Applied,
    /// The event was not newer than the stored projection; acked unchanged.
    Skipped,
    /// The message was nacked for redelivery.
    Requeued,
    /// The message was routed to the dead-letter sink and acked.
    DeadLettered,
}

/// Per-outcome counters reported when the worker stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub applied: u64,
    pub skipped: u64,
    pub requeued: u64,
    pub dead_lettered: u64,
    /// Receive calls the broker failed.
    pub broker_errors: u64,
}

impl WorkerStats {
    fn record(&mut self, outcome: DeliveryOutcome) {
        match outcome {
            DeliveryOutcome::Applied => self.applied += 1,
            DeliveryOutcome::Skipped => self.skipped += 1,
            DeliveryOutcome::Requeued => self.requeued += 1,
            DeliveryOutcome::DeadLettered => self.dead_lettered += 1,
        }
    }
}

/// Applies delivered appointment events to a [`ReadModelStore`].
#[derive(Clone)]
pub struct ProjectionWorker {
    store: Arc<dyn ReadModelStore>,
    dead_letters: Arc<dyn DeadLetterSink>,
    clock: Arc<dyn Clock>,
    config: WorkerConfig,
}

impl std::fmt::Debug for ProjectionWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionWorker")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProjectionWorker {
    /// Creates a worker.
    #[must_use]
    pub fn new(
        store: Arc<dyn ReadModelStore>,
        dead_letters: Arc<dyn DeadLetterSink>,
        clock: Arc<dyn Clock>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            store,
            dead_letters,
            clock,
            config,
        }
    }

    /// Consumes `subscription` until it ends or `shutdown` becomes `true`.
    ///
    /// A message in flight when shutdown is signalled is settled before the
    /// worker returns.
    ///
    /// # Errors
    ///
    /// Returns a [`WorkerError`] when a delivery cannot be settled. The
    /// worker stops consuming at that point and leaves the delivery to the
    /// broker.
    pub async fn run(
        &self,
        subscription: &mut dyn EventSubscription,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<WorkerStats, WorkerError> {
        let mut stats = WorkerStats::default();
        let mut failure = None;
        info!(max_deliveries = self.config.max_deliveries, "projection worker started");

        while !*shutdown.borrow() {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                next = subscription.next_delivery() => match next {
                    None => break,
                    Some(Ok(delivery)) => match self.handle_delivery(delivery).await {
                        Ok(outcome) => stats.record(outcome),
                        Err(e) => {
                            error!(error = %e, "stopping with unsettled delivery");
                            failure = Some(e);
                            break;
                        }
                    },
                    Some(Err(e)) => {
                        stats.broker_errors += 1;
                        warn!(error = %e, "failed to receive delivery");
                    }
                },
            }
        }

        info!(
            applied = stats.applied,
            skipped = stats.skipped,
            requeued = stats.requeued,
            dead_lettered = stats.dead_lettered,
            broker_errors = stats.broker_errors,
            "projection worker stopped"
        );
        match failure {
            Some(e) => Err(e),
            None => Ok(stats),
        }
    }

    /// Processes and settles one delivery.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Settle`] if the final ack or nack fails and
    /// [`WorkerError::DeadLetterUnavailable`] if the message must be
    /// dead-lettered on its last allowed delivery but the sink is down. In
    /// both cases the delivery is left unsettled.
    #[instrument(skip_all, fields(attempt = delivery.attempt()))]
    pub async fn handle_delivery(&self, delivery: Delivery) -> Result<DeliveryOutcome, WorkerError> {
        let projection = match AppointmentProjection::from_slice(delivery.payload()) {
            Ok(projection) => projection,
            Err(e) => {
                warn!(error = %e, "undecodable event");
                return self.dead_letter(delivery, &e).await;
            }
        };

        match self.apply(&projection).await {
            Ok(UpsertOutcome::Applied) => {
                delivery.ack().await?;
                debug!(
                    appointment_id = %projection.appointment_id,
                    version = projection.version,
                    correlation_id = %projection.correlation_id,
                    "projection applied"
                );
                Ok(DeliveryOutcome::Applied)
            }
            Ok(UpsertOutcome::Stale) => {
                delivery.ack().await?;
                debug!(
                    appointment_id = %projection.appointment_id,
                    version = projection.version,
                    "stale event skipped"
                );
                Ok(DeliveryOutcome::Skipped)
            }
            Err(e) if delivery.attempt() < self.config.max_deliveries => {
                warn!(
                    appointment_id = %projection.appointment_id,
                    version = projection.version,
                    error = %e,
                    "read store write failed; requeueing"
                );
                delivery.nack(true).await?;
                Ok(DeliveryOutcome::Requeued)
            }
            Err(e) => {
                error!(
                    appointment_id = %projection.appointment_id,
                    version = projection.version,
                    error = %e,
                    "read store write failed on final delivery"
                );
                self.dead_letter(delivery, &e).await
            }
        }
    }

    async fn apply(&self, projection: &AppointmentProjection) -> Result<UpsertOutcome, ProjectionError> {
        let policy = &self.config.read_store_retry;
        let mut attempt = 1;
        loop {
            match self.store.upsert_if_newer(projection).await {
                Err(e) if e.is_retryable() && policy.should_retry(attempt) => {
                    let delay = policy.next_delay(attempt);
                    debug!(attempt, ?delay, error = %e, "retrying read store write");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn dead_letter(
        &self,
        delivery: Delivery,
        cause: &ProjectionError,
    ) -> Result<DeliveryOutcome, WorkerError> {
        let letter = DeadLetter {
            payload: delivery.payload().to_vec(),
            reason: cause.to_string(),
            attempts: delivery.attempt(),
            failed_at: self.clock.now(),
        };

        let policy = &self.config.dead_letter_retry;
        let mut attempt = 1;
        loop {
            match self.dead_letters.dead_letter(&letter).await {
                Ok(()) => {
                    delivery.ack().await?;
                    warn!(reason = %letter.reason, attempts = letter.attempts, "message dead-lettered");
                    return Ok(DeliveryOutcome::DeadLettered);
                }
                Err(e) if policy.should_retry(attempt) => {
                    tokio::time::sleep(policy.next_delay(attempt)).await;
                    attempt += 1;
                    debug!(attempt, error = %e, "retrying dead-letter write");
                }
                Err(e) if delivery.attempt() < self.config.max_deliveries => {
                    let delay = policy.next_delay(delivery.attempt());
                    error!(error = %e, ?delay, "dead-letter sink unavailable; requeueing");
                    tokio::time::sleep(delay).await;
                    delivery.nack(true).await?;
                    return Ok(DeliveryOutcome::Requeued);
                }
                Err(e) => {
                    return Err(WorkerError::DeadLetterUnavailable {
                        attempts: delivery.attempt(),
                        reason: e.to_string(),
                    });
                }
            }
        }
    }
}
