//! Kafka adapters built on `rdkafka`.
//!
//! Delivery is at-least-once with manual offset commits. The consumer never
//! auto-commits: an ack commits `offset + 1` for the partition, and a
//! requeueing nack seeks the partition back to the message so it is fetched
//! again. The delivery count is tracked per `(topic, partition, offset)` in
//! process memory and restarts at 1 after a restart of the projector.
//!
//! A delivery that is dropped without being settled is neither committed nor
//! sought back. It stays uncommitted and is redelivered after a rebalance or
//! restart.

use std::sync::Arc;

use appointments_core::broker::{
    Acknowledger, BrokerError, DeadLetter, DeadLetterSink, Delivery, EventSubscription,
};
use appointments_core::event::EventEnvelope;
use appointments_core::publisher::EventPublisher;
use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{Header, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use rdkafka::{Offset, TopicPartitionList};
use tracing::{debug, error, info};

use crate::attempts::{DeliveryAttempts, MessagePosition};
use crate::topology::BrokerTopology;

fn producer(topology: &BrokerTopology) -> Result<FutureProducer, BrokerError> {
    ClientConfig::new()
        .set("bootstrap.servers", &topology.brokers)
        .set("acks", "all")
        .set("enable.idempotence", "true")
        .set(
            "message.timeout.ms",
            topology.publish_timeout.as_millis().to_string(),
        )
        .create()
        .map_err(|e| BrokerError::Connection(format!("failed to create producer: {e}")))
}

async fn send(
    producer: &FutureProducer,
    topology: &BrokerTopology,
    record: FutureRecord<'_, str, [u8]>,
) -> Result<(i32, i64), BrokerError> {
    let topic = record.topic.to_owned();
    producer
        .send(record, Timeout::After(topology.publish_timeout))
        .await
        .map_err(|(e, _)| BrokerError::Publish {
            topic,
            reason: e.to_string(),
        })
}

/// Publishes appointment envelopes to the events topic.
///
/// Messages are keyed by entity id so every event of one appointment lands on
/// the same partition.
pub struct KafkaEventPublisher {
    producer: FutureProducer,
    topology: BrokerTopology,
}

impl std::fmt::Debug for KafkaEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaEventPublisher")
            .field("topology", &self.topology)
            .finish_non_exhaustive()
    }
}

impl KafkaEventPublisher {
    /// Creates an idempotent producer with `acks=all`.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Connection` if the producer cannot be created.
    pub fn new(topology: BrokerTopology) -> Result<Self, BrokerError> {
        let producer = producer(&topology)?;
        info!(
            brokers = %topology.brokers,
            topic = %topology.events_topic,
            "kafka event publisher ready"
        );
        Ok(Self { producer, topology })
    }
}

#[async_trait]
impl EventPublisher for KafkaEventPublisher {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), BrokerError> {
        let payload = envelope.to_bytes().map_err(|e| BrokerError::Publish {
            topic: self.topology.events_topic.clone(),
            reason: e.to_string(),
        })?;
        let key = envelope.entity_id.to_string();
        let correlation_id = envelope.correlation_id.to_string();
        let headers = OwnedHeaders::new()
            .insert(Header {
                key: "event_type",
                value: Some(envelope.event_type.as_str()),
            })
            .insert(Header {
                key: "correlation_id",
                value: Some(correlation_id.as_str()),
            });
        let record = FutureRecord::to(&self.topology.events_topic)
            .key(key.as_str())
            .payload(payload.as_slice())
            .headers(headers);

        let (partition, offset) = send(&self.producer, &self.topology, record).await?;
        debug!(
            topic = %self.topology.events_topic,
            partition,
            offset,
            event_type = %envelope.event_type,
            entity_id = %envelope.entity_id,
            version = envelope.version,
            "event published"
        );
        Ok(())
    }
}

/// Writes dead letters to the dead-letter topic with the failure reason and
/// delivery count as headers.
pub struct KafkaDeadLetterSink {
    producer: FutureProducer,
    topology: BrokerTopology,
}

impl std::fmt::Debug for KafkaDeadLetterSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaDeadLetterSink")
            .field("topology", &self.topology)
            .finish_non_exhaustive()
    }
}

impl KafkaDeadLetterSink {
    /// Creates the dead-letter producer.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Connection` if the producer cannot be created.
    pub fn new(topology: BrokerTopology) -> Result<Self, BrokerError> {
        let producer = producer(&topology)?;
        Ok(Self { producer, topology })
    }
}

#[async_trait]
impl DeadLetterSink for KafkaDeadLetterSink {
    async fn dead_letter(&self, letter: &DeadLetter) -> Result<(), BrokerError> {
        let attempts = letter.attempts.to_string();
        let failed_at = letter.failed_at.to_rfc3339();
        let headers = OwnedHeaders::new()
            .insert(Header {
                key: "dlq_reason",
                value: Some(letter.reason.as_str()),
            })
            .insert(Header {
                key: "dlq_attempts",
                value: Some(attempts.as_str()),
            })
            .insert(Header {
                key: "dlq_failed_at",
                value: Some(failed_at.as_str()),
            });
        let record = FutureRecord::to(&self.topology.dead_letter_topic)
            .payload(letter.payload.as_slice())
            .headers(headers);

        send(&self.producer, &self.topology, record).await?;
        Ok(())
    }
}

/// Consumes the events topic as part of the projector consumer group.
pub struct KafkaSubscription {
    consumer: Arc<StreamConsumer>,
    attempts: DeliveryAttempts,
}

impl std::fmt::Debug for KafkaSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaSubscription").finish_non_exhaustive()
    }
}

impl KafkaSubscription {
    /// Joins the consumer group and subscribes to the events topic.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Connection` if the consumer cannot be created and
    /// `BrokerError::Subscription` if the subscription is refused.
    pub fn new(topology: &BrokerTopology) -> Result<Self, BrokerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &topology.brokers)
            .set("group.id", &topology.consumer_group)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("enable.partition.eof", "false")
            .create()
            .map_err(|e| BrokerError::Connection(format!("failed to create consumer: {e}")))?;
        consumer
            .subscribe(&[topology.events_topic.as_str()])
            .map_err(|e| BrokerError::Subscription(e.to_string()))?;

        info!(
            topic = %topology.events_topic,
            consumer_group = %topology.consumer_group,
            "kafka subscription ready"
        );
        Ok(Self {
            consumer: Arc::new(consumer),
            attempts: DeliveryAttempts::new(),
        })
    }
}

#[async_trait]
impl EventSubscription for KafkaSubscription {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BrokerError>> {
        let (position, payload) = match self.consumer.recv().await {
            Ok(message) => (
                MessagePosition::new(message.topic(), message.partition(), message.offset()),
                message.payload().map(<[u8]>::to_vec).unwrap_or_default(),
            ),
            Err(e) => return Some(Err(BrokerError::Subscription(e.to_string()))),
        };

        let attempt = match self.attempts.record(&position) {
            Ok(attempt) => attempt,
            Err(e) => return Some(Err(e)),
        };

        let acker = KafkaAcker {
            consumer: Arc::clone(&self.consumer),
            attempts: self.attempts.clone(),
            position,
        };
        Some(Ok(Delivery::new(payload, attempt, Box::new(acker))))
    }
}

struct KafkaAcker {
    consumer: Arc<StreamConsumer>,
    attempts: DeliveryAttempts,
    position: MessagePosition,
}

impl KafkaAcker {
    fn commit(&self) -> Result<(), BrokerError> {
        let MessagePosition {
            topic,
            partition,
            offset,
        } = &self.position;
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(topic, *partition, Offset::Offset(offset + 1))
            .map_err(|e| BrokerError::Acknowledge(e.to_string()))?;
        self.consumer
            .commit(&offsets, CommitMode::Async)
            .map_err(|e| BrokerError::Acknowledge(e.to_string()))?;
        self.attempts.settle(&self.position);
        Ok(())
    }
}

#[async_trait]
impl Acknowledger for KafkaAcker {
    async fn ack(&mut self) -> Result<(), BrokerError> {
        self.commit()
    }

    async fn nack(&mut self, requeue: bool) -> Result<(), BrokerError> {
        if !requeue {
            return self.commit();
        }
        let MessagePosition {
            topic,
            partition,
            offset,
        } = &self.position;
        self.consumer
            .seek(
                topic,
                *partition,
                Offset::Offset(*offset),
                Timeout::After(std::time::Duration::from_secs(5)),
            )
            .map_err(|e| {
                error!(topic = %topic, partition, offset, error = %e, "seek for redelivery failed");
                BrokerError::Acknowledge(e.to_string())
            })
    }
}
