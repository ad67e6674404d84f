//! Broker ports used by the projection worker.
//!
//! The broker is at-least-once: a [`Delivery`] is handed out one or more
//! times until it is acknowledged. Consumers must therefore be idempotent.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors raised by broker adapters.
#[derive(Debug, Clone, Error)]
pub enum BrokerError {
    /// Could not reach or configure the broker.
    #[error("broker connection failed: {0}")]
    Connection(String),

    /// The broker refused or timed out a publish.
    #[error("publish to '{topic}' failed: {reason}")]
    Publish {
        /// Destination topic.
        topic: String,
        /// Broker-provided reason.
        reason: String,
    },

    /// Receiving from the subscription failed.
    #[error("subscription error: {0}")]
    Subscription(String),

    /// Acknowledging or negatively acknowledging a delivery failed.
    #[error("acknowledgement failed: {0}")]
    Acknowledge(String),
}

/// Settles a single delivery with the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Marks the delivery as processed; it will not be redelivered.
    async fn ack(&mut self) -> Result<(), BrokerError>;

    /// Rejects the delivery. With `requeue` the broker redelivers it later.
    async fn nack(&mut self, requeue: bool) -> Result<(), BrokerError>;
}

/// One message handed to a consumer.
pub struct Delivery {
    payload: Vec<u8>,
    attempt: u32,
    acker: Box<dyn Acknowledger>,
}

impl Delivery {
    /// Creates a delivery. `attempt` is 1 for the first hand-out and grows
    /// with every redelivery of the same message.
    #[must_use]
    pub fn new(payload: Vec<u8>, attempt: u32, acker: Box<dyn Acknowledger>) -> Self {
        Self {
            payload,
            attempt,
            acker,
        }
    }

    /// Raw message body.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// How many times the broker has handed out this message.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Acknowledges the delivery.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Acknowledge` if the broker rejects the ack.
    pub async fn ack(mut self) -> Result<(), BrokerError> {
        self.acker.ack().await
    }

    /// Negatively acknowledges the delivery.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Acknowledge` if the broker rejects the nack.
    pub async fn nack(mut self, requeue: bool) -> Result<(), BrokerError> {
        self.acker.nack(requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("payload_len", &self.payload.len())
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

/// A consuming subscription to the event topic.
#[async_trait]
pub trait EventSubscription: Send {
    /// Waits for the next delivery. `None` means the subscription has ended.
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BrokerError>>;
}

/// A message that could not be processed and was routed aside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// Original message body, unchanged.
    pub payload: Vec<u8>,
    /// Why the message was dead-lettered.
    pub reason: String,
    /// Broker delivery count at the time of dead-lettering.
    pub attempts: u32,
    /// When the message was dead-lettered.
    pub failed_at: DateTime<Utc>,
}

/// Terminal destination for messages that cannot be projected.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    /// Stores the dead letter durably.
    async fn dead_letter(&self, letter: &DeadLetter) -> Result<(), BrokerError>;
}
