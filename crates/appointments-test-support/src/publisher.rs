//! Test publishers — mock `EventPublisher` implementations for tests.

use std::sync::Mutex;

use appointments_core::broker::BrokerError;
use appointments_core::event::EventEnvelope;
use appointments_core::publisher::EventPublisher;
use async_trait::async_trait;

/// A publisher that records every envelope and always succeeds.
#[derive(Debug, Default)]
pub struct RecordingEventPublisher {
    published: Mutex<Vec<EventEnvelope>>,
}

impl RecordingEventPublisher {
    /// Creates an empty recording publisher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all envelopes that were published.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<EventEnvelope> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingEventPublisher {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), BrokerError> {
        self.published.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

/// A publisher that always fails, modelling a broker outage.
#[derive(Debug)]
pub struct FailingEventPublisher;

#[async_trait]
impl EventPublisher for FailingEventPublisher {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), BrokerError> {
        Err(BrokerError::Publish {
            topic: "appointment-events".to_owned(),
            reason: format!("broker unavailable for event {}", envelope.event_id),
        })
    }
}
