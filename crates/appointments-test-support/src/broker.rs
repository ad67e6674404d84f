//! In-memory at-least-once broker for pipeline tests.
//!
//! Publishing enqueues the encoded envelope. A subscription hands messages out
//! in FIFO order; a requeueing nack puts the message back at the tail with its
//! delivery count incremented, which is how the real broker behaves after an
//! ack timeout. The subscription ends once the queue is drained, so a worker
//! driven by it runs to completion in tests. A delivery dropped without being
//! settled stays counted as in flight, like an uncommitted record.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use appointments_core::broker::{
    Acknowledger, BrokerError, DeadLetter, DeadLetterSink, Delivery, EventSubscription,
};
use appointments_core::event::EventEnvelope;
use appointments_core::publisher::EventPublisher;
use async_trait::async_trait;

#[derive(Debug)]
struct QueuedMessage {
    payload: Vec<u8>,
    deliveries: u32,
}

#[derive(Debug, Default)]
struct BrokerState {
    queue: VecDeque<QueuedMessage>,
    dead_letters: Vec<DeadLetter>,
    acked: usize,
    dropped: usize,
    in_flight: usize,
    dead_letter_unavailable: bool,
    nack_failing: bool,
}

/// A shared in-memory queue with a dead-letter list.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBroker {
    state: Arc<Mutex<BrokerState>>,
}

impl InMemoryBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a subscription that drains the queue.
    #[must_use]
    pub fn subscribe(&self) -> InMemorySubscription {
        InMemorySubscription {
            state: Arc::clone(&self.state),
        }
    }

    /// Enqueues raw bytes, bypassing envelope encoding.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn push_raw(&self, payload: Vec<u8>) {
        self.state.lock().unwrap().queue.push_back(QueuedMessage {
            payload,
            deliveries: 0,
        });
    }

    /// Number of messages waiting to be delivered.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn pending(&self) -> usize {
        self.state.lock().unwrap().queue.len()
    }

    /// Number of acknowledged messages.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn acked(&self) -> usize {
        self.state.lock().unwrap().acked
    }

    /// Number of messages rejected without requeue.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn dropped(&self) -> usize {
        self.state.lock().unwrap().dropped
    }

    /// Number of deliveries handed out and not yet settled.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn in_flight(&self) -> usize {
        self.state.lock().unwrap().in_flight
    }

    /// Returns a snapshot of all dead letters.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state.lock().unwrap().dead_letters.clone()
    }

    /// Makes the dead-letter sink fail until switched back.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_dead_letter_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().dead_letter_unavailable = unavailable;
    }

    /// Makes every nack fail, leaving the delivery in flight, until switched
    /// back.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_nack_failing(&self, failing: bool) {
        self.state.lock().unwrap().nack_failing = failing;
    }
}

#[async_trait]
impl EventPublisher for InMemoryBroker {
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), BrokerError> {
        let payload = envelope.to_bytes().map_err(|e| BrokerError::Publish {
            topic: "in-memory".to_owned(),
            reason: e.to_string(),
        })?;
        self.push_raw(payload);
        Ok(())
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryBroker {
    async fn dead_letter(&self, letter: &DeadLetter) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        if state.dead_letter_unavailable {
            return Err(BrokerError::Publish {
                topic: "in-memory.dlq".to_owned(),
                reason: "dead-letter topic unavailable".to_owned(),
            });
        }
        state.dead_letters.push(letter.clone());
        Ok(())
    }
}

/// Draining subscription over an [`InMemoryBroker`].
#[derive(Debug)]
pub struct InMemorySubscription {
    state: Arc<Mutex<BrokerState>>,
}

#[async_trait]
impl EventSubscription for InMemorySubscription {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, BrokerError>> {
        let message = {
            let mut state = self.state.lock().unwrap();
            let message = state.queue.pop_front()?;
            state.in_flight += 1;
            message
        };
        let attempt = message.deliveries + 1;
        let acker = InMemoryAcker {
            state: Arc::clone(&self.state),
            payload: message.payload.clone(),
            attempt,
        };
        Some(Ok(Delivery::new(message.payload, attempt, Box::new(acker))))
    }
}

struct InMemoryAcker {
    state: Arc<Mutex<BrokerState>>,
    payload: Vec<u8>,
    attempt: u32,
}

#[async_trait]
impl Acknowledger for InMemoryAcker {
    async fn ack(&mut self) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        state.acked += 1;
        state.in_flight -= 1;
        Ok(())
    }

    async fn nack(&mut self, requeue: bool) -> Result<(), BrokerError> {
        let mut state = self.state.lock().unwrap();
        if state.nack_failing {
            return Err(BrokerError::Acknowledge("nack rejected".to_owned()));
        }
        state.in_flight -= 1;
        if requeue {
            state.queue.push_back(QueuedMessage {
                payload: std::mem::take(&mut self.payload),
                deliveries: self.attempt,
            });
        } else {
            state.dropped += 1;
        }
        Ok(())
    }
}
