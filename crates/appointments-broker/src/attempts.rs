//! Delivery counting for brokers that do not report redeliveries.
//!
//! Kafka hands the same record out again after a seek but keeps no count of
//! how often it did so. [`DeliveryAttempts`] keeps that count in process
//! memory, keyed by the record's position, until the record is committed.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use appointments_core::broker::BrokerError;

/// Where a record sits in the log.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessagePosition {
    /// Topic name.
    pub topic: String,
    /// Partition within the topic.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
}

impl MessagePosition {
    /// Creates a position.
    #[must_use]
    pub fn new(topic: impl Into<String>, partition: i32, offset: i64) -> Self {
        Self {
            topic: topic.into(),
            partition,
            offset,
        }
    }
}

/// Shared delivery counters, one per uncommitted record.
#[derive(Debug, Clone, Default)]
pub struct DeliveryAttempts {
    counts: Arc<Mutex<HashMap<MessagePosition, u32>>>,
}

fn poisoned() -> BrokerError {
    BrokerError::Subscription("delivery counter lock poisoned".into())
}

impl DeliveryAttempts {
    /// Creates an empty counter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one more hand-out of the record and returns the new total,
    /// starting at 1.
    ///
    /// # Errors
    ///
    /// Returns `BrokerError::Subscription` if the counter lock is poisoned.
    pub fn record(&self, position: &MessagePosition) -> Result<u32, BrokerError> {
        let mut counts = self.counts.lock().map_err(|_| poisoned())?;
        let count = counts.entry(position.clone()).or_insert(0);
        *count += 1;
        Ok(*count)
    }

    /// Forgets the record once it has been committed.
    pub fn settle(&self, position: &MessagePosition) {
        if let Ok(mut counts) = self.counts.lock() {
            counts.remove(position);
        }
    }

    /// Hand-outs counted so far for the record, 0 if none.
    #[must_use]
    pub fn current(&self, position: &MessagePosition) -> u32 {
        self.counts
            .lock()
            .map(|counts| counts.get(position).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Number of records still being counted.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.counts.lock().map(|counts| counts.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_delivery_counts_as_attempt_one() {
        let attempts = DeliveryAttempts::new();

        let attempt = attempts.record(&MessagePosition::new("appointment-events", 0, 41)).unwrap();

        assert_eq!(attempt, 1);
    }

    #[test]
    fn test_redelivery_of_same_position_increments_count() {
        // Arrange
        let attempts = DeliveryAttempts::new();
        let position = MessagePosition::new("appointment-events", 2, 7);

        // Act
        attempts.record(&position).unwrap();
        attempts.record(&position).unwrap();
        let third = attempts.record(&position).unwrap();

        // Assert
        assert_eq!(third, 3);
        assert_eq!(attempts.current(&position), 3);
    }

    #[test]
    fn test_positions_are_counted_independently() {
        let attempts = DeliveryAttempts::new();
        let first = MessagePosition::new("appointment-events", 0, 7);
        let other_partition = MessagePosition::new("appointment-events", 1, 7);

        attempts.record(&first).unwrap();
        attempts.record(&first).unwrap();
        let attempt = attempts.record(&other_partition).unwrap();

        assert_eq!(attempt, 1);
        assert_eq!(attempts.tracked(), 2);
    }

    #[test]
    fn test_settle_removes_counter_and_restarts_at_one() {
        // Arrange
        let attempts = DeliveryAttempts::new();
        let position = MessagePosition::new("appointment-events", 0, 9);
        attempts.record(&position).unwrap();
        attempts.record(&position).unwrap();

        // Act
        attempts.settle(&position);

        // Assert
        assert_eq!(attempts.tracked(), 0);
        assert_eq!(attempts.current(&position), 0);
        assert_eq!(attempts.record(&position).unwrap(), 1);
    }

    #[test]
    fn test_clones_share_counters() {
        let attempts = DeliveryAttempts::new();
        let acker_view = attempts.clone();
        let position = MessagePosition::new("appointment-events", 0, 3);

        attempts.record(&position).unwrap();
        acker_view.settle(&position);

        assert_eq!(attempts.tracked(), 0);
    }
}
