//! Aggregate root abstraction.

use uuid::Uuid;

use crate::event::DomainEvent;

/// Trait for write-model aggregates that record the events produced by
/// command handling until they are handed to the publisher.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate produces.
    type Event: DomainEvent;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the current version (number of committed changes).
    fn version(&self) -> i64;

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Removes and returns the uncommitted events.
    fn take_uncommitted_events(&mut self) -> Vec<Self::Event>;
}
