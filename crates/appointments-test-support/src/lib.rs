//! Shared test mocks and utilities for the appointments pipeline.

mod broker;
mod clock;
mod publisher;

pub use broker::{InMemoryBroker, InMemorySubscription};
pub use clock::FixedClock;
pub use publisher::{FailingEventPublisher, RecordingEventPublisher};
