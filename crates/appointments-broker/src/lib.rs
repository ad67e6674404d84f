//! Broker wiring for the appointment event pipeline.
//!
//! [`topology`] names the topics and consumer group, and [`attempts`] counts
//! redeliveries per record. Both are always available.
//! The Kafka adapters need librdkafka and compile only with the `kafka`
//! feature.

pub mod attempts;
pub mod topology;

#[cfg(feature = "kafka")]
pub mod kafka;
