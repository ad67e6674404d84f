//! Event publication as an optional capability.
//!
//! Publishing happens after the write store has committed. A broker outage is
//! a known condition: the command still succeeds and the caller receives a
//! [`PublishOutcome::Degraded`] instead of an error.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::broker::BrokerError;
use crate::event::EventEnvelope;

/// Hands envelopes to a durable broker topic.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publishes one envelope with persistent delivery.
    async fn publish(&self, envelope: &EventEnvelope) -> Result<(), BrokerError>;
}

/// Why a publication did not reach the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DegradedReason {
    /// The service was started without a publisher.
    PublisherAbsent,
    /// The event could not be encoded.
    Encoding(String),
    /// The broker rejected or timed out the publish.
    PublishFailed(String),
}

impl fmt::Display for DegradedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PublisherAbsent => f.write_str("publisher absent"),
            Self::Encoding(reason) => write!(f, "event encoding failed: {reason}"),
            Self::PublishFailed(reason) => write!(f, "publish failed: {reason}"),
        }
    }
}

/// Result of a best-effort publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Every event reached the broker.
    Published,
    /// At least one event did not reach the broker; the read model stays stale
    /// until the event is republished.
    Degraded(DegradedReason),
}

impl PublishOutcome {
    /// Returns `true` if the outcome is degraded.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// Publication capability handed to the command handlers.
#[derive(Clone, Default)]
pub enum Publisher {
    /// A broker publisher is available.
    Connected(Arc<dyn EventPublisher>),
    /// No broker; publication reports a degraded outcome.
    #[default]
    Absent,
}

impl Publisher {
    /// Publishes an envelope, turning every failure into a degraded outcome.
    pub async fn publish(&self, envelope: &EventEnvelope) -> PublishOutcome {
        match self {
            Self::Connected(publisher) => match publisher.publish(envelope).await {
                Ok(()) => PublishOutcome::Published,
                Err(e) => PublishOutcome::Degraded(DegradedReason::PublishFailed(e.to_string())),
            },
            Self::Absent => PublishOutcome::Degraded(DegradedReason::PublisherAbsent),
        }
    }

    /// Returns `true` if a broker publisher is configured.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(_) => f.write_str("Publisher::Connected"),
            Self::Absent => f.write_str("Publisher::Absent"),
        }
    }
}
