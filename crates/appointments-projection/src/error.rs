//! Projection error types.

use appointments_core::broker::BrokerError;
use appointments_core::event::EnvelopeError;
use thiserror::Error;

/// Errors raised while projecting an event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProjectionError {
    /// The message is not a well-formed appointment event.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// The envelope names an event type this worker does not project.
    #[error("unsupported event type: {0}")]
    UnsupportedEventType(String),

    /// The envelope uses a schema version this worker does not understand.
    #[error("unsupported schema version: {0}")]
    UnsupportedSchemaVersion(u16),

    /// The read store rejected or failed the write.
    #[error("read store error: {0}")]
    ReadStore(String),
}

impl ProjectionError {
    /// Returns `true` if redelivering the same message could succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ReadStore(_))
    }
}

impl From<EnvelopeError> for ProjectionError {
    fn from(e: EnvelopeError) -> Self {
        match e {
            EnvelopeError::UnsupportedSchemaVersion(version) => {
                Self::UnsupportedSchemaVersion(version)
            }
            EnvelopeError::Malformed(e) => Self::Deserialization(e.to_string()),
        }
    }
}

/// Errors that stop the projection worker.
///
/// The delivery being handled is left unsettled, so the broker hands it out
/// again once a worker resumes.
#[derive(Debug, Clone, Error)]
pub enum WorkerError {
    /// An ack or nack failed. Consuming past the delivery could commit over it.
    #[error("failed to settle delivery: {0}")]
    Settle(#[from] BrokerError),

    /// Dead-lettering still failed on the last delivery allowed.
    #[error("dead-letter sink unavailable after {attempts} deliveries: {reason}")]
    DeadLetterUnavailable {
        /// Broker delivery count of the message.
        attempts: u32,
        /// Last error reported by the sink.
        reason: String,
    },
}
