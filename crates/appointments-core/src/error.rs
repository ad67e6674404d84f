//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The requested entity does not exist in the write store.
    #[error("appointment not found: {0}")]
    NotFound(Uuid),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on appointment {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The entity that had the conflict.
        aggregate_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// Malformed or illegal input, including illegal status transitions.
    #[error("validation error: {0}")]
    Validation(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}
