//! Shared application state.

use std::sync::Arc;

use appointments_booking::domain::repository::AppointmentRepository;
use appointments_core::clock::Clock;
use appointments_core::publisher::Publisher;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Clock used to timestamp writes.
    pub clock: Arc<dyn Clock>,
    /// Authoritative appointment store.
    pub appointment_repository: Arc<dyn AppointmentRepository>,
    /// Event publication capability; may be absent.
    pub publisher: Publisher,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        appointment_repository: Arc<dyn AppointmentRepository>,
        publisher: Publisher,
    ) -> Self {
        Self {
            clock,
            appointment_repository,
            publisher,
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("publisher", &self.publisher)
            .finish_non_exhaustive()
    }
}
