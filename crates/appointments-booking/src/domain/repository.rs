//! Write-store port.

use appointments_core::error::DomainError;
use async_trait::async_trait;
use uuid::Uuid;

use super::events::AppointmentSnapshot;

/// Authoritative store for appointments.
///
/// Every `save` is a single-row atomic write guarded by the entity version,
/// so concurrent writers to the same appointment are serialized and the loser
/// receives `DomainError::ConcurrencyConflict`.
#[async_trait]
pub trait AppointmentRepository: Send + Sync {
    /// Loads an appointment by identity.
    async fn find_by_id(&self, appointment_id: Uuid)
    -> Result<Option<AppointmentSnapshot>, DomainError>;

    /// Persists `snapshot`. `expected_version` is the version currently
    /// stored; `0` means the appointment must not exist yet.
    async fn save(
        &self,
        snapshot: &AppointmentSnapshot,
        expected_version: i64,
    ) -> Result<(), DomainError>;
}
