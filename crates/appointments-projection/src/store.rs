//! Read-store port.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ProjectionError;
use crate::projection::AppointmentProjection;

/// Result of a version-guarded upsert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The projection was newer than the stored copy and was written.
    Applied,
    /// The stored copy is at the same or a newer version; nothing changed.
    Stale,
}

/// Non-authoritative store of appointment projections.
///
/// Implementations must make `upsert_if_newer` atomic per key: a projection is
/// written only if its version is strictly greater than the stored version.
#[async_trait]
pub trait ReadModelStore: Send + Sync {
    /// Writes `projection` unless the stored copy is at the same or a newer
    /// version.
    async fn upsert_if_newer(
        &self,
        projection: &AppointmentProjection,
    ) -> Result<UpsertOutcome, ProjectionError>;

    /// Loads the stored projection for `appointment_id`.
    async fn get(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<AppointmentProjection>, ProjectionError>;
}
