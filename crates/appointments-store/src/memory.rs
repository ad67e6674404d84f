//! In-memory appointment repository for tests and store-less local runs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use appointments_booking::domain::events::AppointmentSnapshot;
use appointments_booking::domain::repository::AppointmentRepository;
use appointments_core::error::DomainError;
use async_trait::async_trait;
use uuid::Uuid;

/// Appointment repository backed by a shared map.
///
/// Applies the same version guard as the `PostgreSQL` adapter.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAppointmentRepository {
    rows: Arc<RwLock<HashMap<Uuid, AppointmentSnapshot>>>,
}

impl InMemoryAppointmentRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored appointments.
    ///
    /// # Panics
    ///
    /// Panics if the internal lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.read().unwrap().len()
    }

    /// Returns `true` if nothing has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> DomainError {
    DomainError::Infrastructure("in-memory store lock poisoned".into())
}

#[async_trait]
impl AppointmentRepository for InMemoryAppointmentRepository {
    async fn find_by_id(
        &self,
        appointment_id: Uuid,
    ) -> Result<Option<AppointmentSnapshot>, DomainError> {
        let rows = self.rows.read().map_err(|_| poisoned())?;
        Ok(rows.get(&appointment_id).cloned())
    }

    async fn save(
        &self,
        snapshot: &AppointmentSnapshot,
        expected_version: i64,
    ) -> Result<(), DomainError> {
        let mut rows = self.rows.write().map_err(|_| poisoned())?;
        let actual = rows.get(&snapshot.appointment_id).map(|row| row.version);
        match (expected_version, actual) {
            (0, None) => {}
            (_, None) => return Err(DomainError::NotFound(snapshot.appointment_id)),
            (expected, Some(actual)) if expected != actual => {
                return Err(DomainError::ConcurrencyConflict {
                    aggregate_id: snapshot.appointment_id,
                    expected,
                    actual,
                });
            }
            _ => {}
        }
        rows.insert(snapshot.appointment_id, snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use appointments_booking::domain::status::AppointmentStatus;
    use chrono::{TimeZone, Utc};

    fn snapshot(version: i64, status: AppointmentStatus) -> AppointmentSnapshot {
        let at = Utc.with_ymd_and_hms(2026, 3, 2, 8, 0, 0).unwrap();
        AppointmentSnapshot {
            appointment_id: Uuid::nil(),
            customer_id: "C1".to_owned(),
            provider_id: None,
            start_time: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap(),
            status,
            version,
            created_at: at,
            updated_at: at,
        }
    }

    #[tokio::test]
    async fn test_insert_then_guarded_update() {
        // Arrange
        let repo = InMemoryAppointmentRepository::new();
        repo.save(&snapshot(1, AppointmentStatus::Requested), 0)
            .await
            .unwrap();

        // Act
        repo.save(&snapshot(2, AppointmentStatus::Confirmed), 1)
            .await
            .unwrap();

        // Assert
        let stored = repo.find_by_id(Uuid::nil()).await.unwrap().unwrap();
        assert_eq!(stored.version, 2);
        assert_eq!(stored.status, AppointmentStatus::Confirmed);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn test_second_insert_conflicts() {
        let repo = InMemoryAppointmentRepository::new();
        repo.save(&snapshot(1, AppointmentStatus::Requested), 0)
            .await
            .unwrap();

        let result = repo.save(&snapshot(1, AppointmentStatus::Requested), 0).await;

        assert!(matches!(
            result,
            Err(DomainError::ConcurrencyConflict {
                expected: 0,
                actual: 1,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_stale_update_conflicts_and_leaves_row_untouched() {
        let repo = InMemoryAppointmentRepository::new();
        repo.save(&snapshot(1, AppointmentStatus::Requested), 0)
            .await
            .unwrap();
        repo.save(&snapshot(2, AppointmentStatus::Confirmed), 1)
            .await
            .unwrap();

        let result = repo.save(&snapshot(2, AppointmentStatus::Cancelled), 1).await;

        assert!(matches!(
            result,
            Err(DomainError::ConcurrencyConflict {
                expected: 1,
                actual: 2,
                ..
            })
        ));
        let stored = repo.find_by_id(Uuid::nil()).await.unwrap().unwrap();
        assert_eq!(stored.status, AppointmentStatus::Confirmed);
    }

    #[tokio::test]
    async fn test_update_of_missing_row_is_not_found() {
        let repo = InMemoryAppointmentRepository::new();

        let result = repo.save(&snapshot(2, AppointmentStatus::Confirmed), 1).await;

        assert!(matches!(result, Err(DomainError::NotFound(_))));
        assert!(repo.is_empty());
    }
}
