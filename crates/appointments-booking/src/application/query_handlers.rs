//! Query handlers for the booking context.

use appointments_core::error::DomainError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::events::AppointmentSnapshot;
use crate::domain::repository::AppointmentRepository;
use crate::domain::status::AppointmentStatus;

/// Read-only view of an appointment as stored in the write store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppointmentView {
    /// The appointment identifier.
    pub id: Uuid,
    /// The customer who booked the appointment.
    pub customer_id: String,
    /// The provider, if one was named at creation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// Inclusive start of the booked interval.
    pub start_time: DateTime<Utc>,
    /// Exclusive end of the booked interval.
    pub end_time: DateTime<Utc>,
    /// Current lifecycle status.
    pub status: AppointmentStatus,
    /// Monotonic version; 1 at creation.
    pub version: i64,
    /// When the appointment was created.
    pub created_at: DateTime<Utc>,
    /// When the appointment was last changed.
    pub updated_at: DateTime<Utc>,
}

impl From<AppointmentSnapshot> for AppointmentView {
    fn from(snapshot: AppointmentSnapshot) -> Self {
        Self {
            id: snapshot.appointment_id,
            customer_id: snapshot.customer_id,
            provider_id: snapshot.provider_id,
            start_time: snapshot.start_time,
            end_time: snapshot.end_time,
            status: snapshot.status,
            version: snapshot.version,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        }
    }
}

/// Retrieves an appointment by identifier from the write store.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if no appointment has this identifier and
/// `DomainError::Infrastructure` if the store fails.
pub async fn get_appointment(
    appointment_id: Uuid,
    repo: &dyn AppointmentRepository,
) -> Result<AppointmentView, DomainError> {
    repo.find_by_id(appointment_id)
        .await?
        .map(AppointmentView::from)
        .ok_or(DomainError::NotFound(appointment_id))
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use chrono::TimeZone;

    #[derive(Debug)]
    struct SingleRowRepository(Option<AppointmentSnapshot>);

    #[async_trait]
    impl AppointmentRepository for SingleRowRepository {
        async fn find_by_id(
            &self,
            appointment_id: Uuid,
        ) -> Result<Option<AppointmentSnapshot>, DomainError> {
            Ok(self
                .0
                .clone()
                .filter(|row| row.appointment_id == appointment_id))
        }

        async fn save(
            &self,
            _snapshot: &AppointmentSnapshot,
            _expected_version: i64,
        ) -> Result<(), DomainError> {
            unimplemented!("read-only repository")
        }
    }

    fn snapshot(id: Uuid) -> AppointmentSnapshot {
        let created = Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap();
        AppointmentSnapshot {
            appointment_id: id,
            customer_id: "C1".to_owned(),
            provider_id: Some("P7".to_owned()),
            start_time: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2026, 1, 15, 10, 30, 0).unwrap(),
            status: AppointmentStatus::Confirmed,
            version: 2,
            created_at: created,
            updated_at: created,
        }
    }

    #[tokio::test]
    async fn test_get_appointment_maps_snapshot_to_view() {
        // Arrange
        let id = Uuid::new_v4();
        let repo = SingleRowRepository(Some(snapshot(id)));

        // Act
        let view = get_appointment(id, &repo).await.unwrap();

        // Assert
        assert_eq!(view.id, id);
        assert_eq!(view.customer_id, "C1");
        assert_eq!(view.provider_id.as_deref(), Some("P7"));
        assert_eq!(view.status, AppointmentStatus::Confirmed);
        assert_eq!(view.version, 2);
    }

    #[tokio::test]
    async fn test_get_appointment_returns_not_found_for_unknown_id() {
        let repo = SingleRowRepository(Some(snapshot(Uuid::new_v4())));
        let missing = Uuid::new_v4();

        let result = get_appointment(missing, &repo).await;

        assert!(matches!(result, Err(DomainError::NotFound(id)) if id == missing));
    }

    #[test]
    fn test_view_serializes_status_in_wire_form() {
        let view = AppointmentView::from(snapshot(Uuid::new_v4()));

        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["status"], "CONFIRMED");
        assert_eq!(json["provider_id"], "P7");
        assert_eq!(json["version"], 2);
    }
}
