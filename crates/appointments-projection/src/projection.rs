//! The denormalized appointment read model.

use appointments_booking::domain::events::{AppointmentEventKind, EventDecodeError};
use appointments_booking::domain::status::AppointmentStatus;
use appointments_core::event::EventEnvelope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ProjectionError;

/// Read-model copy of an appointment, keyed by `appointment_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentProjection {
    /// Appointment identity; the read-store key.
    pub appointment_id: Uuid,
    /// Customer who booked the appointment.
    pub customer_id: String,
    /// Provider, if one was assigned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<String>,
    /// Inclusive start of the booked interval.
    pub start_time: DateTime<Utc>,
    /// Exclusive end of the booked interval.
    pub end_time: DateTime<Utc>,
    /// Whole minutes between `start_time` and `end_time`.
    pub duration_minutes: i64,
    /// Status as of the last applied event.
    pub status: AppointmentStatus,
    /// Version of the last applied event.
    pub version: i64,
    /// Correlation ID of the last applied event.
    pub correlation_id: Uuid,
    /// When the write store first recorded the appointment.
    pub created_at: DateTime<Utc>,
    /// When the write store last changed the appointment.
    pub updated_at: DateTime<Utc>,
    /// `occurred_at` of the last applied event.
    pub last_event_at: DateTime<Utc>,
}

impl AppointmentProjection {
    /// Builds the projection an envelope describes.
    ///
    /// The envelope's `entity_id` and `version` must agree with the snapshot
    /// in its payload.
    ///
    /// # Errors
    ///
    /// Returns `ProjectionError::UnsupportedEventType` for unknown event
    /// types and `ProjectionError::Deserialization` for payloads that do not
    /// match their declared type or disagree with the envelope.
    pub fn from_envelope(envelope: &EventEnvelope) -> Result<Self, ProjectionError> {
        let kind = AppointmentEventKind::decode(&envelope.event_type, &envelope.payload)
            .map_err(|e| match e {
                EventDecodeError::UnknownEventType(event_type) => {
                    ProjectionError::UnsupportedEventType(event_type)
                }
                e @ EventDecodeError::InvalidPayload { .. } => {
                    ProjectionError::Deserialization(e.to_string())
                }
            })?;
        let snapshot = kind.snapshot();

        if snapshot.appointment_id != envelope.entity_id {
            return Err(ProjectionError::Deserialization(format!(
                "entity_id {} does not match payload appointment {}",
                envelope.entity_id, snapshot.appointment_id
            )));
        }
        if snapshot.version != envelope.version {
            return Err(ProjectionError::Deserialization(format!(
                "envelope version {} does not match payload version {}",
                envelope.version, snapshot.version
            )));
        }

        Ok(Self {
            appointment_id: snapshot.appointment_id,
            customer_id: snapshot.customer_id.clone(),
            provider_id: snapshot.provider_id.clone(),
            start_time: snapshot.start_time,
            end_time: snapshot.end_time,
            duration_minutes: (snapshot.end_time - snapshot.start_time).num_minutes(),
            status: snapshot.status,
            version: envelope.version,
            correlation_id: envelope.correlation_id,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            last_event_at: envelope.occurred_at,
        })
    }

    /// Decodes raw broker bytes into a projection.
    ///
    /// # Errors
    ///
    /// See [`EventEnvelope::from_slice`] and [`Self::from_envelope`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProjectionError> {
        let envelope = EventEnvelope::from_slice(bytes)?;
        Self::from_envelope(&envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use appointments_booking::domain::events::{
        AppointmentCreated, AppointmentEvent, AppointmentSnapshot, AppointmentStatusChanged,
    };
    use chrono::TimeZone;

    fn snapshot(status: AppointmentStatus, version: i64) -> AppointmentSnapshot {
        AppointmentSnapshot {
            appointment_id: Uuid::now_v7(),
            customer_id: "C1".to_owned(),
            provider_id: None,
            start_time: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            end_time: Utc.with_ymd_and_hms(2026, 1, 15, 10, 30, 0).unwrap(),
            status,
            version,
            created_at: Utc.with_ymd_and_hms(2026, 1, 14, 8, 0, 0).unwrap(),
            updated_at: Utc.with_ymd_and_hms(2026, 1, 14, 8, 0, 0).unwrap(),
        }
    }

    fn envelope(kind: AppointmentEventKind) -> EventEnvelope {
        let event = AppointmentEvent::new(kind, Uuid::new_v4(), Utc::now());
        EventEnvelope::from_event(&event).unwrap()
    }

    #[test]
    fn test_created_event_projects_snapshot_with_duration() {
        // Arrange
        let appointment = snapshot(AppointmentStatus::Requested, 1);
        let envelope = envelope(AppointmentEventKind::Created(AppointmentCreated {
            appointment: appointment.clone(),
        }));

        // Act
        let projection = AppointmentProjection::from_envelope(&envelope).unwrap();

        // Assert
        assert_eq!(projection.appointment_id, appointment.appointment_id);
        assert_eq!(projection.customer_id, "C1");
        assert_eq!(projection.duration_minutes, 30);
        assert_eq!(projection.status, AppointmentStatus::Requested);
        assert_eq!(projection.version, 1);
        assert_eq!(projection.correlation_id, envelope.correlation_id);
        assert_eq!(projection.last_event_at, envelope.occurred_at);
    }

    #[test]
    fn test_status_changed_event_projects_new_status() {
        let appointment = snapshot(AppointmentStatus::Cancelled, 3);
        let envelope = envelope(AppointmentEventKind::StatusChanged(
            AppointmentStatusChanged {
                appointment,
                previous_status: AppointmentStatus::Confirmed,
                new_status: AppointmentStatus::Cancelled,
            },
        ));

        let projection = AppointmentProjection::from_envelope(&envelope).unwrap();

        assert_eq!(projection.status, AppointmentStatus::Cancelled);
        assert_eq!(projection.version, 3);
    }

    #[test]
    fn test_unknown_event_type_is_unsupported() {
        let mut envelope = envelope(AppointmentEventKind::Created(AppointmentCreated {
            appointment: snapshot(AppointmentStatus::Requested, 1),
        }));
        envelope.event_type = "appointment.rescheduled".to_owned();

        let result = AppointmentProjection::from_envelope(&envelope);

        assert_eq!(
            result,
            Err(ProjectionError::UnsupportedEventType(
                "appointment.rescheduled".to_owned()
            ))
        );
    }

    #[test]
    fn test_version_mismatch_between_envelope_and_payload_is_rejected() {
        let mut envelope = envelope(AppointmentEventKind::Created(AppointmentCreated {
            appointment: snapshot(AppointmentStatus::Requested, 1),
        }));
        envelope.version = 5;

        let result = AppointmentProjection::from_envelope(&envelope);

        assert!(matches!(result, Err(ProjectionError::Deserialization(_))));
    }

    #[test]
    fn test_garbage_bytes_are_a_deserialization_error() {
        let result = AppointmentProjection::from_slice(b"{not json");

        assert!(matches!(result, Err(ProjectionError::Deserialization(_))));
    }
}
