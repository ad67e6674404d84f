//! Domain events for the booking context.
//!
//! Every event carries a full snapshot of the appointment as committed, so a
//! consumer can rebuild its projection from any single event regardless of
//! delivery order.

use appointments_core::event::{DomainEvent, EventMetadata};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::status::AppointmentStatus;

/// Event type tag for [`AppointmentCreated`].
pub const APPOINTMENT_CREATED: &str = "appointment.created";

/// Event type tag for [`AppointmentStatusChanged`].
pub const APPOINTMENT_STATUS_CHANGED: &str = "appointment.status_changed";

/// State of an appointment as committed to the write store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentSnapshot {
    /// Appointment identifier.
    pub appointment_id: Uuid,
    /// Customer the appointment is for.
    pub customer_id: String,
    /// Provider the appointment is with, if any.
    pub provider_id: Option<String>,
    /// Start of the requested interval (inclusive).
    pub start_time: DateTime<Utc>,
    /// End of the requested interval (exclusive).
    pub end_time: DateTime<Utc>,
    /// Current status.
    pub status: AppointmentStatus,
    /// Version after the write (1 after creation).
    pub version: i64,
    /// When the appointment was created.
    pub created_at: DateTime<Utc>,
    /// When the appointment was last modified.
    pub updated_at: DateTime<Utc>,
}

/// Emitted when an appointment is requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentCreated {
    /// The appointment as created.
    pub appointment: AppointmentSnapshot,
}

/// Emitted when an appointment moves to a new status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppointmentStatusChanged {
    /// The appointment after the change.
    pub appointment: AppointmentSnapshot,
    /// Status before the change.
    pub previous_status: AppointmentStatus,
    /// Status after the change.
    pub new_status: AppointmentStatus,
}

/// Event payload variants for the booking context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppointmentEventKind {
    /// An appointment was requested.
    Created(AppointmentCreated),
    /// An appointment changed status.
    StatusChanged(AppointmentStatusChanged),
}

/// Errors raised while decoding an event payload from the wire.
#[derive(Debug, Error)]
pub enum EventDecodeError {
    /// The `event_type` tag is not one this build understands.
    #[error("unknown event type: {0}")]
    UnknownEventType(String),

    /// The payload does not match the shape declared by `event_type`.
    #[error("invalid payload for {event_type}: {source}")]
    InvalidPayload {
        /// The declared event type.
        event_type: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },
}

impl AppointmentEventKind {
    /// Returns the event type tag for this variant.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Created(_) => APPOINTMENT_CREATED,
            Self::StatusChanged(_) => APPOINTMENT_STATUS_CHANGED,
        }
    }

    /// Returns the appointment snapshot carried by the event.
    #[must_use]
    pub fn snapshot(&self) -> &AppointmentSnapshot {
        match self {
            Self::Created(payload) => &payload.appointment,
            Self::StatusChanged(payload) => &payload.appointment,
        }
    }

    /// Decodes a payload using the envelope's `event_type` as discriminator.
    ///
    /// # Errors
    ///
    /// Returns `EventDecodeError::UnknownEventType` for unrecognized tags and
    /// `EventDecodeError::InvalidPayload` if the payload does not parse.
    pub fn decode(event_type: &str, payload: &serde_json::Value) -> Result<Self, EventDecodeError> {
        let invalid = |source| EventDecodeError::InvalidPayload {
            event_type: event_type.to_owned(),
            source,
        };
        match event_type {
            APPOINTMENT_CREATED => AppointmentCreated::deserialize(payload)
                .map(Self::Created)
                .map_err(invalid),
            APPOINTMENT_STATUS_CHANGED => AppointmentStatusChanged::deserialize(payload)
                .map(Self::StatusChanged)
                .map_err(invalid),
            other => Err(EventDecodeError::UnknownEventType(other.to_owned())),
        }
    }

    fn to_value(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::Created(payload) => serde_json::to_value(payload),
            Self::StatusChanged(payload) => serde_json::to_value(payload),
        }
    }
}

/// Domain event envelope for the booking context.
#[derive(Debug, Clone)]
pub struct AppointmentEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: AppointmentEventKind,
}

impl AppointmentEvent {
    /// Builds an event whose metadata mirrors the snapshot's identity and
    /// version.
    #[must_use]
    pub fn new(kind: AppointmentEventKind, correlation_id: Uuid, occurred_at: DateTime<Utc>) -> Self {
        let snapshot = kind.snapshot();
        Self {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: kind.event_type().to_owned(),
                aggregate_id: snapshot.appointment_id,
                sequence_number: snapshot.version,
                correlation_id,
                causation_id: correlation_id,
                occurred_at,
            },
            kind,
        }
    }
}

impl DomainEvent for AppointmentEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        self.kind.to_value()
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn snapshot() -> AppointmentSnapshot {
        let at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        AppointmentSnapshot {
            appointment_id: Uuid::new_v4(),
            customer_id: "C1".to_owned(),
            provider_id: Some("P1".to_owned()),
            start_time: at,
            end_time: Utc.with_ymd_and_hms(2026, 1, 15, 10, 30, 0).unwrap(),
            status: AppointmentStatus::Requested,
            version: 1,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_payload_decodes_back_through_event_type() {
        // Arrange
        let kind = AppointmentEventKind::StatusChanged(AppointmentStatusChanged {
            appointment: snapshot(),
            previous_status: AppointmentStatus::Requested,
            new_status: AppointmentStatus::Confirmed,
        });
        let event = AppointmentEvent::new(kind.clone(), Uuid::new_v4(), Utc::now());

        // Act
        let payload = event.to_payload().unwrap();
        let decoded = AppointmentEventKind::decode(event.event_type(), &payload).unwrap();

        // Assert
        assert_eq!(decoded, kind);
    }

    #[test]
    fn test_metadata_mirrors_snapshot_identity_and_version() {
        let snapshot = snapshot();
        let correlation_id = Uuid::new_v4();

        let event = AppointmentEvent::new(
            AppointmentEventKind::Created(AppointmentCreated {
                appointment: snapshot.clone(),
            }),
            correlation_id,
            snapshot.created_at,
        );

        assert_eq!(event.metadata.aggregate_id, snapshot.appointment_id);
        assert_eq!(event.metadata.sequence_number, 1);
        assert_eq!(event.metadata.event_type, APPOINTMENT_CREATED);
        assert_eq!(event.metadata.correlation_id, correlation_id);
    }

    #[test]
    fn test_decode_rejects_unknown_event_type() {
        let result = AppointmentEventKind::decode("appointment.rescheduled", &serde_json::json!({}));

        match result {
            Err(EventDecodeError::UnknownEventType(tag)) => {
                assert_eq!(tag, "appointment.rescheduled");
            }
            other => panic!("expected UnknownEventType, got {other:?}"),
        }
    }

    #[test]
    fn test_decode_rejects_payload_of_wrong_shape() {
        let result = AppointmentEventKind::decode(APPOINTMENT_CREATED, &serde_json::json!({ "x": 1 }));

        assert!(matches!(result, Err(EventDecodeError::InvalidPayload { .. })));
    }
}
