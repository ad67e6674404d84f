//! Domain events and the versioned wire envelope shared by the publisher and
//! the projection worker.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Envelope schema version written by this build.
pub const ENVELOPE_SCHEMA_VERSION: u16 = 1;

/// Metadata attached to every domain event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Type name for deserialization routing.
    pub event_type: String,
    /// Entity this event belongs to.
    pub aggregate_id: Uuid,
    /// Entity version after the write that produced this event.
    pub sequence_number: i64,
    /// Correlation ID for tracing a request through its effects.
    pub correlation_id: Uuid,
    /// Causation ID linking this event to the command that caused it.
    pub causation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

/// Trait that all domain events implement.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type name (used for serialization routing).
    fn event_type(&self) -> &'static str;

    /// Serializes the event payload to JSON.
    ///
    /// # Errors
    ///
    /// Returns the underlying `serde_json` error if the payload cannot be
    /// represented as JSON.
    fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error>;

    /// Returns the metadata for this event.
    fn metadata(&self) -> &EventMetadata;
}

/// Errors raised while encoding or decoding an [`EventEnvelope`].
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The bytes are not a well-formed envelope.
    #[error("malformed event envelope: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The envelope was written by a newer, incompatible producer.
    #[error("unsupported envelope schema version {0}")]
    UnsupportedSchemaVersion(u16),
}

/// Self-describing JSON envelope carried by the broker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Wire format version.
    pub schema_version: u16,
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Event type tag, e.g. `appointment.created`.
    pub event_type: String,
    /// Identity of the entity the event describes.
    pub entity_id: Uuid,
    /// Monotonic per-entity version.
    pub version: i64,
    /// Correlation ID propagated from the inbound request.
    pub correlation_id: Uuid,
    /// Causation ID of the command that produced the event.
    pub causation_id: Uuid,
    /// When the write happened.
    pub occurred_at: DateTime<Utc>,
    /// Entity snapshot or status-change delta.
    pub payload: serde_json::Value,
}

impl EventEnvelope {
    /// Wraps a domain event in the current envelope schema.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::Malformed` if the event payload cannot be
    /// serialized.
    pub fn from_event(event: &dyn DomainEvent) -> Result<Self, EnvelopeError> {
        let meta = event.metadata();
        Ok(Self {
            schema_version: ENVELOPE_SCHEMA_VERSION,
            event_id: meta.event_id,
            event_type: event.event_type().to_owned(),
            entity_id: meta.aggregate_id,
            version: meta.sequence_number,
            correlation_id: meta.correlation_id,
            causation_id: meta.causation_id,
            occurred_at: meta.occurred_at,
            payload: event.to_payload()?,
        })
    }

    /// Serializes the envelope to its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::Malformed` if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, EnvelopeError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parses an envelope from its JSON wire form, rejecting schema versions
    /// newer than this build understands.
    ///
    /// # Errors
    ///
    /// Returns `EnvelopeError::Malformed` for invalid JSON or missing fields
    /// and `EnvelopeError::UnsupportedSchemaVersion` for unknown versions.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        let envelope: Self = serde_json::from_slice(bytes)?;
        if envelope.schema_version == 0 || envelope.schema_version > ENVELOPE_SCHEMA_VERSION {
            return Err(EnvelopeError::UnsupportedSchemaVersion(
                envelope.schema_version,
            ));
        }
        Ok(envelope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[derive(Debug)]
    struct PingEvent {
        metadata: EventMetadata,
    }

    impl DomainEvent for PingEvent {
        fn event_type(&self) -> &'static str {
            "test.ping"
        }

        fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
            Ok(serde_json::json!({ "ping": true }))
        }

        fn metadata(&self) -> &EventMetadata {
            &self.metadata
        }
    }

    fn ping(sequence_number: i64) -> PingEvent {
        let id = Uuid::new_v4();
        PingEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: "test.ping".to_owned(),
                aggregate_id: id,
                sequence_number,
                correlation_id: Uuid::new_v4(),
                causation_id: Uuid::new_v4(),
                occurred_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
            },
        }
    }

    #[test]
    fn test_from_event_copies_metadata_into_envelope() {
        // Arrange
        let event = ping(3);

        // Act
        let envelope = EventEnvelope::from_event(&event).unwrap();

        // Assert
        let meta = event.metadata();
        assert_eq!(envelope.schema_version, ENVELOPE_SCHEMA_VERSION);
        assert_eq!(envelope.event_id, meta.event_id);
        assert_eq!(envelope.event_type, "test.ping");
        assert_eq!(envelope.entity_id, meta.aggregate_id);
        assert_eq!(envelope.version, 3);
        assert_eq!(envelope.correlation_id, meta.correlation_id);
        assert_eq!(envelope.occurred_at, meta.occurred_at);
        assert_eq!(envelope.payload, serde_json::json!({ "ping": true }));
    }

    #[test]
    fn test_wire_form_uses_documented_field_names() {
        let envelope = EventEnvelope::from_event(&ping(1)).unwrap();

        let json: serde_json::Value =
            serde_json::from_slice(&envelope.to_bytes().unwrap()).unwrap();

        for field in [
            "schema_version",
            "event_id",
            "event_type",
            "entity_id",
            "version",
            "correlation_id",
            "causation_id",
            "occurred_at",
            "payload",
        ] {
            assert!(json.get(field).is_some(), "missing field {field}");
        }
    }

    #[test]
    fn test_from_slice_rejects_garbage() {
        let result = EventEnvelope::from_slice(b"not json");

        assert!(matches!(result, Err(EnvelopeError::Malformed(_))));
    }

    #[test]
    fn test_from_slice_rejects_newer_schema_version() {
        let mut envelope = EventEnvelope::from_event(&ping(1)).unwrap();
        envelope.schema_version = ENVELOPE_SCHEMA_VERSION + 1;
        let bytes = serde_json::to_vec(&envelope).unwrap();

        let result = EventEnvelope::from_slice(&bytes);

        match result {
            Err(EnvelopeError::UnsupportedSchemaVersion(v)) => {
                assert_eq!(v, ENVELOPE_SCHEMA_VERSION + 1);
            }
            other => panic!("expected UnsupportedSchemaVersion, got {other:?}"),
        }
    }
}
