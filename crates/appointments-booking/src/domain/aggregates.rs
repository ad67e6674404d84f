//! Aggregate roots for the booking context.

use appointments_core::aggregate::AggregateRoot;
use appointments_core::clock::Clock;
use appointments_core::error::DomainError;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::events::{
    AppointmentCreated, AppointmentEvent, AppointmentEventKind, AppointmentSnapshot,
    AppointmentStatusChanged,
};
use super::status::AppointmentStatus;

/// The aggregate root for an appointment.
#[derive(Debug)]
pub struct Appointment {
    /// Aggregate identifier.
    pub id: Uuid,
    pub(crate) customer_id: String,
    pub(crate) provider_id: Option<String>,
    pub(crate) start_time: DateTime<Utc>,
    pub(crate) end_time: DateTime<Utc>,
    pub(crate) status: AppointmentStatus,
    /// Version including uncommitted changes.
    pub(crate) version: i64,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) updated_at: DateTime<Utc>,
    /// Uncommitted events pending persistence.
    uncommitted_events: Vec<AppointmentEvent>,
}

impl Appointment {
    /// Requests a new appointment, producing an `AppointmentCreated` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the customer is blank, the
    /// provider is present but blank, or the interval is empty or inverted.
    pub fn request(
        id: Uuid,
        customer_id: &str,
        provider_id: Option<&str>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        let customer_id = customer_id.trim();
        if customer_id.is_empty() {
            return Err(DomainError::Validation(
                "customer_id must not be empty".into(),
            ));
        }
        let provider_id = match provider_id.map(str::trim) {
            Some("") => {
                return Err(DomainError::Validation(
                    "provider_id must not be empty when present".into(),
                ));
            }
            other => other.map(str::to_owned),
        };
        if start_time >= end_time {
            return Err(DomainError::Validation(
                "start_time must be before end_time".into(),
            ));
        }

        let now = clock.now();
        let mut appointment = Self {
            id,
            customer_id: customer_id.to_owned(),
            provider_id,
            start_time,
            end_time,
            status: AppointmentStatus::Requested,
            version: 1,
            created_at: now,
            updated_at: now,
            uncommitted_events: Vec::new(),
        };
        let kind = AppointmentEventKind::Created(AppointmentCreated {
            appointment: appointment.snapshot(),
        });
        appointment
            .uncommitted_events
            .push(AppointmentEvent::new(kind, correlation_id, now));
        Ok(appointment)
    }

    /// Rehydrates an aggregate from its committed state.
    #[must_use]
    pub fn from_snapshot(snapshot: AppointmentSnapshot) -> Self {
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
            uncommitted_events: Vec::new(),
        }
    }

    /// Returns the current state, including uncommitted changes.
    #[must_use]
    pub fn snapshot(&self) -> AppointmentSnapshot {
        AppointmentSnapshot {
            appointment_id: self.id,
            customer_id: self.customer_id.clone(),
            provider_id: self.provider_id.clone(),
            start_time: self.start_time,
            end_time: self.end_time,
            status: self.status,
            version: self.version,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Returns the current status.
    #[must_use]
    pub fn status(&self) -> AppointmentStatus {
        self.status
    }

    /// Version the write store must currently hold for this aggregate's
    /// pending changes to commit.
    #[allow(clippy::cast_possible_wrap)]
    #[must_use]
    pub fn expected_version(&self) -> i64 {
        self.version - self.uncommitted_events.len() as i64
    }

    /// Moves the appointment to `new_status`, producing an
    /// `AppointmentStatusChanged` event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the transition is not one of
    /// `REQUESTED → CONFIRMED`, `REQUESTED → CANCELLED` or
    /// `CONFIRMED → CANCELLED`.
    pub fn change_status(
        &mut self,
        new_status: AppointmentStatus,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let previous_status = self.status;
        if !previous_status.can_transition_to(new_status) {
            return Err(DomainError::Validation(format!(
                "invalid status transition from {previous_status} to {new_status}"
            )));
        }

        let now = clock.now();
        self.status = new_status;
        self.version += 1;
        self.updated_at = now;

        let kind = AppointmentEventKind::StatusChanged(AppointmentStatusChanged {
            appointment: self.snapshot(),
            previous_status,
            new_status,
        });
        self.uncommitted_events
            .push(AppointmentEvent::new(kind, correlation_id, now));
        Ok(())
    }
}

impl AggregateRoot for Appointment {
    type Event = AppointmentEvent;

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn take_uncommitted_events(&mut self) -> Vec<Self::Event> {
        std::mem::take(&mut self.uncommitted_events)
    }
}
