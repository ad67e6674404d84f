//! Command handlers for the booking context.
//!
//! Each handler validates, commits one atomic write to the write store, and
//! only then attempts to publish the resulting events. Publication is
//! best-effort: once the write has committed, a missing or failing publisher
//! yields a degraded [`PublishOutcome`], never an error.

use appointments_core::aggregate::AggregateRoot;
use appointments_core::clock::Clock;
use appointments_core::command::Command;
use appointments_core::error::DomainError;
use appointments_core::event::EventEnvelope;
use appointments_core::publisher::{DegradedReason, PublishOutcome, Publisher};
use tracing::{info, warn};
use uuid::Uuid;

use crate::domain::aggregates::Appointment;
use crate::domain::commands::{ChangeAppointmentStatus, CreateAppointment};
use crate::domain::events::{AppointmentEvent, AppointmentSnapshot};
use crate::domain::repository::AppointmentRepository;

/// Result of a successfully committed command.
#[derive(Debug, Clone)]
pub struct CommandOutcome {
    /// The appointment as committed to the write store.
    pub appointment: AppointmentSnapshot,
    /// Whether the resulting events reached the broker.
    pub publication: PublishOutcome,
}

/// Handles the `CreateAppointment` command: validates the input, inserts the
/// appointment with status `REQUESTED`, and publishes `AppointmentCreated`.
///
/// # Errors
///
/// Returns `DomainError::Validation` for missing or invalid fields and
/// `DomainError::Infrastructure` if the write store fails. Publication
/// failures are reported through `CommandOutcome::publication`.
pub async fn handle_create_appointment(
    command: &CreateAppointment,
    clock: &dyn Clock,
    repo: &dyn AppointmentRepository,
    publisher: &Publisher,
) -> Result<CommandOutcome, DomainError> {
    let start_time = command
        .start_time
        .ok_or_else(|| DomainError::Validation("start_time is required".into()))?;
    let end_time = command
        .end_time
        .ok_or_else(|| DomainError::Validation("end_time is required".into()))?;

    let mut appointment = Appointment::request(
        Uuid::now_v7(),
        &command.customer_id,
        command.provider_id.as_deref(),
        start_time,
        end_time,
        command.correlation_id,
        clock,
    )?;

    commit_and_publish(command, &mut appointment, repo, publisher).await
}

/// Handles the `ChangeAppointmentStatus` command: loads the appointment,
/// applies the transition, persists it with a version check, and publishes
/// `AppointmentStatusChanged`.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if the appointment does not exist,
/// `DomainError::Validation` for an illegal transition,
/// `DomainError::ConcurrencyConflict` if another write committed first, and
/// `DomainError::Infrastructure` if the write store fails.
pub async fn handle_change_status(
    command: &ChangeAppointmentStatus,
    clock: &dyn Clock,
    repo: &dyn AppointmentRepository,
    publisher: &Publisher,
) -> Result<CommandOutcome, DomainError> {
    let snapshot = repo
        .find_by_id(command.appointment_id)
        .await?
        .ok_or(DomainError::NotFound(command.appointment_id))?;

    let mut appointment = Appointment::from_snapshot(snapshot);
    appointment.change_status(command.new_status, command.correlation_id, clock)?;

    commit_and_publish(command, &mut appointment, repo, publisher).await
}

async fn commit_and_publish(
    command: &dyn Command,
    appointment: &mut Appointment,
    repo: &dyn AppointmentRepository,
    publisher: &Publisher,
) -> Result<CommandOutcome, DomainError> {
    let snapshot = appointment.snapshot();
    repo.save(&snapshot, appointment.expected_version()).await?;

    info!(
        command_type = command.command_type(),
        correlation_id = %command.correlation_id(),
        appointment_id = %appointment.aggregate_id(),
        version = snapshot.version,
        status = %snapshot.status,
        "appointment committed"
    );

    let events = appointment.take_uncommitted_events();
    let publication = publish_events(&events, publisher).await;
    if let PublishOutcome::Degraded(reason) = &publication {
        warn!(
            correlation_id = %command.correlation_id(),
            appointment_id = %appointment.aggregate_id(),
            version = snapshot.version,
            %reason,
            "event publication degraded; read model is stale until the event is republished"
        );
    }

    Ok(CommandOutcome {
        appointment: snapshot,
        publication,
    })
}

/// Publishes events in order. Returns the last degraded outcome if any event
/// failed, otherwise `Published`. Every event is attempted.
pub async fn publish_events(events: &[AppointmentEvent], publisher: &Publisher) -> PublishOutcome {
    let mut outcome = PublishOutcome::Published;
    for event in events {
        let result = match EventEnvelope::from_event(event) {
            Ok(envelope) => publisher.publish(&envelope).await,
            Err(e) => PublishOutcome::Degraded(DegradedReason::Encoding(e.to_string())),
        };
        if result.is_degraded() {
            outcome = result;
        }
    }
    outcome
}
