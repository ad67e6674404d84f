//! Commands for the booking context.

use appointments_core::command::Command;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::status::AppointmentStatus;

/// Command to request a new appointment.
#[derive(Debug, Clone)]
pub struct CreateAppointment {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The customer requesting the appointment.
    pub customer_id: String,
    /// The provider, if the client chose one.
    pub provider_id: Option<String>,
    /// Requested start; required.
    pub start_time: Option<DateTime<Utc>>,
    /// Requested end; required.
    pub end_time: Option<DateTime<Utc>>,
}

impl Command for CreateAppointment {
    fn command_type(&self) -> &'static str {
        "booking.create_appointment"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to move an appointment to a new status.
#[derive(Debug, Clone)]
pub struct ChangeAppointmentStatus {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The appointment to change.
    pub appointment_id: Uuid,
    /// The requested status.
    pub new_status: AppointmentStatus,
}

impl Command for ChangeAppointmentStatus {
    fn command_type(&self) -> &'static str {
        "booking.change_appointment_status"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
