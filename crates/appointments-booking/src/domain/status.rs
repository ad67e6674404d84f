//! Appointment status state machine.

use std::fmt;
use std::str::FromStr;

use appointments_core::error::DomainError;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an appointment.
///
/// `Requested` → `Confirmed` → `Cancelled`, or `Requested` → `Cancelled`.
/// `Cancelled` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AppointmentStatus {
    /// Initial state after creation.
    Requested,
    /// Accepted by the provider.
    Confirmed,
    /// Terminal.
    Cancelled,
}

impl AppointmentStatus {
    /// All states, in lifecycle order.
    pub const ALL: [Self; 3] = [Self::Requested, Self::Confirmed, Self::Cancelled];

    /// Wire and storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Requested => "REQUESTED",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Returns `true` if moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::Confirmed | Self::Cancelled)
                | (Self::Confirmed, Self::Cancelled)
        )
    }

    /// Returns `true` if no transition leaves this state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REQUESTED" => Ok(Self::Requested),
            "CONFIRMED" => Ok(Self::Confirmed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(DomainError::Validation(format!(
                "unknown appointment status: {other}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_three_transitions_are_legal() {
        let legal: Vec<(AppointmentStatus, AppointmentStatus)> = AppointmentStatus::ALL
            .iter()
            .flat_map(|from| AppointmentStatus::ALL.iter().map(move |to| (*from, *to)))
            .filter(|(from, to)| from.can_transition_to(*to))
            .collect();

        assert_eq!(
            legal,
            vec![
                (AppointmentStatus::Requested, AppointmentStatus::Confirmed),
                (AppointmentStatus::Requested, AppointmentStatus::Cancelled),
                (AppointmentStatus::Confirmed, AppointmentStatus::Cancelled),
            ]
        );
    }

    #[test]
    fn test_cancelled_is_the_only_terminal_state() {
        assert!(AppointmentStatus::Cancelled.is_terminal());
        assert!(!AppointmentStatus::Requested.is_terminal());
        assert!(!AppointmentStatus::Confirmed.is_terminal());
    }

    #[test]
    fn test_parse_matches_wire_form() {
        for status in AppointmentStatus::ALL {
            assert_eq!(status.as_str().parse::<AppointmentStatus>().unwrap(), status);
            assert_eq!(
                serde_json::to_value(status).unwrap(),
                serde_json::json!(status.as_str())
            );
        }
        assert!("BOOKED".parse::<AppointmentStatus>().is_err());
    }
}
