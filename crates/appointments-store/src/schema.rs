//! Write-store database schema.

/// SQL that creates the appointments table, as applied by the first
/// migration.
pub const CREATE_APPOINTMENTS_TABLE: &str =
    include_str!("../../../migrations/0001_create_appointments.sql");

/// Status values the `status` column accepts.
pub const STATUS_VALUES: [&str; 3] = ["REQUESTED", "CONFIRMED", "CANCELLED"];
