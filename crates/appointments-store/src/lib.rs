//! Write-store adapters for the booking context.

pub mod memory;
pub mod pg_appointment_repository;
pub mod schema;
