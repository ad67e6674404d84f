//! Appointments — booking bounded context.
//!
//! Owns the authoritative appointment record: validation, the status state
//! machine, the write-store port and the command service that commits a write
//! and then publishes the matching event.

pub mod application;
pub mod domain;
