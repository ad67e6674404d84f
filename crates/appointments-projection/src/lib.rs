//! Read-model projection for appointments.
//!
//! Consumes appointment events from the broker and maintains a denormalized,
//! version-guarded copy of each appointment in a read store.

pub mod error;
pub mod memory;
pub mod projection;
pub mod redis_store;
pub mod retry;
pub mod store;
pub mod worker;
