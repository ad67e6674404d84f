//! Route modules.

pub mod appointments;
pub mod health;
