//! Domain layer for the booking context.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod repository;
pub mod status;
