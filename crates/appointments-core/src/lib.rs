//! Appointments Core — shared domain abstractions.
//!
//! This crate defines the traits and types that the write side, the broker
//! adapters and the projection worker all agree on. It contains no
//! infrastructure code.

pub mod aggregate;
pub mod broker;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod publisher;
