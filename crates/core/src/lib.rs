//! Core business logic for Janta Garage.
//!
//! The report lifecycle, deadline derivation, assignment, the overdue
//! sweep and notification delivery all live in [`services`].

pub mod services;

pub use services::*;
