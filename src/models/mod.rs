//! Defines the data structures and models used throughout the application.
//!
//! - `domain`: the canonical shapes the service, orchestrator and store work with.
//! - `gios`: wire-format DTOs for the upstream GIOS API with its alias tables.
//! - `record`: the sqlx row shape for persisted measurements.

mod domain;
mod gios;
mod record;

pub use domain::*;
pub use gios::*;
pub use record::*;
