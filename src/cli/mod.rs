//! Handles Command Line Interface (CLI) related functionalities.
//!
//! Defines the command set, argument parsing, and the application state
//! that wires configuration, the provider and the database together.

mod commands;

pub use commands::*;
