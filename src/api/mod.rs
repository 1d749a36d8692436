//! Provides clients and utilities for interacting with the external
//! monitoring network.
//!
//! Includes:
//! - `provider`: the port the rest of the application consumes.
//! - `gios`: the normalizing client for the real GIOS API.
//! - `mock`: an offline provider with randomized plausible data.

mod gios;
mod mock;
mod provider;


pub use gios::*;
pub use mock::*;
pub use provider::*;
