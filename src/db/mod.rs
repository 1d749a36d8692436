//! Provides the historical store: the repository port, the PostgreSQL
//! implementation, and the pure aggregation engine they share.

pub mod aggregate;
mod postgres;
mod repository;

pub use postgres::*;
pub use repository::*;
