//! Data models for the forum database layer.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::{Backend, PoolState};
pub use query::{CommandOutcome, Query, Row, Value};
