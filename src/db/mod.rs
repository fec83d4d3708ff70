//! Database access layer.
//!
//! This module provides:
//! - The shared connection pool and its open/close lifecycle
//! - Per-call transactional query execution
//! - Setup script loading
//! - Parameter binding and row materialization
//! - Backend dispatch macro for reducing code duplication

pub mod executor;
#[macro_use]
pub mod macros;
pub mod params;
pub mod pool;
pub mod scripts;
pub mod types;

pub use pool::{Database, DbPool};
pub use scripts::{MemoryScripts, ScriptDir, ScriptSource};
pub use types::{MaterializeRow, TypeCategory};
