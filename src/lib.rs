//! Forum database library.
//!
//! One shared connection pool plus a transactional executor: every
//! single-row read, multi-row read and command runs in its own transaction
//! that commits on success and rolls back on any error.

pub mod config;
pub mod db;
pub mod error;
pub mod models;

pub use config::{Config, DatabaseConfig, PoolOptions, SetupScripts};
pub use db::{Database, MemoryScripts, ScriptDir, ScriptSource};
pub use error::{DbError, DbResult};
pub use models::{Backend, CommandOutcome, PoolState, Query, Row, Value};
