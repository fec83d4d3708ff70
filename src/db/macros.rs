//! Backend dispatch macro.
//!
//! Generates the match over `DbPool` variants so each operation names its
//! per-backend call once per line.

/// Macro for generating backend dispatch match arms.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(&pool, {
///     Postgres(p) => postgres::query_one(p, query).await,
///     SQLite(p) => sqlite::query_one(p, query).await,
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($pool:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $pool {
            $(
                $crate::db::pool::DbPool::$variant($p) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;
