//! Transactional query execution.
//!
//! Every `query_one`, `query_many` and `execute` call runs in its own
//! transaction:
//!
//! 1. begin on the shared pool (`NotInitialized` if there is none)
//! 2. run the query and copy its result into owned values; a column that
//!    cannot be decoded counts as a failed query
//! 3. commit on success; on failure roll back and return the query error
//!
//! The `sqlx::Transaction` guard rolls back on drop, so a call that is
//! cancelled or panics mid-flight never leaves its work committed. A commit
//! disarms the guard, making the pending rollback a no-op.
//!
//! `run_raw_script` is the exception: setup scripts run directly on the pool.

use crate::db::pool::Database;
use crate::db::scripts::ScriptSource;
use crate::db::types::{materialize, materialize_all};
use crate::error::{DbError, DbResult};
use crate::impl_db_dispatch;
use crate::models::{CommandOutcome, Query, Row};
use sqlx::Transaction;
use tracing::{debug, warn};

impl<S> Database<S> {
    /// Run a query expected to return exactly one row.
    ///
    /// Returns `NoRows` when the result is empty; rows past the first are
    /// ignored.
    pub async fn query_one(&self, query: &Query) -> DbResult<Row> {
        let pool = self.pool().await?;
        debug!(
            sql = %query.sql,
            params = query.params.len(),
            "Executing single-row query"
        );

        impl_db_dispatch!(&pool, {
            Postgres(p) => postgres::query_one(p, query).await,
            SQLite(p) => sqlite::query_one(p, query).await,
        })
    }

    /// Run a query returning zero or more rows.
    pub async fn query_many(&self, query: &Query) -> DbResult<Vec<Row>> {
        let pool = self.pool().await?;
        debug!(
            sql = %query.sql,
            params = query.params.len(),
            "Executing query"
        );

        let rows = impl_db_dispatch!(&pool, {
            Postgres(p) => postgres::query_many(p, query).await,
            SQLite(p) => sqlite::query_many(p, query).await,
        })?;
        debug!(rows = rows.len(), "Query returned rows");
        Ok(rows)
    }

    /// Run a command that returns no rows (INSERT, UPDATE, DELETE, DDL).
    pub async fn execute(&self, query: &Query) -> DbResult<CommandOutcome> {
        let pool = self.pool().await?;
        debug!(
            sql = %query.sql,
            params = query.params.len(),
            "Executing command"
        );

        let outcome = impl_db_dispatch!(&pool, {
            Postgres(p) => postgres::execute(p, query).await,
            SQLite(p) => sqlite::execute(p, query).await,
        })?;
        debug!(rows_affected = outcome.rows_affected, "Command executed");
        Ok(outcome)
    }
}

impl<S: ScriptSource> Database<S> {
    /// Load a named setup script and execute it as-is on the pool.
    ///
    /// The script may hold several statements. It is not wrapped in a
    /// transaction, so statements before a failing one stay applied.
    pub async fn run_raw_script(&self, name: &str) -> DbResult<()> {
        let pool = self.pool().await?;
        let script = self
            .scripts()
            .load(name)
            .await
            .map_err(|e| DbError::resource_read(name, e))?;

        debug!(script = %name, bytes = script.len(), "Executing setup script");

        let result = impl_db_dispatch!(&pool, {
            Postgres(p) => sqlx::raw_sql(&script).execute(p).await.map(|_| ()),
            SQLite(p) => sqlx::raw_sql(&script).execute(p).await.map(|_| ()),
        });
        result.map_err(DbError::from)
    }
}

/// Commit or roll back according to the query outcome.
///
/// A commit failure replaces an otherwise successful result.
async fn finish<DB, T>(
    tx: Transaction<'static, DB>,
    outcome: Result<T, sqlx::Error>,
) -> DbResult<T>
where
    DB: sqlx::Database,
{
    match outcome {
        Ok(value) => match tx.commit().await {
            Ok(()) => Ok(value),
            Err(e) => {
                warn!(error = %e, "Transaction commit failed");
                Err(DbError::commit(e))
            }
        },
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Transaction rollback failed");
            }
            Err(DbError::from(err))
        }
    }
}

fn is_insert(sql: &str) -> bool {
    sql.trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("insert"))
}

// =============================================================================
// Backend-Specific Implementations
// =============================================================================
//
// Each module below provides the same interface adapted to its backend.
// The code structure is intentionally parallel to make differences obvious.

mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_value;
    use sqlx::postgres::PgArguments;
    use sqlx::{PgPool, Postgres};

    fn build(query: &Query) -> sqlx::query::Query<'_, Postgres, PgArguments> {
        query
            .params
            .iter()
            .fold(sqlx::query(&query.sql), |q, param| bind_postgres_value(q, param))
    }

    pub async fn query_one(pool: &PgPool, query: &Query) -> DbResult<Row> {
        let mut tx = pool.begin().await?;
        let outcome = build(query)
            .fetch_one(&mut *tx)
            .await
            .and_then(|row| materialize(&row));
        finish(tx, outcome).await
    }

    pub async fn query_many(pool: &PgPool, query: &Query) -> DbResult<Vec<Row>> {
        let mut tx = pool.begin().await?;
        let outcome = build(query)
            .fetch_all(&mut *tx)
            .await
            .and_then(|rows| materialize_all(&rows));
        finish(tx, outcome).await
    }

    pub async fn execute(pool: &PgPool, query: &Query) -> DbResult<CommandOutcome> {
        let mut tx = pool.begin().await?;
        let outcome = build(query)
            .execute(&mut *tx)
            .await
            .map(|r| CommandOutcome {
                rows_affected: r.rows_affected(),
                last_insert_id: None,
            });
        finish(tx, outcome).await
    }
}

mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_value;
    use sqlx::sqlite::SqliteArguments;
    use sqlx::{Sqlite, SqlitePool};

    fn build(query: &Query) -> sqlx::query::Query<'_, Sqlite, SqliteArguments<'_>> {
        query
            .params
            .iter()
            .fold(sqlx::query(&query.sql), |q, param| bind_sqlite_value(q, param))
    }

    pub async fn query_one(pool: &SqlitePool, query: &Query) -> DbResult<Row> {
        let mut tx = pool.begin().await?;
        let outcome = build(query)
            .fetch_one(&mut *tx)
            .await
            .and_then(|row| materialize(&row));
        finish(tx, outcome).await
    }

    pub async fn query_many(pool: &SqlitePool, query: &Query) -> DbResult<Vec<Row>> {
        let mut tx = pool.begin().await?;
        let outcome = build(query)
            .fetch_all(&mut *tx)
            .await
            .and_then(|rows| materialize_all(&rows));
        finish(tx, outcome).await
    }

    pub async fn execute(pool: &SqlitePool, query: &Query) -> DbResult<CommandOutcome> {
        let mut tx = pool.begin().await?;
        let outcome = build(query)
            .execute(&mut *tx)
            .await
            .map(|r| CommandOutcome {
                rows_affected: r.rows_affected(),
                last_insert_id: (is_insert(&query.sql) && r.rows_affected() > 0)
                    .then_some(r.last_insert_rowid()),
            });
        finish(tx, outcome).await
    }
}
