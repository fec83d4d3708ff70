//! forum-db - Main entry point.
//!
//! Opens the forum database, runs the setup scripts (resetting first when
//! asked), verifies the pool answers a query and closes it again.

use clap::Parser;
use forum_db::config::Config;
use forum_db::db::{Database, ScriptDir};
use forum_db::models::Query;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber.with(fmt::layer().json()).init();
    } else {
        subscriber
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    init_tracing(&config);

    let db_config = config.database_config()?;
    info!(
        backend = %db_config.backend,
        connection = %db_config.masked_connection_string(),
        scripts_dir = %config.scripts_dir.display(),
        reset = config.reset,
        "Starting forum-db v{}",
        env!("CARGO_PKG_VERSION")
    );

    let database = Database::new(db_config, ScriptDir::new(&config.scripts_dir));

    if let Err(e) = database.open(config.reset).await {
        error!(error = %e, suggestion = ?e.suggestion(), "Failed to open database");
        // Setup script failures leave the pool open.
        if database.is_open().await {
            database.close().await?;
        }
        return Err(e.into());
    }

    let probe = database.query_one(&Query::new("SELECT 1 AS ok")).await;
    let state = database.state().await;
    match &probe {
        Ok(row) => info!(
            state = %state,
            probe = ?row.get("ok"),
            "Database is ready"
        ),
        Err(e) => error!(error = %e, "Probe query failed"),
    }

    database.close().await?;
    probe?;

    info!("Shutdown complete");
    Ok(())
}
