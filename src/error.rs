//! Error types for the forum database layer.
//!
//! Every failure is surfaced to the immediate caller as a `DbError` value.
//! Nothing here retries or terminates the process.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database already initialized")]
    AlreadyInitialized,

    #[error("Database wasn't initialized")]
    NotInitialized,

    #[error("Connection failed: {message}")]
    Connection { message: String, suggestion: String },

    #[error("Database reset failed: {source}")]
    Reset {
        #[source]
        source: Box<DbError>,
    },

    #[error("Database initialization failed: {source}")]
    Initialization {
        #[source]
        source: Box<DbError>,
    },

    #[error("Failed to read script '{resource}': {source}")]
    ResourceRead {
        resource: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Execution failed: {message}")]
    Execution {
        message: String,
        /// e.g., "23505" for a unique violation
        sql_state: Option<String>,
    },

    #[error("Commit failed: {message}")]
    Commit {
        message: String,
        sql_state: Option<String>,
    },

    #[error("Query returned no rows")]
    NoRows,

    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl DbError {
    /// Create a connection error with a helpful suggestion.
    pub fn connection(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
        }
    }

    /// Wrap a failure of the reset script.
    pub fn reset(source: DbError) -> Self {
        Self::Reset {
            source: Box::new(source),
        }
    }

    /// Wrap a failure of the init script.
    pub fn initialization(source: DbError) -> Self {
        Self::Initialization {
            source: Box::new(source),
        }
    }

    pub fn resource_read(resource: impl Into<String>, source: std::io::Error) -> Self {
        Self::ResourceRead {
            resource: resource.into(),
            source,
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Classify a failed `COMMIT`.
    ///
    /// The query itself already succeeded, so the driver error is reported as
    /// a commit failure regardless of its kind.
    pub fn commit(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => Self::Commit {
                message: db_err.message().to_string(),
                sql_state: db_err.code().map(|c| c.to_string()),
            },
            other => Self::Commit {
                message: other.to_string(),
                sql_state: None,
            },
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Connection { suggestion, .. } => Some(suggestion),
            Self::AlreadyInitialized => Some("Close the database before opening it again"),
            Self::NotInitialized => Some("Open the database before running queries"),
            _ => None,
        }
    }

    /// SQLSTATE reported by the datastore, if any.
    pub fn sql_state(&self) -> Option<&str> {
        match self {
            Self::Execution { sql_state, .. } | Self::Commit { sql_state, .. } => {
                sql_state.as_deref()
            }
            Self::Reset { source } | Self::Initialization { source } => source.sql_state(),
            _ => None,
        }
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(
                msg.to_string(),
                "Check the connection string format and credentials",
            ),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::execution(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => DbError::NoRows,
            sqlx::Error::PoolTimedOut => DbError::connection(
                "Timed out waiting for a pooled connection",
                "Increase max_connections or acquire_timeout",
            ),
            sqlx::Error::PoolClosed => {
                DbError::connection("Connection pool is closed", "Reopen the database")
            }
            sqlx::Error::Io(io_err) => DbError::connection(
                format!("I/O error: {}", io_err),
                "Check network connectivity and database server status",
            ),
            sqlx::Error::Tls(tls_err) => DbError::connection(
                format!("TLS error: {}", tls_err),
                "Verify TLS configuration and certificates",
            ),
            sqlx::Error::Protocol(msg) => DbError::connection(
                format!("Protocol error: {}", msg),
                "Check database server compatibility",
            ),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::execution(format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::execution(format!("Failed to decode column {}: {}", index, source), None)
            }
            sqlx::Error::Decode(source) => {
                DbError::execution(format!("Decode error: {}", source), None)
            }
            sqlx::Error::WorkerCrashed => DbError::connection(
                "Database worker crashed",
                "Reopen the database",
            ),
            other => DbError::execution(other.to_string(), None),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;
