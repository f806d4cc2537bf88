//! Store error types.

use thiserror::Error;

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Remote store operation errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write collided with a unique constraint.
    #[error("unique constraint violated on {table}: {message}")]
    UniqueViolation {
        table: String,
        constraint: Option<String>,
        message: String,
    },

    /// The HTTP request could not be completed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The REST API answered with an error status.
    #[error("api error ({status} {code}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// Failed to connect to the database.
    #[error("failed to connect to database: {0}")]
    Connect(#[source] sqlx::Error),

    /// Failed to execute a query.
    #[error("query failed: {0}")]
    Database(#[source] sqlx::Error),

    /// Failed to run migrations.
    #[error("migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),

    /// Migration directory not found in the current environment.
    #[error("migration directory not found; tried {tried}. Last error: {last_error}")]
    MigrationDirNotFound { tried: String, last_error: String },

    /// A table, column or procedure name is not a plain SQL identifier.
    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    /// The procedure is not known to the store.
    #[error("unknown procedure: {0}")]
    UnknownProcedure(String),

    /// The request itself was malformed (for example an empty update).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The store answered with something other than rows.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store could not be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Returns true if this error reports a unique constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { .. })
    }
}
