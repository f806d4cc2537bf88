//! Direct Postgres backend.
//!
//! Rows travel as `jsonb`: reads use `to_jsonb(t)`, writes go through
//! `jsonb_populate_record(NULL::table, $1)` so column types come from the
//! table definition rather than from the caller. Table, column and procedure
//! names are validated identifiers; values are always bound parameters.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions};
use sqlx::query::QueryScalar;
use sqlx::Postgres;
use tracing::{debug, info};

use crate::{validate_identifier, Filter, Row, StoreError, StoreResult, TableStore};

/// Database configuration.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL.
    pub database_url: String,

    /// Maximum number of connections in the pool.
    pub max_connections: u32,

    /// Minimum number of idle connections.
    pub min_connections: u32,

    /// Connection acquire timeout.
    pub acquire_timeout: Duration,

    /// Idle connection timeout.
    pub idle_timeout: Duration,

    /// Maximum lifetime of a connection.
    pub max_lifetime: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            database_url: "postgres://localhost/wardrota".to_string(),
            max_connections: 10,
            min_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

impl DbConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/wardrota".to_string());

        let max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        let min_connections = std::env::var("DB_MIN_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1);

        Self {
            database_url,
            max_connections,
            min_connections,
            ..Default::default()
        }
    }
}

type JsonQuery<'q> = QueryScalar<'q, Postgres, Value, PgArguments>;

/// `TableStore` over a Postgres connection pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Create a new database connection pool.
    pub async fn connect(config: &DbConfig) -> StoreResult<Self> {
        info!(
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "Connecting to database"
        );

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(config.acquire_timeout)
            .idle_timeout(Some(config.idle_timeout))
            .max_lifetime(Some(config.max_lifetime))
            .connect(&config.database_url)
            .await
            .map_err(StoreError::Connect)?;

        info!("Database connection pool established");

        Ok(Self { pool })
    }

    /// Check that the server answers queries.
    pub async fn ping(&self) -> StoreResult<()> {
        let one: i32 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::Connect)?;
        debug!(result = one, "postgres ping");
        Ok(())
    }

    /// Run pending migrations from the first candidate directory that loads.
    pub async fn run_migrations(&self, candidates: &[PathBuf]) -> StoreResult<()> {
        info!("Running database migrations");

        let mut last_error: Option<sqlx::migrate::MigrateError> = None;

        for dir in candidates {
            match sqlx::migrate::Migrator::new(dir.clone()).await {
                Ok(migrator) => {
                    info!(migrations_dir = %dir.display(), "Loaded migrations");
                    migrator
                        .run(&self.pool)
                        .await
                        .map_err(StoreError::Migration)?;
                    info!("Database migrations complete");
                    return Ok(());
                }
                Err(e) => {
                    last_error = Some(e);
                }
            }
        }

        let tried = candidates
            .iter()
            .map(|dir| dir.display().to_string())
            .collect::<Vec<_>>()
            .join(", ");

        Err(StoreError::MigrationDirNotFound {
            tried,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "unknown error".to_string()),
        })
    }

    async fn fetch_rows(&self, table: &str, query: JsonQuery<'_>) -> StoreResult<Vec<Row>> {
        let values = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_query_error(table, e))?;
        values.into_iter().map(into_row).collect()
    }
}

#[async_trait]
impl TableStore for PgStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn select(&self, table: &str, filter: Option<&Filter>) -> StoreResult<Vec<Row>> {
        let table = validate_identifier(table)?;
        let sql = match filter {
            Some(filter) => format!(
                "SELECT to_jsonb(t) FROM {table} AS t WHERE {}",
                where_clause(filter, 1)?
            ),
            None => format!("SELECT to_jsonb(t) FROM {table} AS t"),
        };
        debug!(sql = %sql, "postgres select");

        let mut query = sqlx::query_scalar::<_, Value>(&sql);
        if let Some(text) = filter.and_then(Filter::value_text) {
            query = query.bind(text);
        }
        self.fetch_rows(table, query).await
    }

    async fn insert(&self, table: &str, row: Row) -> StoreResult<Row> {
        let table = validate_identifier(table)?;
        let sql = if row.is_empty() {
            format!("INSERT INTO {table} AS t DEFAULT VALUES RETURNING to_jsonb(t)")
        } else {
            let columns = column_list(&row)?;
            format!(
                "INSERT INTO {table} AS t ({columns}) \
                 SELECT {columns} FROM jsonb_populate_record(NULL::{table}, $1) \
                 RETURNING to_jsonb(t)"
            )
        };
        debug!(sql = %sql, "postgres insert");

        let mut query = sqlx::query_scalar::<_, Value>(&sql);
        if !row.is_empty() {
            query = query.bind(Value::Object(row));
        }
        self.fetch_rows(table, query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::UnexpectedResponse("insert returned no rows".to_string()))
    }

    async fn update(&self, table: &str, changes: Row, filter: &Filter) -> StoreResult<Vec<Row>> {
        let table = validate_identifier(table)?;
        if changes.is_empty() {
            return Err(StoreError::InvalidRequest("update without changes".to_string()));
        }
        let assignments = changes
            .keys()
            .map(|column| validate_identifier(column).map(|c| format!("{c} = r.{c}")))
            .collect::<StoreResult<Vec<_>>>()?
            .join(", ");
        let sql = format!(
            "UPDATE {table} AS t SET {assignments} \
             FROM jsonb_populate_record(NULL::{table}, $1) AS r \
             WHERE {} RETURNING to_jsonb(t)",
            where_clause(filter, 2)?
        );
        debug!(sql = %sql, "postgres update");

        let mut query = sqlx::query_scalar::<_, Value>(&sql).bind(Value::Object(changes));
        if let Some(text) = filter.value_text() {
            query = query.bind(text);
        }
        self.fetch_rows(table, query).await
    }

    async fn rpc(&self, procedure: &str, params: Row) -> StoreResult<Vec<Row>> {
        let procedure = validate_identifier(procedure)?;
        let arguments = params
            .keys()
            .enumerate()
            .map(|(index, name)| {
                validate_identifier(name).map(|name| format!("{name} => ${}", index + 1))
            })
            .collect::<StoreResult<Vec<_>>>()?
            .join(", ");
        let sql = format!("SELECT to_jsonb(r) FROM {procedure}({arguments}) AS r");
        debug!(sql = %sql, "postgres rpc");

        let mut query = sqlx::query_scalar::<_, Value>(&sql);
        for value in params.into_iter().map(|(_, value)| value) {
            query = bind_value(query, value);
        }
        self.fetch_rows(procedure, query).await
    }
}

/// `t.{column}::text = $n`, or `IS NULL` for a null filter value.
fn where_clause(filter: &Filter, placeholder: usize) -> StoreResult<String> {
    let column = validate_identifier(&filter.column)?;
    Ok(match filter.value_text() {
        Some(_) => format!("t.{column}::text = ${placeholder}"),
        None => format!("t.{column} IS NULL"),
    })
}

fn column_list(row: &Row) -> StoreResult<String> {
    Ok(row
        .keys()
        .map(|column| validate_identifier(column))
        .collect::<StoreResult<Vec<_>>>()?
        .join(", "))
}

/// Bind a JSON value with its natural Postgres type.
fn bind_value(query: JsonQuery<'_>, value: Value) -> JsonQuery<'_> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s),
        other => query.bind(other),
    }
}

fn into_row(value: Value) -> StoreResult<Row> {
    match value {
        Value::Object(row) => Ok(row),
        other => Err(StoreError::UnexpectedResponse(format!(
            "expected row object, got {other}"
        ))),
    }
}

fn map_query_error(table: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            return StoreError::UniqueViolation {
                table: table.to_string(),
                constraint: db.constraint().map(str::to_string),
                message: db.message().to_string(),
            };
        }
    }
    StoreError::Database(err)
}
