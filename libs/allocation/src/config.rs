//! Allocation service configuration (env-driven).

use std::time::Duration;

use anyhow::{bail, Context, Result};
use wardrota_store::{DbConfig, RestConfig};

use crate::registry::DEFAULT_TABLE;
use crate::ward_lookup::DEFAULT_PROCEDURE;

/// Which store backend to connect to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Hosted PostgREST / Supabase API.
    Rest,
    /// Direct Postgres connection.
    Postgres,
    /// In-process tables (tests, demos).
    Memory,
}

impl std::str::FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "rest" | "supabase" => Ok(Backend::Rest),
            "postgres" | "pg" => Ok(Backend::Postgres),
            "memory" => Ok(Backend::Memory),
            other => bail!("unknown backend '{other}': expected rest, postgres or memory"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: Backend,

    /// REST API base URL (example: https://xyz.supabase.co).
    pub rest_url: String,

    /// REST API key. Required for the REST backend.
    pub api_key: Option<String>,

    /// Per-request timeout for the REST backend.
    pub http_timeout: Duration,

    pub database: DbConfig,

    /// Apply migrations on connect (postgres backend).
    pub run_migrations: bool,

    pub allocation_table: String,

    pub ward_lookup_procedure: String,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Rest,
            rest_url: "http://localhost:54321".to_string(),
            api_key: None,
            http_timeout: Duration::from_secs(30),
            database: DbConfig::default(),
            run_migrations: false,
            allocation_table: DEFAULT_TABLE.to_string(),
            ward_lookup_procedure: DEFAULT_PROCEDURE.to_string(),
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::from_vars(|key| std::env::var(key).ok())?;
        config.database = DbConfig::from_env();
        Ok(config)
    }

    /// Load configuration from a variable lookup. Database settings keep
    /// their defaults; `from_env` reads them through `DbConfig::from_env`.
    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let backend = var("WARDROTA_BACKEND")
            .map(|v| v.parse())
            .transpose()
            .context("WARDROTA_BACKEND is invalid.")?
            .unwrap_or(defaults.backend);

        let rest_url = var("WARDROTA_REST_URL").unwrap_or(defaults.rest_url);

        let api_key = var("WARDROTA_API_KEY").filter(|key| !key.trim().is_empty());

        let http_timeout_secs: u64 = var("WARDROTA_HTTP_TIMEOUT_SECS")
            .map(|v| v.parse())
            .transpose()
            .context("WARDROTA_HTTP_TIMEOUT_SECS must be an integer (seconds).")?
            .unwrap_or(30);
        let http_timeout = Duration::from_secs(http_timeout_secs.max(1));

        let run_migrations = var("WARDROTA_RUN_MIGRATIONS")
            .map(|v| v == "1" || v.to_lowercase() == "true")
            .unwrap_or(false);

        let allocation_table =
            var("WARDROTA_ALLOCATION_TABLE").unwrap_or(defaults.allocation_table);

        let ward_lookup_procedure =
            var("WARDROTA_WARD_LOOKUP_PROCEDURE").unwrap_or(defaults.ward_lookup_procedure);

        let log_level = var("WARDROTA_LOG_LEVEL").unwrap_or(defaults.log_level);

        Ok(Self {
            backend,
            rest_url,
            api_key,
            http_timeout,
            database: defaults.database,
            run_migrations,
            allocation_table,
            ward_lookup_procedure,
            log_level,
        })
    }

    /// REST backend settings. Fails if no API key is configured.
    pub fn rest_config(&self) -> Result<RestConfig> {
        let api_key = self
            .api_key
            .clone()
            .context("Missing API key. Set WARDROTA_API_KEY for the rest backend.")?;
        Ok(RestConfig::new(&self.rest_url, api_key).with_timeout(self.http_timeout))
    }
}
