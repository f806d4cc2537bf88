//! Store construction from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use wardrota_model::columns;
use wardrota_store::{MemoryStore, PgStore, RestStore, TableStore};

use crate::{schema, ward_lookup, Backend, Config};

/// Connect to the configured store backend.
pub async fn connect(config: &Config) -> Result<Arc<dyn TableStore>> {
    info!(backend = ?config.backend, table = %config.allocation_table, "Connecting allocation store");

    let store: Arc<dyn TableStore> = match config.backend {
        Backend::Rest => {
            let store = RestStore::new(&config.rest_config()?)
                .context("Failed to create REST store client")?;
            Arc::new(store)
        }
        Backend::Postgres => {
            let store = PgStore::connect(&config.database)
                .await
                .context("Failed to connect to database")?;
            store.ping().await.context("Database is not answering queries")?;
            if config.run_migrations {
                schema::run_migrations(&store)
                    .await
                    .context("Failed to run migrations")?;
            }
            Arc::new(store)
        }
        Backend::Memory => Arc::new(memory_store(config)),
    };

    Ok(store)
}

/// An in-memory store with the allocation table's unique key and the ward
/// lookup procedure installed.
pub fn memory_store(config: &Config) -> MemoryStore {
    let store = MemoryStore::new().with_unique(&config.allocation_table, columns::STAFF_NUMBER);
    ward_lookup::register_memory_procedure(
        &store,
        &config.allocation_table,
        &config.ward_lookup_procedure,
    );
    store
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_memory_backend() {
        let config = Config {
            backend: Backend::Memory,
            ..Config::default()
        };
        let store = connect(&config).await.unwrap();
        assert_eq!(store.backend(), "memory");
    }

    #[tokio::test]
    async fn test_connect_rest_requires_key() {
        let config = Config::default();
        assert!(connect(&config).await.is_err());

        let config = Config {
            api_key: Some("anon".to_string()),
            ..Config::default()
        };
        let store = connect(&config).await.unwrap();
        assert_eq!(store.backend(), "rest");
    }
}
