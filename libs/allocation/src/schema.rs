//! Postgres schema for the allocation table.
//!
//! The migration creates `staff_allocation` with a unique constraint on
//! `staffnumber` and the `get_staff_allocated_to_ward(ward_id)` function.

use std::path::PathBuf;

use wardrota_store::{PgStore, StoreResult};

/// Directories searched for migrations, in order.
pub fn migration_dirs() -> Vec<PathBuf> {
    vec![
        PathBuf::from("./migrations"),
        PathBuf::from("libs/allocation/migrations"),
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("migrations"),
    ]
}

/// Apply the allocation schema.
pub async fn run_migrations(store: &PgStore) -> StoreResult<()> {
    store.run_migrations(&migration_dirs()).await
}
