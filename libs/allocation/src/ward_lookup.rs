//! Ward lookup service.
//!
//! Answers "which staff are allocated to ward W" with a server-side
//! procedure rather than by filtering the client's listing, since the set of
//! eligible staff may depend on data outside the allocation table.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, instrument, warn};
use wardrota_model::{columns, WardNumber, WardStaff};
use wardrota_store::{Filter, MemoryStore, Row, StoreError, TableStore};

use crate::{AllocationError, AllocationResult};

/// Default lookup procedure name.
pub const DEFAULT_PROCEDURE: &str = "get_staff_allocated_to_ward";

/// Name of the procedure's ward parameter.
pub const WARD_PARAM: &str = "ward_id";

/// Server-side ward lookup.
#[derive(Clone)]
pub struct WardLookup {
    store: Arc<dyn TableStore>,
    procedure: String,
}

impl WardLookup {
    /// Create a lookup using the default procedure.
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self::with_procedure(store, DEFAULT_PROCEDURE)
    }

    /// Create a lookup using a named procedure.
    pub fn with_procedure(store: Arc<dyn TableStore>, procedure: &str) -> Self {
        Self {
            store,
            procedure: procedure.to_string(),
        }
    }

    /// Staff allocated to `ward_number`. Empty when the ward has none.
    #[instrument(skip(self), fields(procedure = %self.procedure, ward_number = %ward_number))]
    pub async fn staff_for_ward(&self, ward_number: &WardNumber) -> AllocationResult<Vec<WardStaff>> {
        let mut params = Row::new();
        params.insert(
            WARD_PARAM.to_string(),
            Value::String(ward_number.to_string()),
        );

        let rows = self.store.rpc(&self.procedure, params).await.map_err(|e| {
            warn!(error = %e, "Ward staff lookup failed");
            AllocationError::Lookup {
                ward_number: ward_number.clone(),
                source: e,
            }
        })?;

        let staff = rows
            .into_iter()
            .map(|row| {
                WardStaff::from_row(row).map_err(|e| {
                    warn!(error = %e, "Malformed ward lookup row");
                    AllocationError::Decode(e.to_string())
                })
            })
            .collect::<AllocationResult<Vec<_>>>()?;
        debug!(count = staff.len(), "Fetched ward staff");
        Ok(staff)
    }
}

/// Install the ward lookup procedure on an in-memory store.
///
/// Mirrors the SQL function shipped in `migrations/`: the rows of `table`
/// whose ward equals the `ward_id` parameter, ordered by staff number.
pub fn register_memory_procedure(store: &MemoryStore, table: &str, procedure: &str) {
    let table = table.to_string();
    store.register_procedure(procedure, move |tables, params| {
        let ward = params
            .get(WARD_PARAM)
            .filter(|value| !value.is_null())
            .ok_or_else(|| StoreError::InvalidRequest(format!("missing parameter {WARD_PARAM}")))?;
        let filter = Filter::eq(columns::WARD_NUMBER, ward.clone());

        let mut rows = tables
            .rows(&table)
            .iter()
            .filter(|row| filter.matches(row))
            .cloned()
            .collect::<Vec<_>>();
        rows.sort_by(|a, b| {
            let key = |row: &Row| {
                row.get(columns::STAFF_NUMBER)
                    .and_then(Value::as_str)
                    .map(str::to_string)
            };
            key(a).cmp(&key(b))
        });
        Ok(rows)
    });
}
