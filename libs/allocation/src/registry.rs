//! Allocation registry.
//!
//! Owns create / update / list on the allocation table. The registry holds
//! no record state of its own; `AllocationView` caches what it returns.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};
use wardrota_model::{
    columns, AllocationChanges, AllocationDraft, AllocationRecord, StaffNumber, WardNumber,
    WardStaff,
};
use wardrota_store::{Filter, Row, StoreError, TableStore};

use crate::ward_lookup::WardLookup;
use crate::{AllocationError, AllocationResult, Config};

/// Default allocation table name.
pub const DEFAULT_TABLE: &str = "staff_allocation";

/// Registry of staff allocations over a `TableStore`.
#[derive(Clone)]
pub struct AllocationRegistry {
    store: Arc<dyn TableStore>,
    table: String,
    lookup: WardLookup,
}

impl AllocationRegistry {
    /// Create a registry over the default table and lookup procedure.
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        let lookup = WardLookup::new(store.clone());
        Self {
            store,
            table: DEFAULT_TABLE.to_string(),
            lookup,
        }
    }

    /// Create a registry using the table and procedure names from `config`.
    pub fn from_config(store: Arc<dyn TableStore>, config: &Config) -> Self {
        let lookup = WardLookup::with_procedure(store.clone(), &config.ward_lookup_procedure);
        Self {
            store,
            table: config.allocation_table.clone(),
            lookup,
        }
    }

    /// Use a different allocation table.
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Read every stored allocation, in storage order.
    #[instrument(skip(self), fields(table = %self.table, backend = self.store.backend()))]
    pub async fn list_all(&self) -> AllocationResult<Vec<AllocationRecord>> {
        let rows = self.store.select(&self.table, None).await.map_err(|e| {
            warn!(error = %e, "Failed to list staff allocations");
            AllocationError::Transport(e)
        })?;

        let records = rows
            .into_iter()
            .map(decode_record)
            .collect::<AllocationResult<Vec<_>>>()?;
        debug!(count = records.len(), "Listed staff allocations");
        Ok(records)
    }

    /// Validate a draft and store it as a new allocation.
    pub async fn add(&self, draft: &AllocationDraft) -> AllocationResult<AllocationRecord> {
        let record = draft.validate()?;
        self.add_record(record).await
    }

    /// Store a new allocation.
    ///
    /// Fails with `DuplicateAllocation` when the staff member already has one.
    /// There is no read-before-write: the store's unique constraint decides.
    #[instrument(
        skip(self, record),
        fields(staff_number = %record.staff_number, ward_number = %record.ward_number)
    )]
    pub async fn add_record(&self, record: AllocationRecord) -> AllocationResult<AllocationRecord> {
        let row = record
            .to_row()
            .map_err(|e| AllocationError::Decode(e.to_string()))?;

        let stored = match self.store.insert(&self.table, row).await {
            Ok(stored) => stored,
            Err(StoreError::UniqueViolation { constraint, .. }) => {
                info!(
                    constraint = constraint.as_deref().unwrap_or("unknown"),
                    "Staff number already allocated"
                );
                return Err(AllocationError::DuplicateAllocation {
                    staff_number: record.staff_number,
                });
            }
            Err(e) => {
                warn!(error = %e, "Failed to add staff allocation");
                return Err(AllocationError::Transport(e));
            }
        };

        let stored = decode_record(stored)?;
        info!(shift = %stored.shift, "Staff allocation added");
        Ok(stored)
    }

    /// Rewrite the non-key fields of an existing allocation.
    ///
    /// Fails with `NotFound` if no allocation has this staff number; nothing
    /// is written in that case.
    #[instrument(skip(self, changes), fields(staff_number = %staff_number))]
    pub async fn update(
        &self,
        staff_number: &StaffNumber,
        changes: &AllocationChanges,
    ) -> AllocationResult<AllocationRecord> {
        let row = changes
            .to_row()
            .map_err(|e| AllocationError::Decode(e.to_string()))?;
        let filter = Filter::eq(columns::STAFF_NUMBER, staff_number.as_str());

        let updated = self
            .store
            .update(&self.table, row, &filter)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to update staff allocation");
                AllocationError::Transport(e)
            })?;

        let Some(stored) = updated.into_iter().next() else {
            info!("Update matched no staff allocation");
            return Err(AllocationError::NotFound {
                staff_number: staff_number.clone(),
            });
        };

        let stored = decode_record(stored)?;
        info!(
            ward_number = %stored.ward_number,
            shift = %stored.shift,
            "Staff allocation updated"
        );
        Ok(stored)
    }

    /// Staff currently allocated to `ward_number`, from the server-side lookup.
    pub async fn lookup_by_ward(
        &self,
        ward_number: &WardNumber,
    ) -> AllocationResult<Vec<WardStaff>> {
        self.lookup.staff_for_ward(ward_number).await
    }
}

fn decode_record(row: Row) -> AllocationResult<AllocationRecord> {
    AllocationRecord::from_row(row).map_err(|e| {
        warn!(error = %e, "Malformed staff allocation row");
        AllocationError::Decode(e.to_string())
    })
}
