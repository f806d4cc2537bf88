//! Session view of the allocation table.
//!
//! `AllocationView` is the cache a caller renders from. It is loaded in bulk
//! by `refresh` and afterwards changed only by the exact delta of a write the
//! store has confirmed. Every failure leaves the cached listing and the last
//! lookup result as they were.

use tracing::{debug, warn};
use wardrota_model::{
    AllocationChanges, AllocationDraft, AllocationRecord, StaffNumber, WardNumber, WardStaff,
};

use crate::{search, AllocationRegistry, AllocationResult};

/// Owned cache of allocations and the most recent ward lookup.
pub struct AllocationView {
    registry: AllocationRegistry,
    records: Vec<AllocationRecord>,
    ward: Option<WardNumber>,
    ward_staff: Vec<WardStaff>,
}

impl AllocationView {
    /// Create an empty view. Call `refresh` to load it.
    pub fn new(registry: AllocationRegistry) -> Self {
        Self {
            registry,
            records: Vec::new(),
            ward: None,
            ward_staff: Vec::new(),
        }
    }

    /// Create a view and load the full listing.
    ///
    /// A failed initial load still yields an (empty) view together with the error.
    pub async fn load(registry: AllocationRegistry) -> (Self, AllocationResult<()>) {
        let mut view = Self::new(registry);
        let result = view.refresh().await.map(|_| ());
        (view, result)
    }

    /// Cached allocations, in storage order.
    pub fn records(&self) -> &[AllocationRecord] {
        &self.records
    }

    /// The cached allocation for a staff member.
    pub fn get(&self, staff_number: &StaffNumber) -> Option<&AllocationRecord> {
        self.records
            .iter()
            .find(|record| &record.staff_number == staff_number)
    }

    /// Result of the last successful ward lookup.
    pub fn ward_staff(&self) -> &[WardStaff] {
        &self.ward_staff
    }

    /// Ward of the last successful lookup.
    pub fn last_ward(&self) -> Option<&WardNumber> {
        self.ward.as_ref()
    }

    /// Client-side search over the cached listing.
    pub fn search(&self, query: &str) -> Vec<&AllocationRecord> {
        search::filter(&self.records, query)
    }

    /// Reload the listing from the store. Returns the number of records.
    pub async fn refresh(&mut self) -> AllocationResult<usize> {
        match self.registry.list_all().await {
            Ok(records) => {
                self.records = records;
                debug!(count = self.records.len(), "Allocation view refreshed");
                Ok(self.records.len())
            }
            Err(e) => {
                warn!(
                    error = %e,
                    cached = self.records.len(),
                    "Keeping cached allocations after failed refresh"
                );
                Err(e)
            }
        }
    }

    /// Add an allocation and append it to the cache once stored.
    pub async fn add(&mut self, draft: &AllocationDraft) -> AllocationResult<&AllocationRecord> {
        let stored = self.registry.add(draft).await?;
        let index = self.upsert(stored);
        Ok(&self.records[index])
    }

    /// Update an allocation and replace the cached copy once stored.
    pub async fn update(
        &mut self,
        staff_number: &StaffNumber,
        changes: &AllocationChanges,
    ) -> AllocationResult<&AllocationRecord> {
        let stored = self.registry.update(staff_number, changes).await?;
        let index = self.upsert(stored);
        Ok(&self.records[index])
    }

    /// Save an edit made through a draft. The draft's staff number selects
    /// the allocation; its other fields become the changes.
    pub async fn save_edit(&mut self, draft: &AllocationDraft) -> AllocationResult<&AllocationRecord> {
        let staff_number = StaffNumber::parse(&draft.staff_number)?;
        let changes = AllocationChanges::from_draft(draft)?;
        self.update(&staff_number, &changes).await
    }

    /// Run the ward lookup and cache its result.
    pub async fn lookup_by_ward(&mut self, ward_number: &WardNumber) -> AllocationResult<&[WardStaff]> {
        match self.registry.lookup_by_ward(ward_number).await {
            Ok(staff) => {
                self.ward = Some(ward_number.clone());
                self.ward_staff = staff;
                Ok(self.ward_staff.as_slice())
            }
            Err(e) => {
                warn!(
                    error = %e,
                    ward_number = %ward_number,
                    "Keeping previous ward lookup result"
                );
                Err(e)
            }
        }
    }

    /// Replace the cached record with the same key, or append it.
    fn upsert(&mut self, record: AllocationRecord) -> usize {
        match self
            .records
            .iter()
            .position(|cached| cached.staff_number == record.staff_number)
        {
            Some(index) => {
                self.records[index] = record;
                index
            }
            None => {
                self.records.push(record);
                self.records.len() - 1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use wardrota_model::{columns, Shift};
    use wardrota_store::MemoryStore;

    use crate::registry::DEFAULT_TABLE;
    use crate::ward_lookup::{register_memory_procedure, DEFAULT_PROCEDURE};
    use crate::AllocationError;

    fn setup() -> (MemoryStore, AllocationView) {
        let store = MemoryStore::new().with_unique(DEFAULT_TABLE, columns::STAFF_NUMBER);
        register_memory_procedure(&store, DEFAULT_TABLE, DEFAULT_PROCEDURE);
        let registry = AllocationRegistry::new(Arc::new(store.clone()));
        (store, AllocationView::new(registry))
    }

    fn staff(s: &str) -> StaffNumber {
        StaffNumber::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_add_appends_stored_record() {
        let (_, mut view) = setup();
        view.add(&AllocationDraft::new("S1", "2", "Morning", ""))
            .await
            .unwrap();
        view.add(&AllocationDraft::new("S2", "3", "Late", ""))
            .await
            .unwrap();

        let numbers: Vec<_> = view
            .records()
            .iter()
            .map(|r| r.staff_number.as_str())
            .collect();
        assert_eq!(numbers, vec!["S1", "S2"]);
    }

    #[tokio::test]
    async fn test_failed_add_leaves_cache() {
        let (store, mut view) = setup();
        view.add(&AllocationDraft::new("S1", "2", "Morning", ""))
            .await
            .unwrap();

        let err = view
            .add(&AllocationDraft::new("S1", "9", "Night", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, AllocationError::DuplicateAllocation { .. }));

        store.fail_next("offline");
        let err = view
            .add(&AllocationDraft::new("S2", "9", "Night", ""))
            .await
            .unwrap_err();
        assert!(!err.is_user_facing());

        assert_eq!(view.records().len(), 1);
        assert_eq!(view.get(&staff("S1")).unwrap().ward_number.as_str(), "2");
    }

    #[tokio::test]
    async fn test_update_replaces_in_place() {
        let (_, mut view) = setup();
        view.add(&AllocationDraft::new("S1", "2", "Morning", ""))
            .await
            .unwrap();
        view.add(&AllocationDraft::new("S2", "3", "Late", ""))
            .await
            .unwrap();

        let changes = AllocationChanges::new(WardNumber::parse("7").unwrap(), Shift::Night, None);
        view.update(&staff("S1"), &changes).await.unwrap();

        assert_eq!(view.records().len(), 2);
        assert_eq!(view.records()[0].staff_number.as_str(), "S1");
        assert_eq!(view.records()[0].shift, Shift::Night);
        assert_eq!(view.records()[0].ward_number.as_str(), "7");
    }

    #[tokio::test]
    async fn test_update_missing_key_leaves_cache() {
        let (_, mut view) = setup();
        view.add(&AllocationDraft::new("S1", "2", "Morning", ""))
            .await
            .unwrap();

        let changes = AllocationChanges::new(WardNumber::parse("7").unwrap(), Shift::Night, None);
        let err = view.update(&staff("S9"), &changes).await.unwrap_err();
        assert!(matches!(err, AllocationError::NotFound { .. }));
        assert_eq!(view.records().len(), 1);
        assert!(view.get(&staff("S9")).is_none());
    }

    #[tokio::test]
    async fn test_update_transport_failure_leaves_cache() {
        let (store, mut view) = setup();
        view.add(&AllocationDraft::new("S1", "2", "Morning", "2024-01-01"))
            .await
            .unwrap();
        let before = view.records().to_vec();

        store.fail_next("connection reset");
        let changes = AllocationChanges::new(WardNumber::parse("7").unwrap(), Shift::Night, None);
        let err = view.update(&staff("S1"), &changes).await.unwrap_err();
        assert!(matches!(err, AllocationError::Transport(_)));
        assert!(!err.is_user_facing());

        assert_eq!(view.records(), before.as_slice());
        assert_eq!(store.rows(DEFAULT_TABLE)[0]["shift"], serde_json::json!("Morning"));
    }

    #[tokio::test]
    async fn test_save_edit_uses_draft_key() {
        let (_, mut view) = setup();
        view.add(&AllocationDraft::new("S1", "2", "Morning", "2024-01-01"))
            .await
            .unwrap();

        let mut draft = AllocationDraft::from_record(view.get(&staff("S1")).unwrap());
        draft.shift = "night".to_string();
        let saved = view.save_edit(&draft).await.unwrap();
        assert_eq!(saved.shift, Shift::Night);
        assert_eq!(saved.ward_number.as_str(), "2");
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_records() {
        let (store, mut view) = setup();
        view.add(&AllocationDraft::new("S1", "2", "Morning", ""))
            .await
            .unwrap();

        store.fail_next("offline");
        assert!(view.refresh().await.is_err());
        assert_eq!(view.records().len(), 1);

        assert_eq!(view.refresh().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_lookup_failure_keeps_previous_result() {
        let (store, mut view) = setup();
        view.add(&AllocationDraft::new("S1", "2", "Morning", ""))
            .await
            .unwrap();

        let ward = WardNumber::parse("2").unwrap();
        assert_eq!(view.lookup_by_ward(&ward).await.unwrap().len(), 1);

        store.fail_next("offline");
        let other = WardNumber::parse("3").unwrap();
        assert!(view.lookup_by_ward(&other).await.is_err());
        assert_eq!(view.ward_staff().len(), 1);
        assert_eq!(view.last_ward(), Some(&ward));
    }

    #[tokio::test]
    async fn test_load_reports_initial_failure() {
        let store = MemoryStore::new();
        store.fail_next("offline");
        let registry = AllocationRegistry::new(Arc::new(store));

        let (view, result) = AllocationView::load(registry).await;
        assert!(result.is_err());
        assert!(view.records().is_empty());
    }

    #[tokio::test]
    async fn test_search_uses_cache() {
        let (_, mut view) = setup();
        view.add(&AllocationDraft::new("S301", "3", "Morning", ""))
            .await
            .unwrap();
        view.add(&AllocationDraft::new("S404", "4", "Late", ""))
            .await
            .unwrap();

        let found = view.search("3");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].staff_number.as_str(), "S301");
    }
}
