//! End-to-end allocation flow over the in-memory backend.
//!
//! Covers the full session: initial load, add, duplicate rejection, update,
//! search and ward lookup, checking both the view and a fresh listing.

use wardrota_allocation::{
    connect, AllocationChanges, AllocationDraft, AllocationError, AllocationRegistry,
    AllocationView, Backend, Config, Shift, StaffNumber, WardNumber,
};

fn memory_config() -> Config {
    Config {
        backend: Backend::Memory,
        ..Config::default()
    }
}

async fn registry() -> AllocationRegistry {
    let config = memory_config();
    let store = connect(&config).await.unwrap();
    AllocationRegistry::from_config(store, &config)
}

#[tokio::test]
async fn test_add_duplicate_update_scenario() {
    let registry = registry().await;
    let (mut view, loaded) = AllocationView::load(registry.clone()).await;
    loaded.unwrap();
    assert!(view.records().is_empty());

    // Add S1 to ward 2.
    view.add(&AllocationDraft::new("S1", "2", "Morning", "2024-01-01"))
        .await
        .unwrap();

    // Same staff number, different ward: rejected, original unchanged.
    let err = view
        .add(&AllocationDraft::new("S1", "5", "Late", "2024-01-08"))
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::DuplicateAllocation { .. }));
    assert!(err.is_user_facing());

    let s1 = StaffNumber::parse("S1").unwrap();
    let stored = registry.list_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].ward_number.as_str(), "2");

    // Move S1 to the night shift.
    let mut changes = AllocationChanges::from(&stored[0]);
    changes.shift = Shift::Night;
    view.update(&s1, &changes).await.unwrap();

    let stored = registry.list_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].staff_number, s1);
    assert_eq!(stored[0].shift, Shift::Night);
    assert_eq!(stored[0].ward_number.as_str(), "2");

    // The view agrees with the store without a refresh.
    assert_eq!(view.records(), stored.as_slice());
}

#[tokio::test]
async fn test_search_and_ward_lookup() {
    let registry = registry().await;
    let mut view = AllocationView::new(registry);

    for (staff, ward, shift) in [
        ("S301", "3", "Morning"),
        ("S404", "4", "Late"),
        ("S302", "3", "Night"),
    ] {
        view.add(&AllocationDraft::new(staff, ward, shift, ""))
            .await
            .unwrap();
    }

    let found: Vec<_> = view
        .search("s40")
        .iter()
        .map(|r| r.staff_number.as_str())
        .collect();
    assert_eq!(found, vec!["S404"]);

    let ward = WardNumber::parse("3").unwrap();
    let staff: Vec<_> = view
        .lookup_by_ward(&ward)
        .await
        .unwrap()
        .iter()
        .map(|s| s.staff_number.to_string())
        .collect();
    assert_eq!(staff, vec!["S301", "S302"]);

    let empty = view
        .lookup_by_ward(&WardNumber::parse("12").unwrap())
        .await
        .unwrap();
    assert!(empty.is_empty());
}

#[tokio::test]
async fn test_update_unknown_staff_is_not_found() {
    let registry = registry().await;
    let mut view = AllocationView::new(registry.clone());

    let changes = AllocationChanges::new(WardNumber::parse("1").unwrap(), Shift::Late, None);
    let err = view
        .update(&StaffNumber::parse("S9").unwrap(), &changes)
        .await
        .unwrap_err();
    assert!(matches!(err, AllocationError::NotFound { .. }));
    assert!(view.records().is_empty());
    assert!(registry.list_all().await.unwrap().is_empty());
}
