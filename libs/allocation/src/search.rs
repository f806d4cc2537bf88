//! Client-side search over a cached allocation listing.
//!
//! This is a view filter only. Use `WardLookup` for the authoritative
//! "staff on ward" query.

use wardrota_model::AllocationRecord;

/// True if `query` occurs, ignoring case, in the record's staff number or
/// ward number. The query is taken literally, whitespace included; an empty
/// query matches every record.
pub fn matches(record: &AllocationRecord, query: &str) -> bool {
    matches_lowercase(record, &query.to_lowercase())
}

/// Records whose staff number or ward number contains `query`, in listing order.
pub fn filter<'a>(records: &'a [AllocationRecord], query: &str) -> Vec<&'a AllocationRecord> {
    let needle = query.to_lowercase();
    records
        .iter()
        .filter(|record| matches_lowercase(record, &needle))
        .collect()
}

fn matches_lowercase(record: &AllocationRecord, needle: &str) -> bool {
    needle.is_empty()
        || record.staff_number.as_str().to_lowercase().contains(needle)
        || record.ward_number.as_str().to_lowercase().contains(needle)
}
