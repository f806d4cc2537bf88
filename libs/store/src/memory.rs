//! In-process table store.
//!
//! Behaves like the remote backends for the operations the registry relies
//! on: unique columns are enforced on insert and update, procedures run
//! against the current tables, and faults can be injected to exercise
//! transport-failure paths.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use crate::table::value_text;
use crate::{validate_identifier, Filter, Row, StoreError, StoreResult, TableStore};

/// A server-side procedure: reads the tables, returns rows.
pub type Procedure = Arc<dyn Fn(&MemoryTables, &Row) -> StoreResult<Vec<Row>> + Send + Sync>;

/// Read-only view of the in-memory tables, handed to procedures.
#[derive(Debug, Default, Clone)]
pub struct MemoryTables {
    tables: HashMap<String, Vec<Row>>,
}

impl MemoryTables {
    /// Rows of `table` in insertion order. Unknown tables are empty.
    pub fn rows(&self, table: &str) -> &[Row] {
        self.tables.get(table).map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Default)]
struct Inner {
    tables: MemoryTables,
    unique: HashMap<String, Vec<String>>,
    procedures: HashMap<String, Procedure>,
    faults: VecDeque<String>,
}

/// In-memory `TableStore`.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `column` of `table` unique.
    pub fn with_unique(self, table: &str, column: &str) -> Self {
        if let Ok(mut inner) = self.inner.lock() {
            inner
                .unique
                .entry(table.to_string())
                .or_default()
                .push(column.to_string());
        }
        self
    }

    /// Register a procedure callable through `rpc`.
    pub fn register_procedure<F>(&self, name: &str, procedure: F)
    where
        F: Fn(&MemoryTables, &Row) -> StoreResult<Vec<Row>> + Send + Sync + 'static,
    {
        if let Ok(mut inner) = self.inner.lock() {
            inner
                .procedures
                .insert(name.to_string(), Arc::new(procedure));
        }
    }

    /// Make the next store call fail with `StoreError::Unavailable`.
    ///
    /// Calls queue up: each call consumes one injected fault.
    pub fn fail_next(&self, message: impl Into<String>) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.faults.push_back(message.into());
        }
    }

    /// Snapshot of a table's rows.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.inner
            .lock()
            .map(|inner| inner.tables.rows(table).to_vec())
            .unwrap_or_default()
    }

    /// Lock the store and consume a pending fault, if any.
    fn begin(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        let mut inner = self
            .inner
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))?;
        if let Some(message) = inner.faults.pop_front() {
            return Err(StoreError::Unavailable(message));
        }
        Ok(inner)
    }
}

impl Inner {
    /// Find a unique column of `table` on which `candidate` collides with a
    /// row other than the one at `skip`.
    fn unique_conflict(&self, table: &str, candidate: &Row, skip: Option<usize>) -> Option<String> {
        let columns = self.unique.get(table)?;
        let rows = self.tables.rows(table);
        columns
            .iter()
            .find(|column| {
                let Some(value) = candidate.get(column.as_str()).and_then(value_text) else {
                    return false;
                };
                rows.iter().enumerate().any(|(index, row)| {
                    Some(index) != skip
                        && row.get(column.as_str()).and_then(value_text).as_deref()
                            == Some(value.as_str())
                })
            })
            .cloned()
    }
}

fn unique_violation(table: &str, column: &str, candidate: &Row) -> StoreError {
    let value = candidate
        .get(column)
        .and_then(value_text)
        .unwrap_or_default();
    StoreError::UniqueViolation {
        table: table.to_string(),
        constraint: Some(format!("{table}_{column}_key")),
        message: format!("duplicate key value ({column})=({value}) already exists"),
    }
}

#[async_trait]
impl TableStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn select(&self, table: &str, filter: Option<&Filter>) -> StoreResult<Vec<Row>> {
        validate_identifier(table)?;
        let inner = self.begin()?;
        let rows = inner
            .tables
            .rows(table)
            .iter()
            .filter(|row| filter.is_none_or(|filter| filter.matches(row)))
            .cloned()
            .collect::<Vec<_>>();
        debug!(table, rows = rows.len(), "memory select");
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Row) -> StoreResult<Row> {
        validate_identifier(table)?;
        let mut inner = self.begin()?;
        if let Some(column) = inner.unique_conflict(table, &row, None) {
            return Err(unique_violation(table, &column, &row));
        }
        inner
            .tables
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        debug!(table, "memory insert");
        Ok(row)
    }

    async fn update(&self, table: &str, changes: Row, filter: &Filter) -> StoreResult<Vec<Row>> {
        validate_identifier(table)?;
        if changes.is_empty() {
            return Err(StoreError::InvalidRequest("update without changes".to_string()));
        }
        let mut inner = self.begin()?;

        let targets = inner
            .tables
            .rows(table)
            .iter()
            .enumerate()
            .filter(|(_, row)| filter.matches(row))
            .map(|(index, _)| index)
            .collect::<Vec<_>>();

        // Check every target before touching any row so a conflict leaves
        // the table untouched.
        let mut updated = Vec::with_capacity(targets.len());
        for &index in &targets {
            let mut candidate = inner.tables.rows(table)[index].clone();
            candidate.extend(changes.clone());
            if let Some(column) = inner.unique_conflict(table, &candidate, Some(index)) {
                return Err(unique_violation(table, &column, &candidate));
            }
            updated.push((index, candidate));
        }

        if let Some(rows) = inner.tables.tables.get_mut(table) {
            for (index, candidate) in &updated {
                rows[*index] = candidate.clone();
            }
        }
        debug!(table, rows = updated.len(), "memory update");
        Ok(updated.into_iter().map(|(_, row)| row).collect())
    }

    async fn rpc(&self, procedure: &str, params: Row) -> StoreResult<Vec<Row>> {
        validate_identifier(procedure)?;
        let inner = self.begin()?;
        let Some(call) = inner.procedures.get(procedure).cloned() else {
            return Err(StoreError::UnknownProcedure(procedure.to_string()));
        };
        let rows = call(&inner.tables, &params)?;
        debug!(procedure, rows = rows.len(), "memory rpc");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    const TABLE: &str = "staff_allocation";

    fn row(value: Value) -> Row {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn store() -> MemoryStore {
        MemoryStore::new().with_unique(TABLE, "staffnumber")
    }

    #[tokio::test]
    async fn test_insert_then_select() {
        let store = store();
        store
            .insert(TABLE, row(json!({ "staffnumber": "S1", "wardnumber": "2" })))
            .await
            .unwrap();
        store
            .insert(TABLE, row(json!({ "staffnumber": "S2", "wardnumber": "3" })))
            .await
            .unwrap();

        let all = store.select(TABLE, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let filtered = store
            .select(TABLE, Some(&Filter::eq("wardnumber", "3")))
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0]["staffnumber"], json!("S2"));
    }

    #[tokio::test]
    async fn test_unique_column_enforced() {
        let store = store();
        store
            .insert(TABLE, row(json!({ "staffnumber": "S1", "wardnumber": "2" })))
            .await
            .unwrap();
        let err = store
            .insert(TABLE, row(json!({ "staffnumber": "S1", "wardnumber": "9" })))
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        match err {
            StoreError::UniqueViolation { constraint, .. } => {
                assert_eq!(constraint.as_deref(), Some("staff_allocation_staffnumber_key"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(store.rows(TABLE).len(), 1);
    }

    #[tokio::test]
    async fn test_update_returns_changed_rows() {
        let store = store();
        store
            .insert(TABLE, row(json!({ "staffnumber": "S1", "shift": "Morning" })))
            .await
            .unwrap();

        let updated = store
            .update(
                TABLE,
                row(json!({ "shift": "Night" })),
                &Filter::eq("staffnumber", "S1"),
            )
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["shift"], json!("Night"));
        assert_eq!(store.rows(TABLE)[0]["shift"], json!("Night"));

        let none = store
            .update(
                TABLE,
                row(json!({ "shift": "Late" })),
                &Filter::eq("staffnumber", "S404"),
            )
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_update_cannot_duplicate_unique_column() {
        let store = store();
        store
            .insert(TABLE, row(json!({ "staffnumber": "S1" })))
            .await
            .unwrap();
        store
            .insert(TABLE, row(json!({ "staffnumber": "S2" })))
            .await
            .unwrap();

        let err = store
            .update(
                TABLE,
                row(json!({ "staffnumber": "S1" })),
                &Filter::eq("staffnumber", "S2"),
            )
            .await
            .unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(store.rows(TABLE)[1]["staffnumber"], json!("S2"));
    }

    #[tokio::test]
    async fn test_injected_fault_consumed_once() {
        let store = store();
        store.fail_next("network down");

        let err = store.select(TABLE, None).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(ref m) if m == "network down"));
        assert!(store.select(TABLE, None).await.is_ok());
    }

    #[tokio::test]
    async fn test_rpc_runs_registered_procedure() {
        let store = store();
        store
            .insert(TABLE, row(json!({ "staffnumber": "S1", "wardnumber": "2" })))
            .await
            .unwrap();
        store.register_procedure("count_rows", |tables, _params| {
            let count = tables.rows(TABLE).len();
            Ok(vec![row(json!({ "count": count }))])
        });

        let rows = store.rpc("count_rows", Row::new()).await.unwrap();
        assert_eq!(rows[0]["count"], json!(1));

        let err = store.rpc("missing", Row::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownProcedure(_)));
    }

    #[tokio::test]
    async fn test_invalid_table_name_rejected() {
        let err = store().select("x; drop", None).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidIdentifier(_)));
    }
}
