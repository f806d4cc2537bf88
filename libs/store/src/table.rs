//! The tabular store interface.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::StoreResult;

/// A stored row: column name to JSON value.
pub type Row = Map<String, Value>;

/// Equality match on one column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    /// Matches rows whose `column` equals `value`.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            value: value.into(),
        }
    }

    /// The filter value as the text a remote store compares against.
    ///
    /// Remote stores compare on the textual form, so `"2"` and `2` match.
    pub fn value_text(&self) -> Option<String> {
        value_text(&self.value)
    }

    /// Returns true if `row` satisfies this filter.
    pub fn matches(&self, row: &Row) -> bool {
        match row.get(&self.column) {
            Some(actual) => actual == &self.value || value_text(actual) == self.value_text(),
            None => self.value.is_null(),
        }
    }
}

pub(crate) fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// A remote tabular store.
///
/// Implementations must report violated unique constraints as
/// `StoreError::UniqueViolation`, and `update` must return exactly the rows
/// it changed (an empty vector when nothing matched).
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Read all rows of `table`, optionally restricted by `filter`.
    async fn select(&self, table: &str, filter: Option<&Filter>) -> StoreResult<Vec<Row>>;

    /// Insert one row and return it as stored.
    async fn insert(&self, table: &str, row: Row) -> StoreResult<Row>;

    /// Apply `changes` to every row matching `filter` and return the updated rows.
    async fn update(&self, table: &str, changes: Row, filter: &Filter) -> StoreResult<Vec<Row>>;

    /// Call a server-side procedure and return its rows.
    async fn rpc(&self, procedure: &str, params: Row) -> StoreResult<Vec<Row>>;
}
