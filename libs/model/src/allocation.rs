//! Allocation records and the inputs that produce them.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::{Shift, StaffNumber, ValidationError, WardNumber};

/// Storage column names for allocation rows.
pub mod columns {
    pub const STAFF_NUMBER: &str = "staffnumber";
    pub const WARD_NUMBER: &str = "wardnumber";
    pub const SHIFT: &str = "shift";
    pub const WEEK: &str = "week";
}

// =============================================================================
// AllocationRecord
// =============================================================================

/// A staff member assigned to a ward for a shift and rota week.
///
/// `staff_number` is the unique key; at most one record exists per staff member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRecord {
    #[serde(rename = "staffnumber")]
    pub staff_number: StaffNumber,

    #[serde(rename = "wardnumber")]
    pub ward_number: WardNumber,

    pub shift: Shift,

    /// First day of the rota week, if one was given.
    #[serde(default, deserialize_with = "deserialize_week")]
    pub week: Option<NaiveDate>,
}

impl AllocationRecord {
    /// Creates a record from already-validated parts.
    pub fn new(
        staff_number: StaffNumber,
        ward_number: WardNumber,
        shift: Shift,
        week: Option<NaiveDate>,
    ) -> Self {
        Self {
            staff_number,
            ward_number,
            shift,
            week,
        }
    }

    /// Applies non-key changes in place. The staff number never changes.
    pub fn apply(&mut self, changes: &AllocationChanges) {
        self.ward_number = changes.ward_number.clone();
        self.shift = changes.shift;
        self.week = changes.week;
    }

    /// Converts the record into a storage row.
    pub fn to_row(&self) -> Result<Map<String, Value>, serde_json::Error> {
        into_object(serde_json::to_value(self)?)
    }

    /// Reads a record from a storage row. Unknown columns are ignored.
    pub fn from_row(row: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(row))
    }
}

// =============================================================================
// AllocationChanges
// =============================================================================

/// The non-key fields written by an update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationChanges {
    #[serde(rename = "wardnumber")]
    pub ward_number: WardNumber,

    pub shift: Shift,

    #[serde(default, deserialize_with = "deserialize_week")]
    pub week: Option<NaiveDate>,
}

impl AllocationChanges {
    pub fn new(ward_number: WardNumber, shift: Shift, week: Option<NaiveDate>) -> Self {
        Self {
            ward_number,
            shift,
            week,
        }
    }

    /// Validates the non-key fields of a draft. The draft's staff number is ignored.
    pub fn from_draft(draft: &AllocationDraft) -> Result<Self, ValidationError> {
        let mut missing = Vec::new();
        if draft.ward_number.trim().is_empty() {
            missing.push(columns::WARD_NUMBER);
        }
        if draft.shift.trim().is_empty() {
            missing.push(columns::SHIFT);
        }
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        Ok(Self {
            ward_number: draft.ward_number.parse()?,
            shift: draft.shift.parse()?,
            week: parse_week(&draft.week)?,
        })
    }

    /// Converts the changes into a partial storage row.
    pub fn to_row(&self) -> Result<Map<String, Value>, serde_json::Error> {
        into_object(serde_json::to_value(self)?)
    }
}

impl From<&AllocationRecord> for AllocationChanges {
    fn from(record: &AllocationRecord) -> Self {
        Self {
            ward_number: record.ward_number.clone(),
            shift: record.shift,
            week: record.week,
        }
    }
}

// =============================================================================
// AllocationDraft
// =============================================================================

/// Raw, unvalidated allocation input as typed into a form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationDraft {
    pub staff_number: String,
    pub ward_number: String,
    pub shift: String,
    pub week: String,
}

impl AllocationDraft {
    pub fn new(
        staff_number: impl Into<String>,
        ward_number: impl Into<String>,
        shift: impl Into<String>,
        week: impl Into<String>,
    ) -> Self {
        Self {
            staff_number: staff_number.into(),
            ward_number: ward_number.into(),
            shift: shift.into(),
            week: week.into(),
        }
    }

    /// Prefills a draft from an existing record, for editing.
    pub fn from_record(record: &AllocationRecord) -> Self {
        Self {
            staff_number: record.staff_number.to_string(),
            ward_number: record.ward_number.to_string(),
            shift: record.shift.to_string(),
            week: record
                .week
                .map(|week| week.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }

    /// Validates the draft into a record.
    ///
    /// All missing required fields are reported together; shift and week
    /// format errors are reported after that.
    pub fn validate(&self) -> Result<AllocationRecord, ValidationError> {
        let mut missing = Vec::new();
        if self.staff_number.trim().is_empty() {
            missing.push(columns::STAFF_NUMBER);
        }
        if self.ward_number.trim().is_empty() {
            missing.push(columns::WARD_NUMBER);
        }
        if self.shift.trim().is_empty() {
            missing.push(columns::SHIFT);
        }
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        Ok(AllocationRecord {
            staff_number: self.staff_number.parse()?,
            ward_number: self.ward_number.parse()?,
            shift: self.shift.parse()?,
            week: parse_week(&self.week)?,
        })
    }
}

// =============================================================================
// WardStaff
// =============================================================================

/// A staff entry returned by the ward lookup aggregation.
///
/// The aggregation may project only some columns, so everything but the
/// staff number is optional.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WardStaff {
    #[serde(rename = "staffnumber", alias = "staff_number")]
    pub staff_number: StaffNumber,

    #[serde(
        rename = "wardnumber",
        alias = "ward_number",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ward_number: Option<WardNumber>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shift: Option<Shift>,

    #[serde(
        default,
        deserialize_with = "deserialize_week",
        skip_serializing_if = "Option::is_none"
    )]
    pub week: Option<NaiveDate>,
}

impl WardStaff {
    /// Reads a lookup entry from a storage row.
    pub fn from_row(row: Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(row))
    }
}

impl From<AllocationRecord> for WardStaff {
    fn from(record: AllocationRecord) -> Self {
        Self {
            staff_number: record.staff_number,
            ward_number: Some(record.ward_number),
            shift: Some(record.shift),
            week: record.week,
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Parses an optional rota week. Empty input means no week.
fn parse_week(raw: &str) -> Result<Option<NaiveDate>, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    parse_date(trimmed)
        .map(Some)
        .ok_or_else(|| ValidationError::InvalidWeek(trimmed.to_string()))
}

/// Accepts `YYYY-MM-DD`, or a timestamp whose date part is `YYYY-MM-DD`.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let date_part = s.split_once('T').map_or(s, |(date, _)| date);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

fn deserialize_week<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_date(s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid rota week '{s}'"))),
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, serde_json::Error> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(serde::de::Error::custom(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}
