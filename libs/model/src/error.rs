//! Error types for allocation input validation.

use thiserror::Error;

/// Errors raised while turning raw input into typed allocation values.
///
/// Validation always happens before any store call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A single required field was empty.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Several required fields were empty.
    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    /// The shift is not one of Morning, Late or Night.
    #[error("invalid shift '{0}': expected Morning, Late or Night")]
    InvalidShift(String),

    /// The rota week is not a `YYYY-MM-DD` date.
    #[error("invalid rota week '{0}': expected YYYY-MM-DD")]
    InvalidWeek(String),
}

impl ValidationError {
    /// Names of the fields that were missing, if this is a missing-field error.
    pub fn missing_fields(&self) -> &[&'static str] {
        match self {
            ValidationError::MissingField(field) => std::slice::from_ref(field),
            ValidationError::MissingFields(fields) => fields,
            _ => &[],
        }
    }
}
