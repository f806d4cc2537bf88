//! SQL identifier validation.
//!
//! Table, column and procedure names end up inside SQL text and URL paths,
//! so they are restricted to plain identifiers.

use crate::{StoreError, StoreResult};

const MAX_IDENTIFIER_LEN: usize = 63;

/// Validates a (possibly schema-qualified) identifier such as
/// `staff_allocation` or `public.staff_allocation`.
pub fn validate_identifier(name: &str) -> StoreResult<&str> {
    if name.is_empty() || !name.split('.').all(is_plain_identifier) {
        return Err(StoreError::InvalidIdentifier(name.to_string()));
    }
    Ok(name)
}

fn is_plain_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    segment.len() <= MAX_IDENTIFIER_LEN
        && (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
