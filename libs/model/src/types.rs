//! Key and shift types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::define_key;
use crate::ValidationError;

// =============================================================================
// Keys
// =============================================================================

define_key!(StaffNumber, "staffnumber");
define_key!(WardNumber, "wardnumber");

// =============================================================================
// Shift
// =============================================================================

/// A working period within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Shift {
    Morning,
    Late,
    Night,
}

impl Shift {
    /// The storage column holding the shift.
    pub const FIELD: &'static str = "shift";

    /// All shifts, in rota order.
    pub const ALL: [Shift; 3] = [Shift::Morning, Shift::Late, Shift::Night];

    /// Canonical name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Shift::Morning => "Morning",
            Shift::Late => "Late",
            Shift::Night => "Night",
        }
    }
}

impl fmt::Display for Shift {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shift {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::MissingField(Self::FIELD));
        }
        Shift::ALL
            .into_iter()
            .find(|shift| shift.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ValidationError::InvalidShift(trimmed.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
