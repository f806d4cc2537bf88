//! # wardrota-model
//!
//! Domain values for ward staff allocation.
//!
//! ## Design Principles
//!
//! - Keys are user-supplied identifiers, trimmed and never empty
//! - Raw form input (`AllocationDraft`) is validated once, up front, into
//!   typed records; nothing downstream re-checks required fields
//! - Records map to storage rows using the table's column names
//!   (`staffnumber`, `wardnumber`, `shift`, `week`)
//!
//! ## Example
//!
//! ```
//! use wardrota_model::{AllocationDraft, Shift};
//!
//! let record = AllocationDraft::new("S1", "2", "morning", "2024-01-01")
//!     .validate()
//!     .unwrap();
//! assert_eq!(record.shift, Shift::Morning);
//! assert_eq!(record.ward_number.as_str(), "2");
//! ```

mod allocation;
mod error;
mod macros;
mod types;

pub use allocation::{columns, AllocationChanges, AllocationDraft, AllocationRecord, WardStaff};
pub use error::ValidationError;
pub use types::*;
