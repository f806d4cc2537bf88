//! Allocation error taxonomy.

use thiserror::Error;
use wardrota_model::{StaffNumber, ValidationError, WardNumber};
use wardrota_store::StoreError;

/// Result alias for allocation operations.
pub type AllocationResult<T> = Result<T, AllocationError>;

/// Errors returned by registry, lookup and view operations.
#[derive(Debug, Error)]
pub enum AllocationError {
    /// Required input was missing or malformed. Raised before any store call.
    #[error("invalid allocation: {0}")]
    Validation(#[from] ValidationError),

    /// The staff member already has an allocation.
    #[error("staff number {staff_number} is already allocated")]
    DuplicateAllocation { staff_number: StaffNumber },

    /// An update matched no stored allocation.
    #[error("no allocation found for staff number {staff_number}")]
    NotFound { staff_number: StaffNumber },

    /// The store call failed.
    #[error("allocation store request failed: {0}")]
    Transport(#[source] StoreError),

    /// The ward lookup call failed.
    #[error("staff lookup for ward {ward_number} failed: {source}")]
    Lookup {
        ward_number: WardNumber,
        #[source]
        source: StoreError,
    },

    /// A row from the store could not be read as an allocation.
    #[error("malformed allocation row: {0}")]
    Decode(String),
}

impl AllocationError {
    /// True for errors the user must act on (shown in context, blocks the
    /// submission). Everything else is logged and leaves the view unchanged.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            AllocationError::Validation(_)
                | AllocationError::DuplicateAllocation { .. }
                | AllocationError::NotFound { .. }
        )
    }
}
