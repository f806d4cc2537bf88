//! Ward staff allocation.
//!
//! ## Components
//!
//! - `registry`: add / update / list allocation records. One allocation per
//!   staff member, enforced by the store's unique constraint.
//! - `ward_lookup`: server-side "which staff are on ward W" aggregation.
//! - `view`: the owned session cache callers render from. It changes only
//!   after the store confirms a write.
//! - `search`: client-side filter over the cached listing.
//!
//! ## Wiring
//!
//! ```text
//! Config::from_env() ──► connect() ──► Arc<dyn TableStore>
//!                                          │
//!                          AllocationRegistry ──► WardLookup
//!                                          │
//!                                   AllocationView
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod registry;
pub mod schema;
pub mod search;
pub mod telemetry;
pub mod view;
pub mod ward_lookup;

pub use backend::connect;
pub use config::{Backend, Config};
pub use error::{AllocationError, AllocationResult};
pub use registry::AllocationRegistry;
pub use view::AllocationView;
pub use ward_lookup::WardLookup;

pub use wardrota_model::{
    AllocationChanges, AllocationDraft, AllocationRecord, Shift, StaffNumber, ValidationError,
    WardNumber, WardStaff,
};
