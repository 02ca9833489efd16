//! Basket allocation management.
//!
//! # Components
//!
//! - **Types**: `AllocationEntry`, mutation outcomes, `AllocationError`
//! - **Rebalancer**: proportional slider redistribution under a 100% sum,
//!   equal-split reset, and whole-percent finalization for saving
//!
//! # Usage
//!
//! ```ignore
//! use pulse_dashboard::allocation::{AllocationEntry, Rebalancer};
//!
//! let mut rebalancer = Rebalancer::new(entries);
//! rebalancer.subscribe(|entries: &[AllocationEntry]| render(entries));
//!
//! rebalancer.set_allocation("entry-1", 45.0);
//! let to_save = rebalancer.finalize_for_save()?;
//! ```

pub mod rebalancer;
pub mod types;

pub use rebalancer::{AllocationObserver, Rebalancer};
pub use types::{
    total_allocation, Adjustment, AllocationEntry, AllocationError, Unchanged,
    ALLOCATION_EPSILON, FULL_ALLOCATION,
};
