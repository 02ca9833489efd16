//! Allocation data types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Target sum of every basket's allocations (percent).
pub const FULL_ALLOCATION: f64 = 100.0;

/// Changes smaller than this are treated as no change.
pub const ALLOCATION_EPSILON: f64 = 0.001;

/// One stock's share of a basket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationEntry {
    /// Identifier, unique within the basket
    pub id: String,
    /// Ticker symbol
    pub symbol: String,
    /// Percentage of the basket (0-100)
    pub allocation: f64,
    /// Excluded from automatic redistribution
    #[serde(default)]
    pub locked: bool,
}

impl AllocationEntry {
    pub fn new(id: impl Into<String>, symbol: impl Into<String>, allocation: f64) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            allocation,
            locked: false,
        }
    }

    /// Builder-style lock flag.
    pub fn locked(mut self, locked: bool) -> Self {
        self.locked = locked;
        self
    }
}

/// Why a mutation left the entries untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unchanged {
    /// Requested value differs from the current one by less than the epsilon
    BelowThreshold,
    /// No entry carries the requested id
    UnknownEntry,
    /// Requested value was NaN or infinite
    InvalidValue,
    /// Every other entry is locked, nothing can absorb the change
    NoUnlockedPeers,
}

impl std::fmt::Display for Unchanged {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BelowThreshold => write!(f, "change below threshold"),
            Self::UnknownEntry => write!(f, "unknown entry"),
            Self::InvalidValue => write!(f, "invalid value"),
            Self::NoUnlockedPeers => write!(f, "no unlocked entries to redistribute to"),
        }
    }
}

/// Result of a rebalancing step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum Adjustment {
    Applied,
    Unchanged(Unchanged),
}

impl Adjustment {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

/// Allocation errors surfaced to callers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AllocationError {
    /// The rounded allocations do not sum to 100 and no unlocked entry can
    /// take the difference without leaving 0..=100.
    #[error("Cannot reconcile allocations: rounded sum is {rounded_sum}")]
    CannotReconcileAllocations { rounded_sum: f64 },
}

/// Sum of all allocations.
pub fn total_allocation(entries: &[AllocationEntry]) -> f64 {
    entries.iter().map(|e| e.allocation).sum()
}
