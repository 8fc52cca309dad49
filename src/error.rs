//! Fatal simulation errors.
//!
//! The neighbor search is only valid while every particle stays inside the
//! hashed domain and no bucket exceeds its fixed capacity. Both violations are
//! surfaced here instead of terminating the process so callers and tests can
//! assert on them.

use crate::math::Cell;

#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// A particle hashed to a cell outside the grid (or had a non-finite position).
    DomainViolation { particle: usize, cell: Cell },
    /// A bucket would exceed its fixed capacity.
    BucketOverflow { cell: Cell, capacity: usize },
    /// A configuration value was rejected before the simulation was built.
    InvalidConfig(String),
}

impl SimError {
    /// `true` for the two neighbor-search preconditions that end a run.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SimError::DomainViolation { .. } | SimError::BucketOverflow { .. }
        )
    }
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimError::DomainViolation { particle, cell } => write!(
                f,
                "particle {} left the hashed domain (cell {}, {})",
                particle, cell.x, cell.y
            ),
            SimError::BucketOverflow { cell, capacity } => write!(
                f,
                "bucket ({}, {}) is full (capacity {})",
                cell.x, cell.y, capacity
            ),
            SimError::InvalidConfig(reason) => write!(f, "invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for SimError {}
