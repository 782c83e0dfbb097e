//! Clamp-never-reject constraint application.
//!
//! Every bounded write in the engines goes through [`apply_bounds`]: the
//! selection engine for quantities, the pagination engine for page sizes.
//! Out-of-range input is pulled to the nearest bound and reported only as a
//! [`Clamp::Clamped`] outcome; it is never an error.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Inclusive range a value must land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: u64,
    pub max: u64,
}

impl Bounds {
    /// `max` below `min` collapses the range to `min`.
    pub fn new(min: u64, max: u64) -> Self {
        Self {
            min,
            max: max.max(min),
        }
    }

    /// `[0, max]`.
    pub fn upto(max: u64) -> Self {
        Self::new(0, max)
    }

    pub fn contains(&self, value: i64) -> bool {
        u64::try_from(value).is_ok_and(|v| v >= self.min && v <= self.max)
    }
}

/// Outcome of applying bounds to a requested value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clamp {
    Within(u64),
    Clamped { requested: i64, applied: u64 },
}

impl Clamp {
    pub fn value(self) -> u64 {
        match self {
            Clamp::Within(value) => value,
            Clamp::Clamped { applied, .. } => applied,
        }
    }

    pub fn was_clamped(self) -> bool {
        matches!(self, Clamp::Clamped { .. })
    }
}

/// Pull `requested` into `bounds`.
pub fn apply_bounds(requested: i64, bounds: Bounds) -> Clamp {
    if bounds.contains(requested) {
        // contains() guarantees a non-negative value
        return Clamp::Within(requested.unsigned_abs());
    }

    let applied = match u64::try_from(requested) {
        Ok(value) if value > bounds.max => bounds.max,
        _ => bounds.min,
    };
    debug!(requested, applied, min = bounds.min, max = bounds.max, "value clamped");

    Clamp::Clamped { requested, applied }
}

/// [`apply_bounds`] for `u32` quantities.
pub fn clamp_quantity(requested: i64, max: u32) -> u32 {
    let applied = apply_bounds(requested, Bounds::upto(u64::from(max))).value();
    u32::try_from(applied).unwrap_or(max)
}
