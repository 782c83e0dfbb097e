//! Quantity/Selection Constraint Engine
//!
//! Tracks selected quantities per key, where a key is a primary id with an
//! optional secondary id (a ticket type within an event slot, a variant
//! within a product). Every write is clamped into
//! `[0, min(item max, group_max - everything else)]` and never rejected.
//!
//! Entries that reach zero are removed, so "has an entry" and "quantity > 0"
//! always agree.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::constraint::clamp_quantity;
use crate::error::Error;
use crate::reactive::{batch, Computed, Signal};
use crate::service::ServiceScope;

/// Per-primary-key maximums. A missing key or a zero means unavailable.
pub type ItemLimits = IndexMap<String, u32>;

/// `(primary, secondary?)` compound key of one selection entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SelectionKey {
    pub primary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secondary: Option<String>,
}

impl SelectionKey {
    pub fn new(primary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: None,
        }
    }

    pub fn compound(primary: impl Into<String>, secondary: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            secondary: Some(secondary.into()),
        }
    }
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.secondary {
            Some(secondary) => write!(f, "{}/{}", self.primary, secondary),
            None => f.write_str(&self.primary),
        }
    }
}

impl From<&str> for SelectionKey {
    fn from(primary: &str) -> Self {
        Self::new(primary)
    }
}

impl From<String> for SelectionKey {
    fn from(primary: String) -> Self {
        Self::new(primary)
    }
}

impl From<(&str, &str)> for SelectionKey {
    fn from((primary, secondary): (&str, &str)) -> Self {
        Self::compound(primary, secondary)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Upper bound on the sum of all entries.
    pub group_max: Option<u32>,
    /// Initial per-item maximums.
    pub limits: ItemLimits,
}

pub struct SelectionEngine {
    group_max: Option<u32>,
    limits: Signal<ItemLimits>,
    entries: Signal<IndexMap<SelectionKey, u32>>,
    total_quantity: Computed<u32>,
}

impl SelectionEngine {
    pub fn new(config: SelectionConfig) -> Self {
        let entries = Signal::new(IndexMap::<SelectionKey, u32>::new());
        let total_quantity = {
            let entries = entries.clone();
            Computed::new(move || entries.with(|entries| saturating_sum(entries.values())))
        };

        Self {
            group_max: config.group_max,
            limits: Signal::new(config.limits),
            entries,
            total_quantity,
        }
    }

    /// Factory for a [`ServiceScope`]. An [`ItemLimits`] in the scope's
    /// context takes precedence over `config.limits`.
    pub fn from_scope(scope: &ServiceScope, config: SelectionConfig) -> Result<Self, Error> {
        let limits = match scope.context().get::<ItemLimits>() {
            Some(limits) => limits.as_ref().clone(),
            None => config.limits,
        };
        Ok(Self::new(SelectionConfig { limits, ..config }))
    }

    pub fn group_max(&self) -> Option<u32> {
        self.group_max
    }

    /// Externally supplied maximum for `primary`; 0 when unknown.
    pub fn get_max_quantity(&self, primary: &str) -> u32 {
        self.limits
            .with(|limits| limits.get(primary).copied().unwrap_or(0))
    }

    pub fn get_current_quantity(&self, key: impl Into<SelectionKey>) -> u32 {
        let key = key.into();
        self.entries
            .with(|entries| entries.get(&key).copied().unwrap_or(0))
    }

    pub fn is_sold_out(&self, primary: &str) -> bool {
        self.get_max_quantity(primary) == 0
    }

    /// Clamp `quantity` into range and store it. Returns the stored value.
    pub fn set_quantity(&self, key: impl Into<SelectionKey>, quantity: i64) -> u32 {
        let key = key.into();
        let cap = self.capacity_for(&key);
        let applied = clamp_quantity(quantity, cap);

        self.entries.modify(|entries| {
            entries.shift_remove(&key);
            if applied > 0 {
                entries.insert(key.clone(), applied);
            }
        });
        debug!(key = %key, requested = quantity, applied, "quantity set");

        applied
    }

    pub fn increment(&self, key: impl Into<SelectionKey>) -> u32 {
        let key = key.into();
        let current = self.current_untracked(&key);
        self.set_quantity(key, i64::from(current) + 1)
    }

    pub fn decrement(&self, key: impl Into<SelectionKey>) -> u32 {
        let key = key.into();
        let current = self.current_untracked(&key);
        self.set_quantity(key, i64::from(current) - 1)
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries.set(IndexMap::new());
    }

    /// Replace the per-item maximums and pull existing entries back in range.
    ///
    /// Entries are re-clamped in insertion order, so under a group maximum
    /// earlier selections keep priority.
    pub fn set_limits(&self, limits: ItemLimits) {
        batch(|| {
            self.limits.set(limits);
            let previous = self.entries.peek();
            let mut next = IndexMap::with_capacity(previous.len());
            let mut used = 0u32;

            for (key, quantity) in previous {
                let item_max = self.limits.with_untracked(|l| l.get(&key.primary).copied().unwrap_or(0));
                let cap = match self.group_max {
                    Some(group_max) => item_max.min(group_max.saturating_sub(used)),
                    None => item_max,
                };
                let applied = clamp_quantity(i64::from(quantity), cap);
                if applied > 0 {
                    used = used.saturating_add(applied);
                    next.insert(key, applied);
                }
            }
            self.entries.set(next);
        });
    }

    /// Snapshot of the current selection, in insertion order.
    pub fn entries(&self) -> IndexMap<SelectionKey, u32> {
        self.entries.get()
    }

    pub fn total_quantity(&self) -> u32 {
        self.total_quantity.get()
    }

    /// Sum over every entry sharing `primary`.
    pub fn quantity_for(&self, primary: &str) -> u32 {
        self.entries.with(|entries| {
            saturating_sum(
                entries
                    .iter()
                    .filter(|(key, _)| key.primary == primary)
                    .map(|(_, quantity)| quantity),
            )
        })
    }

    /// Room left under the group maximum, if there is one.
    pub fn remaining_group_capacity(&self) -> Option<u32> {
        self.group_max
            .map(|group_max| group_max.saturating_sub(self.total_quantity()))
    }

    fn current_untracked(&self, key: &SelectionKey) -> u32 {
        self.entries
            .with_untracked(|entries| entries.get(key).copied().unwrap_or(0))
    }

    fn capacity_for(&self, key: &SelectionKey) -> u32 {
        let item_max = self
            .limits
            .with_untracked(|limits| limits.get(&key.primary).copied().unwrap_or(0));
        let Some(group_max) = self.group_max else {
            return item_max;
        };

        let others = self.entries.with_untracked(|entries| {
            saturating_sum(
                entries
                    .iter()
                    .filter(|(other, _)| *other != key)
                    .map(|(_, quantity)| quantity),
            )
        });
        item_max.min(group_max.saturating_sub(others))
    }
}

fn saturating_sum<'a>(quantities: impl IntoIterator<Item = &'a u32>) -> u32 {
    quantities
        .into_iter()
        .fold(0u32, |total, quantity| total.saturating_add(*quantity))
}

impl fmt::Debug for SelectionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelectionEngine")
            .field("group_max", &self.group_max)
            .field("entries", &self.entries.peek())
            .finish()
    }
}
