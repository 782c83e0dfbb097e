//! Query, filter and sort descriptions handed to the data-fetch collaborator.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field equality constraints, in insertion order. Empty means unfiltered.
pub type Predicate = IndexMap<String, Value>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub order: SortOrder,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Desc,
        }
    }
}

/// Options for a single fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Query {
    pub limit: Option<usize>,
    pub skip: Option<usize>,
    pub filter: Predicate,
    pub sort: Vec<SortSpec>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_filter(mut self, filter: Predicate) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_sort(mut self, sort: Vec<SortSpec>) -> Self {
        self.sort = sort;
        self
    }

    /// Add one equality constraint.
    pub fn filter_by(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(field.into(), value.into());
        self
    }

    pub fn skip_or_zero(&self) -> usize {
        self.skip.unwrap_or(0)
    }
}

/// The active predicate and sort order driving a page window.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterState {
    pub predicate: Predicate,
    pub sort: Vec<SortSpec>,
}

impl FilterState {
    pub fn is_filtered(&self) -> bool {
        !self.predicate.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_builder_accumulates_filters() {
        let query = Query::new()
            .with_limit(10)
            .filter_by("category", "shoes")
            .filter_by("in_stock", true)
            .with_sort(vec![SortSpec::desc("price")]);

        assert_eq!(query.limit, Some(10));
        assert_eq!(query.skip_or_zero(), 0);
        let fields: Vec<_> = query.filter.keys().map(String::as_str).collect();
        assert_eq!(fields, ["category", "in_stock"]);
        assert_eq!(query.sort[0].order, SortOrder::Desc);
    }

    #[test]
    fn filter_state_deserializes_with_defaults() {
        let state: FilterState = serde_json::from_value(json!({
            "predicate": { "category": "shoes" },
            "sort": [{ "field": "name" }]
        }))
        .unwrap();

        assert!(state.is_filtered());
        assert_eq!(state.sort, vec![SortSpec::asc("name")]);
        assert!(!FilterState::default().is_filtered());
    }
}
