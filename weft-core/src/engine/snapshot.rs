//! Serializable page window state.
//!
//! A [`PageSnapshot`] is the plain-data form of a page window: what a server
//! computes ahead of time and hands to a client so the client's window can
//! start populated instead of empty. Cursor closures cannot travel, so a
//! snapshot only records whether more data exists in each direction and the
//! query that produced it; the restored window rebuilds offset cursors.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::SnapshotError;
use crate::query::Query;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound(serialize = "T: Serialize", deserialize = "T: DeserializeOwned"))]
pub struct PageSnapshot<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total_count: Option<usize>,
    #[serde(default)]
    pub has_next: bool,
    #[serde(default)]
    pub has_prev: bool,
    #[serde(default)]
    pub query: Query,
    /// Offset of the first item in `items`.
    #[serde(default)]
    pub window_start: usize,
}

impl<T> PageSnapshot<T> {
    pub fn new(items: Vec<T>, query: Query) -> Self {
        Self {
            window_start: query.skip_or_zero(),
            items,
            total_count: None,
            has_next: false,
            has_prev: false,
            query,
        }
    }
}

impl<T> PageSnapshot<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Encode as MessagePack with named fields.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, SnapshotError> {
        rmp_serde::to_vec_named(self).map_err(|err| SnapshotError::Encode(err.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, SnapshotError> {
        rmp_serde::from_slice(bytes).map_err(|err| SnapshotError::Decode(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SortSpec;

    #[test]
    fn msgpack_preserves_window_state() {
        let mut snapshot = PageSnapshot::new(
            vec!["a".to_string(), "b".to_string()],
            Query::new()
                .with_limit(2)
                .filter_by("category", "shoes")
                .with_sort(vec![SortSpec::asc("name")]),
        );
        snapshot.total_count = Some(7);
        snapshot.has_next = true;

        let bytes = snapshot.to_msgpack().unwrap();
        let restored = PageSnapshot::<String>::from_msgpack(&bytes).unwrap();
        assert_eq!(restored, snapshot);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = PageSnapshot::<u8>::from_msgpack(&[0xc1]).unwrap_err();
        assert!(matches!(err, SnapshotError::Decode(_)));
    }
}
