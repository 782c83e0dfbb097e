//! Query descriptions and the collaborator contracts the engines consume.

mod fetch;
mod types;

pub use fetch::{Cursor, DataFetcher, Mutator, PageFuture, PageResult};
pub use types::{FilterState, Predicate, Query, SortOrder, SortSpec};
