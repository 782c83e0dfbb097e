//! Stateful Engines
//!
//! The three engines built on the reactive primitives:
//!
//! - [`Paginator`]: a cursor-driven page window
//! - [`FilterEngine`]: predicate and sort state driving a paginator
//! - [`SelectionEngine`]: per-key quantities under item and group maximums
//!
//! Each engine keeps its state in signals created once at construction, so
//! dropping the engine (usually by disposing its [`ServiceScope`]) releases
//! every subscription it holds.
//!
//! [`ServiceScope`]: crate::service::ServiceScope

pub mod constraint;
mod filter;
mod pagination;
mod selection;
mod snapshot;

pub use constraint::{apply_bounds, clamp_quantity, Bounds, Clamp};
pub use filter::{FilterEngine, FilterPhase};
pub use pagination::{PaginationConfig, Paginator};
pub use selection::{ItemLimits, SelectionConfig, SelectionEngine, SelectionKey};
pub use snapshot::PageSnapshot;
