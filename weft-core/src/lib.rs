//! Weft Core
//!
//! This crate provides the state runtime shared by every data-driven view:
//!
//! - Reactive primitives (signals, computed values, effects)
//! - A scoped service registry that constructs and owns engine instances
//! - Cursor pagination, filter/sort, and quantity selection engines
//!
//! Rendering, transport, and per-domain clients are collaborators: the
//! engines talk to them through the traits in [`query`].
//!
//! # Architecture
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `service`: Definitions, scopes, and the collaborator context
//! - `query`: Query/sort/filter types and the fetch collaborator traits
//! - `engine`: The stateful engines and the shared clamp function
//! - `poll`: Readiness polling used after mutations
//!
//! # Example
//!
//! ```rust
//! use weft_core::reactive::{Computed, Effect, Signal};
//!
//! let count = Signal::new(0);
//!
//! let doubled = {
//!     let count = count.clone();
//!     Computed::new(move || count.get() * 2)
//! };
//!
//! let _effect = {
//!     let (count, doubled) = (count.clone(), doubled.clone());
//!     Effect::new(move || {
//!         println!("Count: {}, Doubled: {}", count.get(), doubled.get());
//!     })
//! };
//!
//! // Effect re-runs, prints: "Count: 5, Doubled: 10"
//! count.set(5);
//! ```

pub mod engine;
pub mod error;
pub mod poll;
pub mod query;
pub mod reactive;
pub mod service;

pub use error::{Error, Result};
