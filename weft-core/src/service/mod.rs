//! Service Registry
//!
//! Engines are constructed as services: a [`ServiceDefinition`] names the
//! contract, a factory builds the instance from a configuration value, and a
//! [`ServiceScope`] owns the result for as long as the scope lives.
//!
//! Factories never reach for ambient state. Everything they need arrives
//! either through the configuration value or through the scope's
//! [`ServiceContext`].

mod context;
mod definition;
mod scope;

pub use context::{ServiceContext, ServiceContextBuilder};
pub use definition::ServiceDefinition;
pub use scope::ServiceScope;
