//! Service definitions: typed, named tokens.

use std::fmt;
use std::marker::PhantomData;

/// Names a service contract `S` constructed from configuration `C`.
///
/// Definitions carry no state and are usually declared as statics:
///
/// ```rust
/// use weft_core::service::ServiceDefinition;
///
/// struct Cart;
/// struct CartConfig;
///
/// static CART: ServiceDefinition<Cart, CartConfig> = ServiceDefinition::new("cart");
/// assert_eq!(CART.name(), "cart");
/// ```
pub struct ServiceDefinition<S, C> {
    name: &'static str,
    _contract: PhantomData<fn(C) -> S>,
}

impl<S, C> ServiceDefinition<S, C> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _contract: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<S, C> Clone for ServiceDefinition<S, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S, C> Copy for ServiceDefinition<S, C> {}

impl<S, C> fmt::Debug for ServiceDefinition<S, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ServiceDefinition").field(&self.name).finish()
    }
}
