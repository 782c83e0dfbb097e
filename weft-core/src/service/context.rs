//! Explicit service context.
//!
//! Collaborators a factory needs (data fetchers, mutation clients, a session
//! holder, ...) are placed in a [`ServiceContext`] by the host and handed to
//! every factory through its scope. Nothing here is global, so two scopes
//! built from different contexts never see each other's collaborators.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ServiceNotFoundError;

type Entries = HashMap<TypeId, Arc<dyn Any + Send + Sync>>;

/// Immutable typed map of collaborators.
#[derive(Clone, Default)]
pub struct ServiceContext {
    entries: Arc<Entries>,
}

impl ServiceContext {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> ServiceContextBuilder {
        ServiceContextBuilder::default()
    }

    /// Look up a collaborator by type.
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| Arc::clone(entry).downcast::<T>().ok())
    }

    /// Look up a collaborator, failing with the type name when absent.
    pub fn require<T>(&self) -> Result<Arc<T>, ServiceNotFoundError>
    where
        T: Any + Send + Sync,
    {
        self.get::<T>()
            .ok_or_else(|| ServiceNotFoundError::new(type_name::<T>()))
    }

    pub fn contains<T>(&self) -> bool
    where
        T: Any + Send + Sync,
    {
        self.entries.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Start a builder pre-filled with this context's entries.
    pub fn extend(&self) -> ServiceContextBuilder {
        ServiceContextBuilder {
            entries: (*self.entries).clone(),
        }
    }
}

impl fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceContext")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[derive(Default)]
pub struct ServiceContextBuilder {
    entries: Entries,
}

impl ServiceContextBuilder {
    /// Add a collaborator, replacing any previous one of the same type.
    pub fn with<T>(self, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.with_arc(Arc::new(value))
    }

    /// Add an already shared collaborator.
    pub fn with_arc<T>(mut self, value: Arc<T>) -> Self
    where
        T: Any + Send + Sync,
    {
        self.entries.insert(TypeId::of::<T>(), value);
        self
    }

    pub fn build(self) -> ServiceContext {
        ServiceContext {
            entries: Arc::new(self.entries),
        }
    }
}
