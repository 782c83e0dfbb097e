//! Scoped, hierarchical service registry.
//!
//! A [`ServiceScope`] maps definitions to live instances. Scopes nest: a
//! child created for a view sees everything its parents registered, and its
//! own registrations shadow theirs. Resolution walks outward from the scope
//! it is asked on.
//!
//! Instances, and any effects handed to [`ServiceScope::own`], live exactly
//! as long as the scope: [`ServiceScope::dispose`] (or dropping the last
//! handle) releases them, which in turn drops their signals and unsubscribes
//! their effects.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use super::context::ServiceContext;
use super::definition::ServiceDefinition;
use crate::error::{Error, ServiceNotFoundError};
use crate::reactive::Effect;

type ServiceKey = (&'static str, TypeId);

struct ScopeInner {
    parent: Option<ServiceScope>,
    context: ServiceContext,
    depth: usize,
    services: RwLock<IndexMap<ServiceKey, Arc<dyn Any + Send + Sync>>>,
    effects: Mutex<Vec<Effect>>,
    disposed: AtomicBool,
}

/// A node in the scope tree. Cloning shares the node.
#[derive(Clone)]
pub struct ServiceScope {
    inner: Arc<ScopeInner>,
}

impl ServiceScope {
    /// Create a top-level scope around the given context.
    pub fn root(context: ServiceContext) -> Self {
        Self::with_parent(None, context, 0)
    }

    fn with_parent(parent: Option<ServiceScope>, context: ServiceContext, depth: usize) -> Self {
        Self {
            inner: Arc::new(ScopeInner {
                parent,
                context,
                depth,
                services: RwLock::new(IndexMap::new()),
                effects: Mutex::new(Vec::new()),
                disposed: AtomicBool::new(false),
            }),
        }
    }

    /// Create a nested scope sharing this scope's context.
    pub fn child(&self) -> Self {
        self.child_with_context(self.inner.context.clone())
    }

    /// Create a nested scope with its own context.
    pub fn child_with_context(&self, context: ServiceContext) -> Self {
        Self::with_parent(Some(self.clone()), context, self.inner.depth + 1)
    }

    pub fn context(&self) -> &ServiceContext {
        &self.inner.context
    }

    pub fn parent(&self) -> Option<&ServiceScope> {
        self.inner.parent.as_ref()
    }

    /// Number of enclosing scopes.
    pub fn depth(&self) -> usize {
        self.inner.depth
    }

    /// Construct an instance with `factory` and register it under
    /// `definition` in this scope.
    ///
    /// The factory receives this scope, so it can read the context and
    /// resolve services registered further out. A previous registration of
    /// the same definition in this scope is replaced.
    pub fn register<S, C, F, E>(
        &self,
        definition: &ServiceDefinition<S, C>,
        factory: F,
        config: C,
    ) -> Result<Arc<S>, Error>
    where
        S: Send + Sync + 'static,
        F: FnOnce(&ServiceScope, C) -> Result<S, E>,
        E: Into<Error>,
    {
        let instance = factory(self, config).map_err(Into::into)?;
        Ok(self.provide(definition, Arc::new(instance)))
    }

    /// Register an already constructed instance.
    pub fn provide<S, C>(&self, definition: &ServiceDefinition<S, C>, instance: Arc<S>) -> Arc<S>
    where
        S: Send + Sync + 'static,
    {
        if self.is_disposed() {
            warn!(
                service = definition.name(),
                "registering into a disposed scope; instance will not be retained"
            );
            return instance;
        }

        let key = (definition.name(), TypeId::of::<S>());
        let previous = self
            .inner
            .services
            .write()
            .insert(key, Arc::clone(&instance) as Arc<dyn Any + Send + Sync>);

        if previous.is_some() {
            warn!(service = definition.name(), depth = self.depth(), "service re-registered");
        } else {
            debug!(service = definition.name(), depth = self.depth(), "service registered");
        }

        instance
    }

    /// Resolve the nearest instance registered under `definition`.
    pub fn resolve<S, C>(
        &self,
        definition: &ServiceDefinition<S, C>,
    ) -> Result<Arc<S>, ServiceNotFoundError>
    where
        S: Send + Sync + 'static,
    {
        let key = (definition.name(), TypeId::of::<S>());
        let mut scope = Some(self);

        while let Some(current) = scope {
            if !current.is_disposed() {
                let found = current.inner.services.read().get(&key).cloned();
                if let Some(instance) = found.and_then(|any| any.downcast::<S>().ok()) {
                    return Ok(instance);
                }
            }
            scope = current.parent();
        }

        Err(ServiceNotFoundError::new(definition.name()))
    }

    /// Whether `definition` resolves from this scope.
    pub fn contains<S, C>(&self, definition: &ServiceDefinition<S, C>) -> bool
    where
        S: Send + Sync + 'static,
    {
        self.resolve(definition).is_ok()
    }

    /// Tie an effect's lifetime to this scope.
    pub fn own(&self, effect: Effect) {
        if self.is_disposed() {
            effect.dispose();
            return;
        }
        self.inner.effects.lock().push(effect);
    }

    /// Release every instance and owned effect.
    pub fn dispose(&self) {
        if self.inner.disposed.swap(true, Ordering::SeqCst) {
            return;
        }

        let effects = std::mem::take(&mut *self.inner.effects.lock());
        for effect in &effects {
            effect.dispose();
        }
        let services = std::mem::take(&mut *self.inner.services.write());

        debug!(
            depth = self.depth(),
            services = services.len(),
            effects = effects.len(),
            "scope disposed"
        );
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&'static str> = self
            .inner
            .services
            .read()
            .keys()
            .map(|(name, _)| *name)
            .collect();
        f.debug_struct("ServiceScope")
            .field("depth", &self.inner.depth)
            .field("services", &names)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
