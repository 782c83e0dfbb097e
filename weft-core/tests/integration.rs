//! Integration Tests for the Reactive System and Service Registry
//!
//! These tests verify that signals, computed values, effects, and scopes work
//! together correctly through the public API only.

use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use weft_core::error::{Error, ServiceNotFoundError, ValidationError};
use weft_core::reactive::{batch, untracked, Computed, Effect, Signal};
use weft_core::service::{ServiceContext, ServiceDefinition, ServiceScope};

/// Test that a computed value follows its signal without manual invalidation.
#[test]
fn computed_tracks_signal_dependency() {
    let signal = Signal::new(10);

    let doubled = {
        let signal = signal.clone();
        Computed::new(move || signal.get() * 2)
    };

    assert_eq!(doubled.get(), 20);

    signal.set(5);
    assert_eq!(doubled.get(), 10);
}

/// Test that an effect re-runs on every write.
#[test]
fn effect_tracks_signal_dependency() {
    let signal = Signal::new(0);
    let observed = Arc::new(AtomicI32::new(-1));

    let _effect = {
        let signal = signal.clone();
        let observed = Arc::clone(&observed);
        Effect::new(move || observed.store(signal.get(), Ordering::SeqCst))
    };

    // Effect runs on creation
    assert_eq!(observed.load(Ordering::SeqCst), 0);

    signal.set(42);
    assert_eq!(observed.load(Ordering::SeqCst), 42);
}

/// Test that computed values cache until a dependency changes.
#[test]
fn computed_caches_expensive_computation() {
    let compute_count = Arc::new(AtomicI32::new(0));
    let signal = Signal::new(10);

    let expensive = {
        let signal = signal.clone();
        let compute_count = Arc::clone(&compute_count);
        Computed::new(move || {
            compute_count.fetch_add(1, Ordering::SeqCst);
            signal.get() * 2
        })
    };

    for _ in 0..5 {
        assert_eq!(expensive.get(), 20);
    }
    assert_eq!(compute_count.load(Ordering::SeqCst), 1);

    signal.set(11);
    assert_eq!(expensive.get(), 22);
    assert_eq!(compute_count.load(Ordering::SeqCst), 2);
}

/// Test a diamond: one signal, two computeds, one effect reading both.
#[test]
fn diamond_runs_effect_once_per_write() {
    let source = Signal::new(1);
    let plus = {
        let source = source.clone();
        Computed::new(move || source.get() + 1)
    };
    let times = {
        let source = source.clone();
        Computed::new(move || source.get() * 10)
    };

    let seen = Arc::new(Mutex::new(Vec::new()));
    let _effect = {
        let seen = Arc::clone(&seen);
        Effect::new(move || seen.lock().push((plus.get(), times.get())))
    };

    source.set(2);
    assert_eq!(*seen.lock(), vec![(2, 10), (3, 20)]);
}

/// Test that a batch delivers only final values to effects.
#[test]
fn batch_coalesces_writes() {
    let first = Signal::new("Ada".to_string());
    let last = Signal::new("Lovelace".to_string());
    let seen = Arc::new(Mutex::new(Vec::new()));

    let _effect = {
        let (first, last) = (first.clone(), last.clone());
        let seen = Arc::clone(&seen);
        Effect::new(move || seen.lock().push(format!("{} {}", first.get(), last.get())))
    };

    batch(|| {
        first.set("Grace".into());
        last.set("Hopper".into());
    });

    assert_eq!(*seen.lock(), vec!["Ada Lovelace", "Grace Hopper"]);
}

/// Test that reads inside `untracked` do not subscribe.
#[test]
fn untracked_reads_do_not_subscribe() {
    let tracked = Signal::new(0);
    let ignored = Signal::new(0);
    let runs = Arc::new(AtomicUsize::new(0));

    let _effect = {
        let (tracked, ignored) = (tracked.clone(), ignored.clone());
        let runs = Arc::clone(&runs);
        Effect::new(move || {
            tracked.get();
            untracked(|| ignored.get());
            runs.fetch_add(1, Ordering::SeqCst);
        })
    };

    ignored.set(1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    tracked.set(1);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Test that a disposed effect stops reacting and releases its edges.
#[test]
fn disposed_effect_stops_reacting() {
    let signal = Signal::new(0);
    let runs = Arc::new(AtomicUsize::new(0));

    let effect = {
        let signal = signal.clone();
        let runs = Arc::clone(&runs);
        Effect::new(move || {
            signal.get();
            runs.fetch_add(1, Ordering::SeqCst);
        })
    };
    assert_eq!(signal.subscriber_count(), 1);

    effect.dispose();
    signal.set(1);

    assert_eq!(runs.load(Ordering::SeqCst), 1);
    assert_eq!(signal.subscriber_count(), 0);
}

// ---- Service registry ----

#[derive(Debug)]
struct Greeter {
    greeting: String,
    calls: Signal<u32>,
}

impl Greeter {
    fn greet(&self, name: &str) -> String {
        self.calls.update(|calls| calls + 1);
        format!("{}, {}!", self.greeting, name)
    }
}

#[derive(Clone)]
struct GreeterConfig {
    greeting: &'static str,
}

static GREETER: ServiceDefinition<Greeter, GreeterConfig> = ServiceDefinition::new("greeter");

fn greeter(_: &ServiceScope, config: GreeterConfig) -> Result<Greeter, Error> {
    if config.greeting.is_empty() {
        return Err(ValidationError::EmptyIdentifier { field: "greeting" }.into());
    }
    Ok(Greeter {
        greeting: config.greeting.to_string(),
        calls: Signal::new(0),
    })
}

/// Test that children resolve outward and can shadow their parents.
#[test]
fn scopes_resolve_outward_and_shadow() {
    let root = ServiceScope::root(ServiceContext::empty());
    root.register(&GREETER, greeter, GreeterConfig { greeting: "Hello" })
        .unwrap();

    let page = root.child();
    assert_eq!(page.resolve(&GREETER).unwrap().greet("Ada"), "Hello, Ada!");

    page.register(&GREETER, greeter, GreeterConfig { greeting: "Hi" })
        .unwrap();
    assert_eq!(page.resolve(&GREETER).unwrap().greet("Ada"), "Hi, Ada!");
    assert_eq!(root.resolve(&GREETER).unwrap().greet("Ada"), "Hello, Ada!");
}

/// Test that resolving an unregistered definition is a wiring error.
#[test]
fn missing_service_is_reported() {
    let scope = ServiceScope::root(ServiceContext::empty());
    let err = scope.resolve(&GREETER).unwrap_err();
    assert_eq!(err, ServiceNotFoundError::new("greeter"));
    assert!(!scope.contains(&GREETER));
}

/// Test that factory failures surface from `register`.
#[test]
fn factory_errors_propagate() {
    let scope = ServiceScope::root(ServiceContext::empty());
    let err = scope
        .register(&GREETER, greeter, GreeterConfig { greeting: "" })
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert!(!scope.contains(&GREETER));
}

/// Test that disposing a scope releases the instance and its subscriptions.
#[test]
fn disposing_a_scope_releases_instances() {
    let root = ServiceScope::root(ServiceContext::empty());
    let view = root.child();
    let instance = view
        .register(&GREETER, greeter, GreeterConfig { greeting: "Hello" })
        .unwrap();

    let observed = Arc::new(AtomicUsize::new(0));
    {
        let calls = instance.calls.clone();
        let observed = Arc::clone(&observed);
        view.own(Effect::new(move || {
            observed.store(calls.get() as usize, Ordering::SeqCst);
        }));
    }

    instance.greet("Ada");
    assert_eq!(observed.load(Ordering::SeqCst), 1);

    view.dispose();
    assert!(view.is_disposed());
    assert!(view.resolve(&GREETER).is_err());

    // The owned effect no longer reacts.
    instance.greet("Grace");
    assert_eq!(observed.load(Ordering::SeqCst), 1);

    // Only our handle keeps the instance alive now.
    assert_eq!(Arc::strong_count(&instance), 1);
}

/// Test that factories can read collaborators from the scope's context.
#[test]
fn factories_read_the_context() {
    struct Locale(&'static str);

    static LOCALIZED: ServiceDefinition<Greeter, ()> = ServiceDefinition::new("localized");

    let root = ServiceScope::root(ServiceContext::builder().with(Locale("fr")).build());
    let instance = root
        .register(
            &LOCALIZED,
            |scope, ()| -> Result<Greeter, Error> {
                let locale = scope.context().require::<Locale>()?;
                let greeting = if locale.0 == "fr" { "Bonjour" } else { "Hello" };
                Ok(Greeter {
                    greeting: greeting.to_string(),
                    calls: Signal::new(0),
                })
            },
            (),
        )
        .unwrap();

    assert_eq!(instance.greet("Ada"), "Bonjour, Ada!");
}
