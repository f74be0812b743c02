//! # Wiring Injector - Object-Graph Wiring for Rust
//!
//! A runtime that builds object graphs from described types: it picks
//! constructors, injects fields, setters and methods, wraps components in
//! behaviors and drives start/stop/dispose lifecycles over container trees.
//!
//! ## Features
//!
//! - 🔌 **Constructor, member and composite injection** - greediest satisfiable constructor, then marked members
//! - 🧅 **Behavior decorators** - caching, thread caching, locking, guarding, implementation hiding, decoration
//! - 🌳 **Container hierarchies** - children resolve through their parents, never the other way round
//! - ♻️ **Lifecycles** - start in first-resolution order, stop and dispose in reverse
//! - 🔁 **Cycle detection** - per-resolution guard reporting the whole chain
//! - 🔒 **Lock-free registry** - `DashMap` keyed by type, name or qualified name
//! - 📊 **Observable** - optional tracing integration with JSON or pretty output
//!
//! ## Quick Start
//!
//! ```rust
//! use wiring_injector::{Component, Constructor, Container, Describe, Lookup, TypeMetadata, flags};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Logger;
//!
//! struct Service {
//!     logger: Arc<Logger>,
//! }
//!
//! impl Describe for Logger {
//!     fn describe() -> TypeMetadata<Self> {
//!         TypeMetadata::new().default_constructor()
//!     }
//! }
//!
//! impl Describe for Service {
//!     fn describe() -> TypeMetadata<Self> {
//!         TypeMetadata::new().constructor(
//!             Constructor::new(|args| Ok(Service { logger: args.next()? })).arg::<Logger>("logger"),
//!         )
//!     }
//! }
//!
//! let container = Container::new();
//! container.register(Component::<Logger>::of().flag(flags::CACHE)).unwrap();
//! container.register_type::<Service>().unwrap();
//!
//! let service = container.get::<Service>().unwrap();
//! assert!(Arc::ptr_eq(&service.logger, &container.get::<Logger>().unwrap()));
//! ```
//!
//! ## Interfaces
//!
//! ```rust
//! use wiring_injector::{Component, Container, Lookup, TypeMetadata};
//! use std::sync::Arc;
//!
//! trait Color: Send + Sync {
//!     fn name(&self) -> &'static str;
//! }
//!
//! #[derive(Default)]
//! struct Red;
//!
//! impl Color for Red {
//!     fn name(&self) -> &'static str {
//!         "red"
//!     }
//! }
//!
//! let container = Container::new();
//! container
//!     .register(Component::with_metadata(
//!         TypeMetadata::<Red>::new()
//!             .default_constructor()
//!             .implements::<dyn Color, _>(|red| red as Arc<dyn Color>),
//!     ))
//!     .unwrap();
//!
//! assert_eq!(container.get_dyn::<dyn Color>().unwrap().name(), "red");
//! ```
//!
//! ## Child Containers
//!
//! ```rust
//! use wiring_injector::{Container, Lookup};
//!
//! struct AppConfig { name: String }
//! struct RequestContext { id: String }
//!
//! let root = Container::new();
//! root.singleton(AppConfig { name: "MyApp".into() }).unwrap();
//!
//! let request = root.make_child();
//! request.singleton(RequestContext { id: "req-123".into() }).unwrap();
//!
//! assert!(request.contains::<AppConfig>());
//! assert!(!root.contains::<RequestContext>());
//! ```

extern crate self as wiring_injector;

mod adapter;
mod behavior;
mod component;
mod container;
mod error;
mod factory;
mod guard;
mod injector;
mod key;
mod lifecycle;
#[cfg(feature = "logging")]
pub mod logging;
mod metadata;
mod parameter;
mod properties;
mod provider;
mod storage;

pub use adapter::{ComponentAdapter, ComponentVisitor, InstanceAdapter, ParentAdapter};
pub use behavior::{
    Automating, Behavior, Caching, Decorating, Decorator, Facade, Guarding, HidingImplementation, Locking,
    Synchronizing, ThreadCaching,
};
pub use component::Component;
pub use container::{Container, ContainerBuilder, NotFoundHook};
pub use error::{BoxError, DiError, Result, SharedError};
pub use factory::{Provider, ProviderAdapter};
pub use guard::{Lookup, Resolution, Resolver};
pub use injector::{CompositeInjector, ConstructorInjector, Discovery, Injection, InjectorOptions, MemberInjector};
pub use key::{Key, TypeKey};
pub use lifecycle::{ErasedHooks, Lifecycle, LifecycleHooks, LifecycleOperation, LifecycleState};
pub use metadata::{Args, Constructor, Dependency, Describe, Member, MemberKind, Shape, TypeMetadata};
pub use parameter::{Parameter, Target};
pub use properties::{flags, Properties};
pub use provider::{downcast, downcast_dyn, AnyArc, Injectable, Provision};

/// `#[derive(Describe)]`: injection metadata from `#[inject]` fields
#[cfg(feature = "derive")]
pub use wiring_injector_derive::Describe;

// Re-export tracing macros for convenience when logging feature is enabled
#[cfg(feature = "logging")]
pub use tracing::{debug, error, info, trace, warn};

// Re-export for convenience
pub use std::sync::Arc;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        flags, Component, Constructor, Container, Describe, DiError, Injectable, Key, Lifecycle, Lookup, Member,
        Parameter, Properties, Provider, Result, TypeMetadata,
    };
    pub use std::sync::Arc;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    // =========================================================================
    // Dependency graphs
    // =========================================================================

    #[derive(Debug)]
    struct Store;

    #[derive(Debug)]
    struct Catalog {
        store: Arc<Store>,
    }

    fn catalog() -> Component<Catalog> {
        Component::with_metadata(TypeMetadata::new().constructor(
            Constructor::new(|args| Ok(Catalog { store: args.next()? })).arg::<Store>("store"),
        ))
    }

    #[test]
    fn test_dependent_fails_once_dependency_is_removed() {
        let container = Container::new();
        container.singleton(Store).unwrap();
        container.register(catalog()).unwrap();

        let catalog = container.get::<Catalog>().unwrap();
        assert!(Arc::ptr_eq(&catalog.store, &container.get::<Store>().unwrap()));

        container.remove(&Key::of::<Store>()).unwrap();
        let err = container.get::<Catalog>().unwrap_err();
        assert!(err.is_unsatisfied());
    }

    struct Chicken {
        _egg: Arc<Egg>,
    }

    struct Egg {
        _chicken: Arc<Chicken>,
    }

    fn cyclic() -> Container {
        let container = Container::new();
        container
            .register(Component::with_metadata(TypeMetadata::new().constructor(
                Constructor::new(|args| Ok(Chicken { _egg: args.next()? })).arg::<Egg>("egg"),
            )))
            .unwrap();
        container
            .register(Component::with_metadata(TypeMetadata::new().constructor(
                Constructor::new(|args| Ok(Egg { _chicken: args.next()? })).arg::<Chicken>("chicken"),
            )))
            .unwrap();
        container
    }

    #[test]
    fn test_cycle_is_reported_from_either_end() {
        let container = cyclic();
        for err in [
            container.get::<Chicken>().err().unwrap(),
            container.get::<Egg>().err().unwrap(),
        ] {
            match err {
                DiError::CyclicDependency { chain } => {
                    assert!(chain.contains(&std::any::type_name::<Chicken>()));
                    assert!(chain.contains(&std::any::type_name::<Egg>()));
                }
                other => panic!("unexpected error {other}"),
            }
        }
        // the guard does not leak into later resolutions
        assert!(container.get::<Chicken>().err().unwrap().is_cyclic());
    }

    struct Ledger;

    struct Debits {
        _ledger: Arc<Ledger>,
    }

    struct Credits {
        _ledger: Arc<Ledger>,
    }

    struct Books {
        _debits: Arc<Debits>,
        _credits: Arc<Credits>,
    }

    #[test]
    fn test_concurrent_resolutions_keep_separate_guards() {
        let container = Container::new();
        container
            .register(
                Component::with_metadata(TypeMetadata::<Ledger>::new().constructor(Constructor::new(|_| {
                    std::thread::yield_now();
                    Ok(Ledger)
                })))
                .flag(flags::LOCK),
            )
            .unwrap();
        container
            .register(Component::with_metadata(TypeMetadata::<Debits>::new().constructor(
                Constructor::new(|args| Ok(Debits { _ledger: args.next()? })).arg::<Ledger>("ledger"),
            )))
            .unwrap();
        container
            .register(Component::with_metadata(TypeMetadata::<Credits>::new().constructor(
                Constructor::new(|args| Ok(Credits { _ledger: args.next()? })).arg::<Ledger>("ledger"),
            )))
            .unwrap();
        container
            .register(Component::with_metadata(
                TypeMetadata::<Books>::new().constructor(
                    Constructor::new(|args| {
                        Ok(Books {
                            _debits: args.next()?,
                            _credits: args.next()?,
                        })
                    })
                    .arg::<Debits>("debits")
                    .arg::<Credits>("credits"),
                ),
            ))
            .unwrap();

        let barrier = Arc::new(std::sync::Barrier::new(2));
        let workers: Vec<_> = (0..2)
            .map(|_| {
                let container = container.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    (0..200)
                        .map(|_| container.get::<Books>().map(|_| ()))
                        .collect::<Result<Vec<_>>>()
                })
            })
            .collect();

        for worker in workers {
            match worker.join().unwrap() {
                Ok(resolved) => assert_eq!(resolved.len(), 200),
                Err(e) => panic!("shared dependency reported as {e}"),
            }
        }
    }

    // =========================================================================
    // Caching and identity
    // =========================================================================

    struct Ticket(u32);

    fn ticket(counter: &'static AtomicU32) -> Component<Ticket> {
        Component::with_metadata(
            TypeMetadata::new()
                .constructor(Constructor::new(move |_| Ok(Ticket(counter.fetch_add(1, Ordering::SeqCst))))),
        )
    }

    #[test]
    fn test_caching_controls_identity() {
        static CACHED: AtomicU32 = AtomicU32::new(0);
        static FRESH: AtomicU32 = AtomicU32::new(0);

        let cached = Container::new();
        cached.register(ticket(&CACHED).flag(flags::CACHE)).unwrap();
        let a = cached.get::<Ticket>().unwrap();
        let b = cached.get::<Ticket>().unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.0, 0);

        let fresh = Container::new();
        fresh.register(ticket(&FRESH)).unwrap();
        let a = fresh.get::<Ticket>().unwrap();
        let b = fresh.get::<Ticket>().unwrap();
        assert!(!Arc::ptr_eq(&a, &b));
        assert_ne!(a.0, b.0);
    }

    struct Logger;

    struct Service {
        logger: Arc<Logger>,
    }

    fn logger() -> Component<Logger> {
        Component::with_metadata(TypeMetadata::new().constructor(Constructor::new(|_| Ok(Logger))))
    }

    fn service() -> Component<Service> {
        Component::with_metadata(TypeMetadata::new().constructor(
            Constructor::new(|args| Ok(Service { logger: args.next()? })).arg::<Logger>("logger"),
        ))
    }

    #[test]
    fn test_service_shares_cached_logger() {
        let container = Container::new();
        container.register(logger().flag(flags::CACHE)).unwrap();
        container.register(service()).unwrap();

        let service = container.get::<Service>().unwrap();
        assert!(Arc::ptr_eq(&service.logger, &container.get::<Logger>().unwrap()));
    }

    #[test]
    fn test_service_gets_fresh_uncached_logger() {
        let container = Container::new();
        container.register(logger()).unwrap();
        container.register(service()).unwrap();

        let service = container.get::<Service>().unwrap();
        assert!(!Arc::ptr_eq(&service.logger, &container.get::<Logger>().unwrap()));
    }

    // =========================================================================
    // Interfaces
    // =========================================================================

    trait Color: Send + Sync {
        fn name(&self) -> &'static str;
    }

    macro_rules! color {
        ($ty:ident, $name:literal) => {
            #[derive(Default)]
            struct $ty;

            impl Color for $ty {
                fn name(&self) -> &'static str {
                    $name
                }
            }
        };
    }

    color!(Red, "red");
    color!(Green, "green");
    color!(Blue, "blue");

    fn color<C: Color + Default + 'static>() -> Component<C> {
        Component::with_metadata(
            TypeMetadata::<C>::new()
                .default_constructor()
                .implements::<dyn Color, _>(|c| c as Arc<dyn Color>),
        )
    }

    #[test]
    fn test_two_implementations_are_ambiguous() {
        let container = Container::new();
        container.register(color::<Red>()).unwrap();
        container.register(color::<Green>()).unwrap();

        match container.get_dyn::<dyn Color>().err().unwrap() {
            DiError::AmbiguousResolution { candidates, .. } => {
                assert_eq!(candidates.len(), 2);
                assert!(candidates.contains(&std::any::type_name::<Red>()));
                assert!(candidates.contains(&std::any::type_name::<Green>()));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_get_all_is_ordered_and_local() {
        let root = Container::new();
        root.register(color::<Blue>()).unwrap();

        let child = root.make_child();
        child.register(color::<Red>()).unwrap();
        child.register(color::<Green>()).unwrap();
        child.register(color::<Blue>()).unwrap();

        let names: Vec<_> = child
            .get_all_dyn::<dyn Color>()
            .unwrap()
            .iter()
            .map(|c| c.name())
            .collect();
        assert_eq!(names, vec!["red", "green", "blue"]);
        assert_eq!(root.get_all_dyn::<dyn Color>().unwrap().len(), 1);
        assert!(root.make_child().get_all_dyn::<dyn Color>().unwrap().is_empty());
    }

    // =========================================================================
    // Hierarchies and lifecycles
    // =========================================================================

    #[test]
    fn test_child_keeps_resolved_parent_instance() {
        static COUNTER: AtomicU32 = AtomicU32::new(7);

        let root = Container::new();
        root.register(ticket(&COUNTER).flag(flags::CACHE)).unwrap();
        let child = root.make_child();

        let held = child.get::<Ticket>().unwrap();
        root.remove(&Key::of::<Ticket>()).unwrap();

        assert_eq!(held.0, 7);
        assert!(matches!(child.get::<Ticket>(), Err(DiError::NotFound { .. })));
    }

    struct Worker {
        name: &'static str,
        log: Arc<parking_lot::Mutex<Vec<String>>>,
    }

    impl Lifecycle for Worker {
        fn start(&self) -> std::result::Result<(), BoxError> {
            self.log.lock().push(format!("start {}", self.name));
            Ok(())
        }

        fn stop(&self) -> std::result::Result<(), BoxError> {
            self.log.lock().push(format!("stop {}", self.name));
            Ok(())
        }
    }

    #[test]
    fn test_lifecycle_order_and_double_stop() {
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let container = Container::new();
        for name in ["first", "second"] {
            let log = Arc::clone(&log);
            container
                .register(
                    Component::with_metadata(
                        TypeMetadata::new()
                            .constructor(Constructor::new(move |_| {
                                Ok(Worker {
                                    name,
                                    log: Arc::clone(&log),
                                })
                            }))
                            .lifecycle(),
                    )
                    .named(name)
                    .flag(flags::CACHE),
                )
                .unwrap();
        }
        container.singleton(Store).unwrap();

        // resolve "second" first so instantiation order differs from registration order
        container.get_named::<Worker>("second").unwrap();
        container.start().unwrap();
        container.stop().unwrap();

        assert_eq!(
            *log.lock(),
            vec!["start second", "start first", "stop first", "stop second"]
        );
        assert!(matches!(
            container.stop(),
            Err(DiError::IllegalLifecycleState { .. })
        ));
    }
}
