//! Component registrations
//!
//! A [`Component`] collects everything needed to register one type: its key,
//! its [`TypeMetadata`], its properties, extra behaviors and explicit
//! parameters. The container turns it into an adapter chain when it is
//! registered.
//!
//! # Examples
//!
//! ```rust
//! use wiring_injector::{flags, Component, Container, Describe, TypeMetadata};
//!
//! #[derive(Default)]
//! struct Clock;
//!
//! impl Describe for Clock {
//!     fn describe() -> TypeMetadata<Self> {
//!         TypeMetadata::new().default_constructor()
//!     }
//! }
//!
//! let container = Container::new();
//! container
//!     .register(Component::<Clock>::of().named("clock").flag(flags::CACHE))
//!     .unwrap();
//! assert!(container.contains_key(&"clock".into()));
//! ```

use crate::adapter::ComponentAdapter;
use crate::behavior::{self, Behavior, Decorator};
use crate::injector::{self, Injection, InjectorOptions};
use crate::parameter::{Parameter, Target};
use crate::properties::Properties;
use crate::{BoxError, Describe, Injectable, Key, Result, TypeMetadata};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Registration of one described type
pub struct Component<T> {
    key: Key,
    metadata: TypeMetadata<T>,
    properties: Properties,
    behaviors: Vec<Behavior>,
    constructor_params: Option<Vec<Parameter>>,
    member_params: Vec<(Target, Vec<Parameter>)>,
    injection: Option<Injection>,
}

impl<T: Describe> Component<T> {
    /// Register `T` under its own type with the metadata it describes
    pub fn of() -> Self {
        Self::with_metadata(T::describe())
    }
}

impl<T: Injectable> Component<T> {
    /// Register `T` under its own type with explicit metadata
    pub fn with_metadata(metadata: TypeMetadata<T>) -> Self {
        Self {
            key: Key::of::<T>(),
            metadata,
            properties: Properties::new(),
            behaviors: Vec::new(),
            constructor_params: None,
            member_params: Vec::new(),
            injection: None,
        }
    }

    pub fn keyed(mut self, key: impl Into<Key>) -> Self {
        self.key = key.into();
        self
    }

    /// Register under a plain name
    pub fn named(self, name: impl Into<Cow<'static, str>>) -> Self {
        self.keyed(Key::named(name))
    }

    /// Register under `T` qualified by a name
    pub fn qualified(self, name: impl Into<Cow<'static, str>>) -> Self {
        self.keyed(Key::qualified::<T>(name))
    }

    /// Turn a property flag on
    pub fn flag(mut self, flag: impl Into<Cow<'static, str>>) -> Self {
        self.properties.insert(flag, "true");
        self
    }

    pub fn set(mut self, name: impl Into<Cow<'static, str>>, value: impl Into<Cow<'static, str>>) -> Self {
        self.properties.insert(name, value);
        self
    }

    /// Replace the properties
    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Add a behavior inside the ones the flags select
    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behaviors.push(behavior);
        self
    }

    /// Pass every produced instance through `decorate`
    pub fn decorate<F>(self, decorate: F) -> Self
    where
        F: Fn(Arc<T>) -> std::result::Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        self.behavior(Behavior::Decorating(Decorator::new::<T, F>(decorate)))
    }

    /// Explicit constructor parameters, one per argument
    pub fn params(mut self, params: Vec<Parameter>) -> Self {
        self.constructor_params = Some(params);
        self
    }

    /// Explicit parameters of one member injection point
    pub fn member_params(mut self, target: Target, params: Vec<Parameter>) -> Self {
        self.member_params.push((target, params));
        self
    }

    /// Injection strategy; overrides the `injection` property
    pub fn injection(mut self, injection: Injection) -> Self {
        self.injection = Some(injection);
        self
    }

    #[inline]
    pub fn key(&self) -> &Key {
        &self.key
    }

    #[inline]
    pub fn metadata(&self) -> &TypeMetadata<T> {
        &self.metadata
    }

    /// Build the adapter chain with container `defaults` under the component's properties
    pub(crate) fn assemble(self, defaults: &Properties) -> Result<Assembled> {
        let plan = self.properties.merged_over(defaults).plan()?;
        let injection = self.injection.or(plan.injection).unwrap_or_default();

        #[cfg(feature = "logging")]
        trace!(
            target: "wiring_injector",
            key = %self.key,
            injection = ?injection,
            behaviors = ?plan.behaviors,
            "Assembling component"
        );

        let options = InjectorOptions {
            use_names: plan.use_names,
            optional: plan.optional,
            constructor_params: self.constructor_params,
            member_params: self.member_params,
        };
        let leaf = injector::build(self.key, self.metadata, injection, options)?;

        let mut behaviors = plan.behaviors;
        behaviors.extend(self.behaviors);
        let lazy = plan.lazy && !behaviors.iter().any(|b| matches!(b, Behavior::Automating));
        let adapter = behavior::compose(behaviors, leaf)?;
        Ok(Assembled { adapter, lazy })
    }
}

impl<T> fmt::Debug for Component<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("key", &self.key)
            .field("properties", &self.properties)
            .field("behaviors", &self.behaviors)
            .field("injection", &self.injection)
            .finish_non_exhaustive()
    }
}

/// An assembled adapter chain
pub(crate) struct Assembled {
    pub adapter: Box<dyn ComponentAdapter>,
    pub lazy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::injector::Discovery;
    use crate::{flags, Caching, Container, DiError, Lookup, Member};

    #[derive(Default)]
    struct Counter {
        hits: u32,
    }

    #[derive(Default)]
    struct Report {
        counter: Option<Arc<Counter>>,
    }

    impl Describe for Report {
        fn describe() -> TypeMetadata<Self> {
            TypeMetadata::new()
                .default_constructor()
                .member(Member::setter::<Counter>("set_counter", |r: &mut Report, c| r.counter = Some(c)))
        }
    }

    fn counter() -> Component<Counter> {
        Component::with_metadata(TypeMetadata::new().default_constructor())
    }

    #[test]
    fn test_assemble_applies_flags_then_explicit_behaviors() {
        let assembled = counter()
            .flag(flags::CACHE)
            .decorate(|c| Ok(Arc::new(Counter { hits: c.hits + 1 })))
            .assemble(&Properties::new())
            .unwrap();
        assert_eq!(
            assembled.adapter.chain(),
            vec![
                "Caching".to_string(),
                format!("Decorating({})", std::any::type_name::<Counter>()),
                format!("ConstructorInjector[{}]", std::any::type_name::<Counter>()),
            ]
        );
        assert!(!assembled.lazy);
    }

    #[test]
    fn test_container_defaults_apply_outermost() {
        let defaults = Properties::new().with(flags::CACHE);
        let assembled = counter().flag(flags::LOCK).flag(flags::LAZY).assemble(&defaults).unwrap();
        let chain = assembled.adapter.chain();
        assert_eq!(&chain[..2], &["Caching".to_string(), "Locking".to_string()]);
        assert!(assembled.lazy);
        assert!(assembled.adapter.find::<Caching>().is_some());
    }

    #[test]
    fn test_injection_property_selects_strategy() {
        let container = Container::new();
        container.register(counter()).unwrap();
        container
            .register(Component::<Report>::of().set(flags::INJECTION, "setter"))
            .unwrap();
        let report = container.get::<Report>().unwrap();
        assert!(report.counter.is_some());

        let explicit = Component::<Report>::of()
            .named("explicit")
            .set(flags::INJECTION, "constructor")
            .injection(Injection::Members(Discovery::setters()));
        container.register(explicit).unwrap();
        let chain = container.get_adapter(&Key::named("explicit")).unwrap().chain();
        assert!(chain[0].starts_with("MemberInjector["));
    }

    #[test]
    fn test_decorator_runs_on_each_instance() {
        let container = Container::new();
        container
            .register(counter().decorate(|c| Ok(Arc::new(Counter { hits: c.hits + 10 }))))
            .unwrap();
        assert_eq!(container.get::<Counter>().unwrap().hits, 10);
    }

    #[test]
    fn test_unknown_property_fails_registration() {
        let container = Container::new();
        let err = container.register(counter().flag("cahce")).unwrap_err();
        assert!(matches!(err, DiError::Composition(_)));
        assert!(container.is_empty());
    }
}
