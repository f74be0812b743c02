//! Provider functions
//!
//! A [`Provider`] builds a component with a closure instead of a described
//! constructor. It either declares its dependencies, which are then resolved
//! by type like constructor arguments, or receives the in-flight [`Resolver`]
//! and looks up whatever it needs.

use crate::adapter::ComponentAdapter;
use crate::guard::Resolver;
use crate::lifecycle::ErasedHooks;
use crate::metadata::{Args, Dependency};
use crate::parameter::{Parameter, Site};
use crate::{AnyArc, BoxError, DiError, Injectable, Key, Provision, Result, TypeKey, TypeMetadata};
use std::any::Any;
use std::borrow::Cow;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

type ArgsFn<T> = Arc<dyn Fn(&mut Args) -> std::result::Result<T, BoxError> + Send + Sync>;
type ResolverFn<T> = Arc<dyn Fn(&Resolver<'_>) -> std::result::Result<T, BoxError> + Send + Sync>;

enum Build<T> {
    Args(ArgsFn<T>),
    Resolver(ResolverFn<T>),
}

impl<T> Clone for Build<T> {
    fn clone(&self) -> Self {
        match self {
            Build::Args(f) => Build::Args(Arc::clone(f)),
            Build::Resolver(f) => Build::Resolver(Arc::clone(f)),
        }
    }
}

/// A closure producing instances of `T`
pub struct Provider<T> {
    deps: Vec<Dependency>,
    build: Build<T>,
}

impl<T> Clone for Provider<T> {
    fn clone(&self) -> Self {
        Self {
            deps: self.deps.clone(),
            build: self.build.clone(),
        }
    }
}

impl<T: Injectable> Provider<T> {
    /// A provider reading declared dependencies from [`Args`]
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(&mut Args) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            deps: Vec::new(),
            build: Build::Args(Arc::new(build)),
        }
    }

    /// A provider looking its dependencies up itself
    pub fn from_fn<F>(build: F) -> Self
    where
        F: Fn(&Resolver<'_>) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            deps: Vec::new(),
            build: Build::Resolver(Arc::new(build)),
        }
    }

    /// A provider without dependencies
    pub fn from_factory<F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self::new(move |_| Ok(factory()))
    }

    pub fn arg<D: ?Sized + 'static>(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.deps.push(Dependency::one::<D>(name));
        self
    }

    pub fn optional_arg<D: ?Sized + 'static>(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.deps.push(Dependency::optional::<D>(name));
        self
    }

    pub fn all_arg<D: ?Sized + 'static>(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.deps.push(Dependency::all::<D>(name));
        self
    }

    #[inline]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.deps
    }
}

/// Adapter producing instances with a [`Provider`]
pub struct ProviderAdapter<T> {
    key: Key,
    implementation: TypeKey,
    provisions: Vec<Provision>,
    provider: Provider<T>,
    hooks: ErasedHooks,
}

impl<T: Injectable> ProviderAdapter<T> {
    pub fn new(key: impl Into<Key>, provider: Provider<T>) -> Self {
        Self {
            key: key.into(),
            implementation: TypeKey::of::<T>(),
            provisions: vec![Provision::itself::<T>()],
            provider,
            hooks: ErasedHooks::none(),
        }
    }

    /// Adapter with the provisions and lifecycle hooks of `metadata`
    pub fn with_metadata(key: impl Into<Key>, provider: Provider<T>, metadata: &TypeMetadata<T>) -> Self {
        Self {
            key: key.into(),
            implementation: TypeKey::of::<T>(),
            provisions: metadata.provisions().to_vec(),
            provider,
            hooks: metadata.hooks().erase(),
        }
    }

    fn missing(&self, unresolved: Vec<String>) -> DiError {
        DiError::UnsatisfiedDependency {
            type_name: self.implementation.name(),
            unresolved,
        }
    }
}

impl<I: ?Sized + Send + Sync + 'static> ProviderAdapter<Arc<I>> {
    /// Adapter whose provider yields values only known through interface `I`
    pub fn for_dyn(key: impl Into<Key>, provider: Provider<Arc<I>>) -> Self {
        Self {
            key: key.into(),
            implementation: TypeKey::of::<I>(),
            provisions: vec![Provision::view::<I>()],
            provider,
            hooks: ErasedHooks::none(),
        }
    }
}

impl<T: Injectable> ComponentAdapter for ProviderAdapter<T> {
    fn key(&self) -> &Key {
        &self.key
    }

    fn implementation(&self) -> TypeKey {
        self.implementation
    }

    fn provisions(&self) -> &[Provision] {
        &self.provisions
    }

    fn produce(&self, resolver: &Resolver<'_>) -> Result<AnyArc> {
        let _visit = resolver.visit(self.implementation)?;

        #[cfg(feature = "logging")]
        trace!(
            target: "wiring_injector",
            key = %self.key,
            implementation = self.implementation.name(),
            "Producing component with provider"
        );

        let type_name = self.implementation.name();
        let value = match &self.provider.build {
            Build::Resolver(build) => build(resolver).map_err(|e| DiError::instantiation(type_name, e))?,
            Build::Args(build) => {
                let mut values = Vec::with_capacity(self.provider.deps.len());
                let mut unresolved = Vec::new();
                for dep in &self.provider.deps {
                    let site = Site {
                        binding: dep.name(),
                        requester: &self.key,
                        use_names: false,
                    };
                    match Parameter::auto().resolve(dep, &site, resolver)? {
                        Some(value) => values.push(value),
                        None => unresolved.push(dep.to_string()),
                    }
                }
                if !unresolved.is_empty() {
                    return Err(self.missing(unresolved));
                }
                build(&mut Args::new(values)).map_err(|e| DiError::instantiation(type_name, e))?
            }
        };
        Ok(Arc::new(value))
    }

    fn verify(&self, resolver: &Resolver<'_>) -> Result<()> {
        let _visit = resolver.visit(self.implementation)?;
        let mut unresolved = Vec::new();
        for dep in &self.provider.deps {
            let site = Site {
                binding: dep.name(),
                requester: &self.key,
                use_names: false,
            };
            if !Parameter::auto().verify(dep, &site, resolver)? {
                unresolved.push(dep.to_string());
            }
        }
        if unresolved.is_empty() {
            Ok(())
        } else {
            Err(self.missing(unresolved))
        }
    }

    fn describe(&self) -> String {
        format!("Provider[{}]", self.implementation)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn hooks(&self) -> ErasedHooks {
        self.hooks.clone()
    }
}
