//! Per-resolution state
//!
//! Every public resolution entry point creates a fresh [`Resolution`] and
//! threads it, wrapped in a [`Resolver`], through every nested `produce`,
//! `verify` and `decorate_existing` call. The resolution records which
//! implementation types are currently being built on this call stack; entering
//! one of them again is a cycle.
//!
//! The state lives on the caller's stack, so concurrent resolutions on other
//! threads never observe it, and it is gone when the outermost call returns.

use crate::{AnyArc, Container, DiError, Injectable, Key, Result, TypeKey};
use crate::provider::{downcast, downcast_dyn};
use std::borrow::Cow;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Cycle-tracking state of one logical resolution
#[derive(Default)]
pub struct Resolution {
    visiting: RefCell<Vec<TypeKey>>,
}

impl Resolution {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Mark `ty` as being built until the returned guard drops.
    fn enter(&self, ty: TypeKey) -> Result<Visit<'_>> {
        let mut visiting = self.visiting.borrow_mut();
        if visiting.contains(&ty) {
            let chain = std::iter::once(ty.name())
                .chain(visiting.iter().rev().map(TypeKey::name))
                .collect();

            #[cfg(feature = "logging")]
            trace!(
                target: "wiring_injector",
                implementation = ty.name(),
                depth = visiting.len(),
                "Cycle detected"
            );

            return Err(DiError::CyclicDependency { chain });
        }
        visiting.push(ty);
        Ok(Visit { resolution: self })
    }

    /// Number of implementation types currently being built
    pub fn depth(&self) -> usize {
        self.visiting.borrow().len()
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolution")
            .field("visiting", &*self.visiting.borrow())
            .finish()
    }
}

/// Guard of one entered implementation type; leaving pops it, success or not.
#[must_use]
pub(crate) struct Visit<'a> {
    resolution: &'a Resolution,
}

impl Drop for Visit<'_> {
    fn drop(&mut self) {
        self.resolution.visiting.borrow_mut().pop();
    }
}

/// A container seen from inside one resolution.
///
/// Adapters receive a `Resolver` instead of a bare [`Container`]; every lookup
/// made through it shares the cycle-tracking state of the enclosing call.
#[derive(Clone, Copy)]
pub struct Resolver<'a> {
    container: &'a Container,
    resolution: &'a Resolution,
}

impl<'a> Resolver<'a> {
    pub(crate) fn new(container: &'a Container, resolution: &'a Resolution) -> Self {
        Self { container, resolution }
    }

    /// The container this resolver looks components up in
    #[inline]
    pub fn container(&self) -> &'a Container {
        self.container
    }

    #[inline]
    pub(crate) fn resolution(&self) -> &'a Resolution {
        self.resolution
    }

    /// Enter the construction of `implementation`.
    pub(crate) fn visit(&self, implementation: TypeKey) -> Result<Visit<'a>> {
        self.resolution.enter(implementation)
    }

    /// The same resolution, looking components up in `container`
    pub(crate) fn within<'b>(&self, container: &'b Container) -> Resolver<'b>
    where
        'a: 'b,
    {
        Resolver {
            container,
            resolution: self.resolution,
        }
    }
}

impl fmt::Debug for Resolver<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("container", self.container)
            .field("resolution", self.resolution)
            .finish()
    }
}

/// Typed component lookup, shared by [`Container`] and [`Resolver`].
///
/// The three required methods work on erased instances; the provided ones add
/// the downcasts. Absence is `Ok(None)` for the erased and `find` forms and
/// [`DiError::NotFound`] for the `get` forms.
///
/// # Examples
///
/// ```rust
/// use wiring_injector::{Container, Lookup};
///
/// struct Config { port: u16 }
///
/// let container = Container::new();
/// container.singleton(Config { port: 8080 }).unwrap();
///
/// assert_eq!(container.get::<Config>().unwrap().port, 8080);
/// assert!(container.find::<String>().unwrap().is_none());
/// ```
pub trait Lookup {
    /// Resolve `key`.
    ///
    /// A type key resolves by type and yields the instance viewed as that type;
    /// name and qualified keys yield the component's own instance.
    fn lookup(&self, key: &Key) -> Result<Option<AnyArc>>;

    /// Resolve `key` and view the instance as `ty`
    fn lookup_as(&self, key: &Key, ty: TypeKey) -> Result<Option<AnyArc>>;

    /// Every local component assignable to `ty`, in registration order, viewed as `ty`
    fn lookup_all(&self, ty: TypeKey) -> Result<Vec<AnyArc>>;

    /// Resolve a component by type
    fn get<T: Injectable>(&self) -> Result<Arc<T>> {
        self.find::<T>()?.ok_or_else(DiError::not_found::<T>)
    }

    /// Resolve a component by type, `None` when absent
    fn find<T: Injectable>(&self) -> Result<Option<Arc<T>>> {
        let key = Key::of::<T>();
        self.lookup(&key)?.map(|instance| downcast(&key, instance)).transpose()
    }

    /// Resolve a component by type, discarding errors
    fn try_get<T: Injectable>(&self) -> Option<Arc<T>> {
        self.get::<T>().ok()
    }

    /// Resolve a component through an interface (`dyn Trait`) type
    fn get_dyn<I: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<I>> {
        let key = Key::of::<I>();
        match self.lookup(&key)? {
            Some(instance) => downcast_dyn(&key, instance),
            None => Err(DiError::not_found::<I>()),
        }
    }

    /// Resolve the component registered under `name`, viewed as `T`
    fn get_named<T: Injectable>(&self, name: impl Into<Cow<'static, str>>) -> Result<Arc<T>> {
        self.get_keyed(&Key::named(name))
    }

    /// Resolve the component registered under `key`, viewed as `T`
    fn get_keyed<T: Injectable>(&self, key: &Key) -> Result<Arc<T>> {
        match self.lookup_as(key, TypeKey::of::<T>())? {
            Some(instance) => downcast(key, instance),
            None => Err(DiError::NotFound { key: key.to_string() }),
        }
    }

    /// Resolve the component registered under `key`, viewed through interface `I`
    fn get_keyed_dyn<I: ?Sized + Send + Sync + 'static>(&self, key: &Key) -> Result<Arc<I>> {
        match self.lookup_as(key, TypeKey::of::<I>())? {
            Some(instance) => downcast_dyn(key, instance),
            None => Err(DiError::NotFound { key: key.to_string() }),
        }
    }

    /// Every local component assignable to `T`
    fn get_all<T: Injectable>(&self) -> Result<Vec<Arc<T>>> {
        let key = Key::of::<T>();
        self.lookup_all(TypeKey::of::<T>())?
            .into_iter()
            .map(|instance| downcast(&key, instance))
            .collect()
    }

    /// Every local component assignable to interface `I`
    fn get_all_dyn<I: ?Sized + Send + Sync + 'static>(&self) -> Result<Vec<Arc<I>>> {
        let key = Key::of::<I>();
        self.lookup_all(TypeKey::of::<I>())?
            .into_iter()
            .map(|instance| downcast_dyn(&key, instance))
            .collect()
    }
}

impl Lookup for Resolver<'_> {
    fn lookup(&self, key: &Key) -> Result<Option<AnyArc>> {
        self.container.lookup_in(key, self.resolution)
    }

    fn lookup_as(&self, key: &Key, ty: TypeKey) -> Result<Option<AnyArc>> {
        self.container.lookup_as_in(key, ty, self.resolution)
    }

    fn lookup_all(&self, ty: TypeKey) -> Result<Vec<AnyArc>> {
        self.container.lookup_all_in(ty, self.resolution)
    }
}
