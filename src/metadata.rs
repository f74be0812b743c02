//! Injection metadata
//!
//! The engine never inspects types on its own. A type describes its
//! injection points once, through [`TypeMetadata`], either by implementing
//! [`Describe`] (by hand or with `#[derive(Describe)]`) or by passing the
//! metadata at registration.
//!
//! # Examples
//!
//! ```rust
//! use wiring_injector::{Constructor, Describe, TypeMetadata};
//! use std::sync::Arc;
//!
//! struct Logger;
//!
//! struct Service {
//!     logger: Arc<Logger>,
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
//! assert_eq!(Service::describe().constructors()[0].arity(), 1);
//! ```

use crate::lifecycle::{Lifecycle, LifecycleHooks};
use crate::provider::{downcast, downcast_dyn};
use crate::{AnyArc, BoxError, DiError, Injectable, Key, Provision, Result, TypeKey};
use std::borrow::Cow;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Injection metadata provider for a type
pub trait Describe: Injectable + Sized {
    fn describe() -> TypeMetadata<Self>;
}

/// How many components a dependency takes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// Exactly one component; absence is unsatisfied
    One,
    /// At most one component; absence yields `None`
    Optional,
    /// Every compatible component of the container and its ancestors
    All,
}

/// One declared dependency of an injection point
#[derive(Clone, PartialEq, Eq)]
pub struct Dependency {
    name: Cow<'static, str>,
    ty: TypeKey,
    shape: Shape,
}

impl Dependency {
    pub fn new(name: impl Into<Cow<'static, str>>, ty: TypeKey, shape: Shape) -> Self {
        Self {
            name: name.into(),
            ty,
            shape,
        }
    }

    pub fn one<D: ?Sized + 'static>(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, TypeKey::of::<D>(), Shape::One)
    }

    pub fn optional<D: ?Sized + 'static>(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, TypeKey::of::<D>(), Shape::Optional)
    }

    pub fn all<D: ?Sized + 'static>(name: impl Into<Cow<'static, str>>) -> Self {
        Self::new(name, TypeKey::of::<D>(), Shape::All)
    }

    /// Declared name, used as the default name binding
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    #[inline]
    pub fn shape(&self) -> Shape {
        self.shape
    }

    /// Whether absence of a candidate fails the injection point
    #[inline]
    pub fn is_required(&self) -> bool {
        self.shape == Shape::One
    }
}

impl fmt::Debug for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.shape {
            Shape::One => write!(f, "{}: {}", self.name, self.ty),
            Shape::Optional => write!(f, "{}: Option<{}>", self.name, self.ty),
            Shape::All => write!(f, "{}: Vec<{}>", self.name, self.ty),
        }
    }
}

/// A resolved dependency value
#[derive(Clone)]
pub(crate) enum ArgValue {
    One(AnyArc),
    Optional(Option<AnyArc>),
    All(Vec<AnyArc>),
}

/// Resolved arguments of one injection point, consumed in declaration order
pub struct Args {
    values: VecDeque<ArgValue>,
    position: usize,
}

impl Args {
    pub(crate) fn new(values: Vec<ArgValue>) -> Self {
        Self {
            values: values.into(),
            position: 0,
        }
    }

    /// Arguments left to consume
    #[inline]
    pub fn remaining(&self) -> usize {
        self.values.len()
    }

    fn take(&mut self) -> Result<ArgValue> {
        let position = self.position;
        self.position += 1;
        self.values
            .pop_front()
            .ok_or_else(|| DiError::composition(format!("argument #{position} was read but never declared")))
    }

    fn shape_error(&self, expected: &str) -> DiError {
        DiError::composition(format!(
            "argument #{} is not declared as {expected}",
            self.position.saturating_sub(1)
        ))
    }

    fn one(&mut self) -> Result<AnyArc> {
        match self.take()? {
            ArgValue::One(value) => Ok(value),
            _ => Err(self.shape_error("a required dependency")),
        }
    }

    fn optional(&mut self) -> Result<Option<AnyArc>> {
        match self.take()? {
            ArgValue::Optional(value) => Ok(value),
            _ => Err(self.shape_error("an optional dependency")),
        }
    }

    fn all(&mut self) -> Result<Vec<AnyArc>> {
        match self.take()? {
            ArgValue::All(values) => Ok(values),
            _ => Err(self.shape_error("a collection dependency")),
        }
    }

    pub fn next<D: Injectable>(&mut self) -> Result<Arc<D>> {
        downcast(&Key::of::<D>(), self.one()?)
    }

    pub fn next_dyn<I: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Arc<I>> {
        downcast_dyn(&Key::of::<I>(), self.one()?)
    }

    pub fn next_optional<D: Injectable>(&mut self) -> Result<Option<Arc<D>>> {
        self.optional()?
            .map(|value| downcast(&Key::of::<D>(), value))
            .transpose()
    }

    pub fn next_optional_dyn<I: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Option<Arc<I>>> {
        self.optional()?
            .map(|value| downcast_dyn(&Key::of::<I>(), value))
            .transpose()
    }

    pub fn next_all<D: Injectable>(&mut self) -> Result<Vec<Arc<D>>> {
        let key = Key::of::<D>();
        self.all()?.into_iter().map(|value| downcast(&key, value)).collect()
    }

    pub fn next_all_dyn<I: ?Sized + Send + Sync + 'static>(&mut self) -> Result<Vec<Arc<I>>> {
        let key = Key::of::<I>();
        self.all()?.into_iter().map(|value| downcast_dyn(&key, value)).collect()
    }
}

type BuildFn<T> = Arc<dyn Fn(&mut Args) -> std::result::Result<T, BoxError> + Send + Sync>;

/// A constructor: declared dependencies plus the closure building the value
pub struct Constructor<T> {
    deps: Vec<Dependency>,
    build: BuildFn<T>,
}

impl<T> Clone for Constructor<T> {
    fn clone(&self) -> Self {
        Self {
            deps: self.deps.clone(),
            build: Arc::clone(&self.build),
        }
    }
}

impl<T: Injectable> Constructor<T> {
    /// A constructor reading its arguments from [`Args`] in the order they are declared
    pub fn new<F>(build: F) -> Self
    where
        F: Fn(&mut Args) -> std::result::Result<T, BoxError> + Send + Sync + 'static,
    {
        Self {
            deps: Vec::new(),
            build: Arc::new(build),
        }
    }

    /// Declare a required argument
    pub fn arg<D: ?Sized + 'static>(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.deps.push(Dependency::one::<D>(name));
        self
    }

    /// Declare an argument that is `None` when nothing matches
    pub fn optional_arg<D: ?Sized + 'static>(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.deps.push(Dependency::optional::<D>(name));
        self
    }

    /// Declare an argument collecting every compatible component
    pub fn all_arg<D: ?Sized + 'static>(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.deps.push(Dependency::all::<D>(name));
        self
    }

    #[inline]
    pub fn arity(&self) -> usize {
        self.deps.len()
    }

    #[inline]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.deps
    }

    pub(crate) fn build(&self, mut args: Args) -> std::result::Result<T, BoxError> {
        (self.build)(&mut args)
    }
}

impl<T: Injectable + Default> Default for Constructor<T> {
    fn default() -> Self {
        Self::new(|_| Ok(T::default()))
    }
}

impl<T> fmt::Debug for Constructor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Constructor").field(&self.deps).finish()
    }
}

/// Kind of a member injection point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Field,
    Setter,
    Method,
}

type InjectFn<T> = Arc<dyn Fn(&mut T, &mut Args) -> std::result::Result<(), BoxError> + Send + Sync>;

/// A field, setter or method receiving dependencies after construction
pub struct Member<T> {
    name: Cow<'static, str>,
    kind: MemberKind,
    declared_by: Option<TypeKey>,
    marked: bool,
    deps: Vec<Dependency>,
    inject: InjectFn<T>,
}

impl<T> Clone for Member<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            kind: self.kind,
            declared_by: self.declared_by,
            marked: self.marked,
            deps: self.deps.clone(),
            inject: Arc::clone(&self.inject),
        }
    }
}

impl<T: Injectable> Member<T> {
    fn single(
        name: Cow<'static, str>,
        kind: MemberKind,
        dep: Dependency,
        inject: InjectFn<T>,
    ) -> Self {
        Self {
            name,
            kind,
            declared_by: None,
            marked: false,
            deps: vec![dep],
            inject,
        }
    }

    /// A field holding one component
    pub fn field<D: Injectable>(
        name: impl Into<Cow<'static, str>>,
        assign: impl Fn(&mut T, Arc<D>) + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        let dep = Dependency::one::<D>(name.clone());
        Self::single(
            name,
            MemberKind::Field,
            dep,
            Arc::new(move |target: &mut T, args: &mut Args| {
                assign(target, args.next::<D>()?);
                Ok(())
            }),
        )
    }

    /// A field holding one component viewed through interface `I`
    pub fn field_dyn<I: ?Sized + Send + Sync + 'static>(
        name: impl Into<Cow<'static, str>>,
        assign: impl Fn(&mut T, Arc<I>) + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        let dep = Dependency::one::<I>(name.clone());
        Self::single(
            name,
            MemberKind::Field,
            dep,
            Arc::new(move |target: &mut T, args: &mut Args| {
                assign(target, args.next_dyn::<I>()?);
                Ok(())
            }),
        )
    }

    /// A setter taking one component
    pub fn setter<D: Injectable>(
        name: impl Into<Cow<'static, str>>,
        set: impl Fn(&mut T, Arc<D>) + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        let dep = Dependency::one::<D>(name.clone());
        Self::single(
            name,
            MemberKind::Setter,
            dep,
            Arc::new(move |target: &mut T, args: &mut Args| {
                set(target, args.next::<D>()?);
                Ok(())
            }),
        )
    }

    /// A setter taking one component viewed through interface `I`
    pub fn setter_dyn<I: ?Sized + Send + Sync + 'static>(
        name: impl Into<Cow<'static, str>>,
        set: impl Fn(&mut T, Arc<I>) + Send + Sync + 'static,
    ) -> Self {
        let name = name.into();
        let dep = Dependency::one::<I>(name.clone());
        Self::single(
            name,
            MemberKind::Setter,
            dep,
            Arc::new(move |target: &mut T, args: &mut Args| {
                set(target, args.next_dyn::<I>()?);
                Ok(())
            }),
        )
    }

    /// A method taking any number of arguments, declared with [`Member::arg`] and friends
    pub fn method<F>(name: impl Into<Cow<'static, str>>, invoke: F) -> Self
    where
        F: Fn(&mut T, &mut Args) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            kind: MemberKind::Method,
            declared_by: None,
            marked: false,
            deps: Vec::new(),
            inject: Arc::new(invoke),
        }
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

    /// Carry the injection marker
    pub fn marked(mut self) -> Self {
        self.marked = true;
        self
    }

    /// Declare the member at hierarchy level `B` instead of the type itself
    pub fn declared_by<B: ?Sized + 'static>(mut self) -> Self {
        self.declared_by = Some(TypeKey::of::<B>());
        self
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn kind(&self) -> MemberKind {
        self.kind
    }

    #[inline]
    pub fn is_marked(&self) -> bool {
        self.marked
    }

    #[inline]
    pub fn dependencies(&self) -> &[Dependency] {
        &self.deps
    }

    /// Hierarchy level declaring the member
    #[inline]
    pub fn level(&self) -> TypeKey {
        self.declared_by.unwrap_or_else(TypeKey::of::<T>)
    }

    /// Name binding of dependency `index`: setters bind by the name without `setter_prefix`
    pub(crate) fn binding(&self, index: usize, setter_prefix: &str) -> &str {
        match self.kind {
            MemberKind::Setter => self.name.strip_prefix(setter_prefix).unwrap_or(self.name.as_ref()),
            _ => self.deps.get(index).map_or(&*self.name, |dep| dep.name()),
        }
    }

    pub(crate) fn inject(&self, target: &mut T, mut args: Args) -> std::result::Result<(), BoxError> {
        (self.inject)(target, &mut args)
    }
}

impl<T> fmt::Debug for Member<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("marked", &self.marked)
            .field("deps", &self.deps)
            .finish()
    }
}

/// Everything the engine knows about how to build and wire a type
pub struct TypeMetadata<T> {
    concrete: bool,
    hierarchy: Vec<TypeKey>,
    constructors: Vec<Constructor<T>>,
    members: Vec<Member<T>>,
    provisions: Vec<Provision>,
    hooks: LifecycleHooks<T>,
}

impl<T> Clone for TypeMetadata<T> {
    fn clone(&self) -> Self {
        Self {
            concrete: self.concrete,
            hierarchy: self.hierarchy.clone(),
            constructors: self.constructors.clone(),
            members: self.members.clone(),
            provisions: self.provisions.clone(),
            hooks: self.hooks.clone(),
        }
    }
}

impl<T: Injectable> Default for TypeMetadata<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Injectable> TypeMetadata<T> {
    /// Metadata of a concrete type with no injection points yet
    pub fn new() -> Self {
        Self {
            concrete: true,
            hierarchy: vec![TypeKey::of::<T>()],
            constructors: Vec::new(),
            members: Vec::new(),
            provisions: vec![Provision::itself::<T>()],
            hooks: LifecycleHooks::default(),
        }
    }

    /// Mark the type as not instantiable
    pub fn abstract_type(mut self) -> Self {
        self.concrete = false;
        self
    }

    /// Add a hierarchy level below the ones already declared and above the type itself.
    ///
    /// Declare levels from the root downward.
    pub fn extends<B: ?Sized + 'static>(mut self) -> Self {
        let at = self.hierarchy.len() - 1;
        self.hierarchy.insert(at, TypeKey::of::<B>());
        self
    }

    /// Make the type assignable to interface `I`
    pub fn implements<I, F>(mut self, cast: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        self.provisions.push(Provision::interface::<T, I, F>(cast));
        self
    }

    pub fn constructor(mut self, constructor: Constructor<T>) -> Self {
        self.constructors.push(constructor);
        self
    }

    /// Add the zero-argument constructor `T::default`
    pub fn default_constructor(self) -> Self
    where
        T: Default,
    {
        self.constructor(Constructor::default())
    }

    pub fn member(mut self, member: Member<T>) -> Self {
        self.members.push(member);
        self
    }

    /// Wire the [`Lifecycle`] implementation of `T` as its hooks
    pub fn lifecycle(mut self) -> Self
    where
        T: Lifecycle,
    {
        self.hooks = LifecycleHooks::from_trait();
        self
    }

    pub fn on_start(
        mut self,
        hook: impl Fn(&T) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_start(hook);
        self
    }

    pub fn on_stop(
        mut self,
        hook: impl Fn(&T) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_stop(hook);
        self
    }

    pub fn on_dispose(
        mut self,
        hook: impl Fn(&T) -> std::result::Result<(), BoxError> + Send + Sync + 'static,
    ) -> Self {
        self.hooks.on_dispose(hook);
        self
    }

    #[inline]
    pub fn is_concrete(&self) -> bool {
        self.concrete
    }

    /// Hierarchy levels, root first, ending with the type itself
    #[inline]
    pub fn hierarchy(&self) -> &[TypeKey] {
        &self.hierarchy
    }

    #[inline]
    pub fn constructors(&self) -> &[Constructor<T>] {
        &self.constructors
    }

    #[inline]
    pub fn members(&self) -> &[Member<T>] {
        &self.members
    }

    #[inline]
    pub fn provisions(&self) -> &[Provision] {
        &self.provisions
    }

    #[inline]
    pub fn hooks(&self) -> &LifecycleHooks<T> {
        &self.hooks
    }

    /// Whether instances are assignable to `ty`
    pub fn provides(&self, ty: TypeKey) -> bool {
        self.provisions.iter().any(|p| p.ty() == ty)
    }

    /// Whether any member carries the injection marker
    pub fn has_marked_members(&self) -> bool {
        self.members.iter().any(Member::is_marked)
    }
}

impl<T> fmt::Debug for TypeMetadata<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeMetadata")
            .field("concrete", &self.concrete)
            .field("hierarchy", &self.hierarchy)
            .field("constructors", &self.constructors)
            .field("members", &self.members)
            .field("provisions", &self.provisions)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Sink: Send + Sync {}

    #[derive(Default)]
    struct Base;

    #[derive(Default)]
    struct Pipe {
        sink: Option<Arc<dyn Sink>>,
    }

    impl Sink for Pipe {}

    #[test]
    fn test_hierarchy_is_root_first() {
        struct Root;
        let metadata = TypeMetadata::<Pipe>::new().extends::<Root>().extends::<Base>();
        assert_eq!(
            metadata.hierarchy(),
            &[TypeKey::of::<Root>(), TypeKey::of::<Base>(), TypeKey::of::<Pipe>()]
        );
    }

    #[test]
    fn test_provisions_include_self_and_interfaces() {
        let metadata = TypeMetadata::<Pipe>::new().implements::<dyn Sink, _>(|p| p as Arc<dyn Sink>);
        assert!(metadata.provides(TypeKey::of::<Pipe>()));
        assert!(metadata.provides(TypeKey::of::<dyn Sink>()));
        assert!(!metadata.provides(TypeKey::of::<Base>()));
    }

    #[test]
    fn test_args_are_consumed_in_order() {
        let mut args = Args::new(vec![
            ArgValue::One(Arc::new(7u32)),
            ArgValue::Optional(None),
            ArgValue::All(vec![Arc::new(1u8) as AnyArc, Arc::new(2u8)]),
        ]);
        assert_eq!(*args.next::<u32>().unwrap(), 7);
        assert!(args.next_optional::<String>().unwrap().is_none());
        assert_eq!(args.next_all::<u8>().unwrap().len(), 2);
        assert_eq!(args.remaining(), 0);
        assert!(args.next::<u32>().is_err());
    }

    #[test]
    fn test_args_shape_and_type_mismatch() {
        let mut args = Args::new(vec![ArgValue::One(Arc::new(7u32)), ArgValue::One(Arc::new(1u8))]);
        assert!(matches!(args.next::<String>(), Err(DiError::TypeMismatch { .. })));
        assert!(matches!(args.next_optional::<u8>(), Err(DiError::Composition(_))));
    }

    #[test]
    fn test_setter_binding_strips_prefix() {
        let member = Member::<Pipe>::setter::<Base>("set_base", |_, _| {});
        assert_eq!(member.binding(0, "set_"), "base");
        assert_eq!(member.binding(0, "with_"), "set_base");
        assert_eq!(member.level(), TypeKey::of::<Pipe>());

        let field = Member::<Pipe>::field_dyn::<dyn Sink>("sink", |p, s| p.sink = Some(s))
            .marked()
            .declared_by::<Base>();
        assert_eq!(field.binding(0, "set_"), "sink");
        assert_eq!(field.level(), TypeKey::of::<Base>());
        assert!(field.is_marked());
    }

    #[test]
    fn test_member_injects_through_args() {
        let member = Member::<Pipe>::field_dyn::<dyn Sink>("sink", |p, s| p.sink = Some(s));
        let view: Arc<dyn Sink> = Arc::new(Pipe::default());
        let mut pipe = Pipe::default();
        member
            .inject(&mut pipe, Args::new(vec![ArgValue::One(Arc::new(view))]))
            .unwrap();
        assert!(pipe.sink.is_some());
    }

    #[test]
    fn test_dependency_display() {
        assert_eq!(Dependency::one::<u32>("port").to_string(), "port: u32");
        assert_eq!(Dependency::optional::<u32>("port").to_string(), "port: Option<u32>");
    }
}
