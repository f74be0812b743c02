//! Component container
//!
//! The `Container` is the core of the DI system. It owns the adapters
//! registered in it, resolves keys through its parent chain, records the
//! order in which components were first instantiated, and sequences
//! start/stop/dispose over its components and child containers.

use crate::adapter::{ComponentAdapter, ComponentVisitor, InstanceAdapter, ParentAdapter};
use crate::behavior::Caching;
use crate::component::Component;
use crate::factory::{Provider, ProviderAdapter};
use crate::guard::{Lookup, Resolution, Resolver};
use crate::lifecycle::{LifecycleOperation, LifecycleState, StateMachine};
use crate::storage::AdapterStorage;
use crate::{AnyArc, Describe, DiError, Injectable, Key, Properties, Result, TypeKey};
use parking_lot::{Mutex, ReentrantMutex};
use std::any::Any;
use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

#[cfg(feature = "logging")]
use tracing::{debug, trace, warn};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Late-binding hook consulted when a lookup finds nothing in the whole chain
pub type NotFoundHook = Arc<dyn Fn(&Container, &Key) -> Option<AnyArc> + Send + Sync>;

struct ContainerInner {
    id: u64,
    name: Option<Cow<'static, str>>,
    storage: AdapterStorage,
    /// Strong: a child keeps its ancestors alive
    parent: Option<Container>,
    /// Weak: a parent enumerates its children but does not own them
    children: Mutex<Vec<Weak<ContainerInner>>>,
    /// Ids of the children this container started and must stop
    started_children: Mutex<HashSet<u64>>,
    /// Serializes lifecycle operations and structural mutation
    lock: ReentrantMutex<()>,
    state: StateMachine,
    defaults: Properties,
    not_found: Option<NotFoundHook>,
    depth: u32,
}

/// Hierarchical component container.
///
/// Cloning is cheap and yields a handle to the same container.
///
/// # Examples
///
/// ```rust
/// use wiring_injector::{Container, Lookup};
///
/// struct Database { url: String }
///
/// let root = Container::new();
/// root.singleton(Database { url: "postgres://localhost".into() }).unwrap();
///
/// let request = root.make_child();
/// assert_eq!(request.get::<Database>().unwrap().url, "postgres://localhost");
/// ```
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

/// Configuration of a root container
#[derive(Default)]
pub struct ContainerBuilder {
    name: Option<Cow<'static, str>>,
    defaults: Properties,
    not_found: Option<NotFoundHook>,
}

impl ContainerBuilder {
    /// Name used in diagnostics instead of `container#<id>`
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Properties applied under every component's own properties
    pub fn defaults(mut self, defaults: Properties) -> Self {
        self.defaults = defaults;
        self
    }

    /// Turn a default flag on
    pub fn flag(mut self, flag: impl Into<Cow<'static, str>>) -> Self {
        self.defaults = self.defaults.with(flag);
        self
    }

    /// Hook synthesizing a component when a lookup finds nothing
    pub fn on_not_found<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Container, &Key) -> Option<AnyArc> + Send + Sync + 'static,
    {
        self.not_found = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Container {
        Container::from_parts(self.name, None, self.defaults, self.not_found, 0)
    }
}

impl Container {
    /// Create a new root container.
    #[inline]
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::default()
    }

    fn from_parts(
        name: Option<Cow<'static, str>>,
        parent: Option<Container>,
        defaults: Properties,
        not_found: Option<NotFoundHook>,
        depth: u32,
    ) -> Self {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);

        #[cfg(feature = "logging")]
        debug!(
            target: "wiring_injector",
            container = id,
            depth,
            "Creating container"
        );

        Self {
            inner: Arc::new(ContainerInner {
                id,
                name,
                storage: AdapterStorage::new(),
                parent,
                children: Mutex::new(Vec::new()),
                started_children: Mutex::new(HashSet::new()),
                lock: ReentrantMutex::new(()),
                state: StateMachine::new(),
                defaults,
                not_found,
                depth,
            }),
        }
    }

    /// Create a child container registered with this one.
    ///
    /// The child resolves keys it lacks through this container, inherits its
    /// default properties and not-found hook, and is started, stopped and
    /// disposed along with it.
    pub fn make_child(&self) -> Self {
        let child = Self::from_parts(
            None,
            Some(self.clone()),
            self.inner.defaults.clone(),
            self.inner.not_found.clone(),
            self.inner.depth + 1,
        );
        self.inner.children.lock().push(Arc::downgrade(&child.inner));
        child
    }

    /// Alias for [`Container::make_child`]
    #[inline]
    pub fn scope(&self) -> Self {
        self.make_child()
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    #[inline]
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }

    #[inline]
    pub fn parent(&self) -> Option<&Container> {
        self.inner.parent.as_ref()
    }

    /// Number of ancestors
    #[inline]
    pub fn depth(&self) -> u32 {
        self.inner.depth
    }

    /// Number of local registrations
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.storage.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.storage.is_empty()
    }

    /// Local keys in registration order
    pub fn keys(&self) -> Vec<Key> {
        self.inner
            .storage
            .ordered()
            .into_iter()
            .map(|registered| registered.adapter.key().clone())
            .collect()
    }

    /// Local adapters in registration order
    pub fn adapters(&self) -> Vec<Arc<dyn ComponentAdapter>> {
        self.inner
            .storage
            .ordered()
            .into_iter()
            .map(|registered| registered.adapter)
            .collect()
    }

    /// Local keys in first-resolution order
    pub fn instantiation_order(&self) -> Vec<Key> {
        self.inner.storage.instantiation_order()
    }

    /// Whether `key` is registered locally
    #[inline]
    pub fn contains_key(&self, key: &Key) -> bool {
        self.inner.storage.contains(key)
    }

    /// Whether a component of type `T` is resolvable here or in an ancestor
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        // ambiguity still means there are candidates
        !matches!(self.has_component(&Key::of::<T>()), Ok(false))
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register a described component
    pub fn register<T: Injectable>(&self, component: Component<T>) -> Result<Arc<dyn ComponentAdapter>> {
        let assembled = component.assemble(&self.inner.defaults)?;
        self.add(assembled.adapter, assembled.lazy)
    }

    /// Register `T` under its own type with the metadata of its [`Describe`] implementation
    pub fn register_type<T: Describe>(&self) -> Result<Arc<dyn ComponentAdapter>> {
        self.register(Component::<T>::of())
    }

    /// Register a pre-built value
    pub fn register_instance<T: Injectable>(
        &self,
        key: impl Into<Key>,
        value: T,
    ) -> Result<Arc<dyn ComponentAdapter>> {
        self.add(Box::new(InstanceAdapter::new(key, Arc::new(value))), false)
    }

    /// Register a hand-built adapter
    pub fn register_adapter<A: ComponentAdapter>(&self, adapter: A) -> Result<Arc<dyn ComponentAdapter>> {
        self.add(Box::new(adapter), false)
    }

    /// Register a boxed adapter chain
    pub fn register_boxed(&self, adapter: Box<dyn ComponentAdapter>) -> Result<Arc<dyn ComponentAdapter>> {
        self.add(adapter, false)
    }

    /// Register a provider function
    pub fn register_provider<T: Injectable>(
        &self,
        key: impl Into<Key>,
        provider: Provider<T>,
    ) -> Result<Arc<dyn ComponentAdapter>> {
        self.add(Box::new(ProviderAdapter::new(key, provider)), false)
    }

    /// Register an instance under its own type, shared by every resolution.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wiring_injector::{Container, Lookup};
    /// use std::sync::Arc;
    ///
    /// struct Database { url: String }
    ///
    /// let container = Container::new();
    /// container.singleton(Database { url: "postgres://localhost".into() }).unwrap();
    ///
    /// let a = container.get::<Database>().unwrap();
    /// let b = container.get::<Database>().unwrap();
    /// assert!(Arc::ptr_eq(&a, &b));
    /// ```
    pub fn singleton<T: Injectable>(&self, instance: T) -> Result<Arc<dyn ComponentAdapter>> {
        self.register_instance(Key::of::<T>(), instance)
    }

    /// Register a factory called once, on first resolution
    pub fn lazy<T: Injectable, F>(&self, factory: F) -> Result<Arc<dyn ComponentAdapter>>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let provider = ProviderAdapter::new(Key::of::<T>(), Provider::from_factory(factory));
        self.add(Box::new(Caching::new(Box::new(provider))), true)
    }

    /// Register a factory called on every resolution.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use wiring_injector::{Container, Lookup};
    /// use std::sync::atomic::{AtomicU64, Ordering};
    ///
    /// static COUNTER: AtomicU64 = AtomicU64::new(0);
    ///
    /// struct RequestId(u64);
    ///
    /// let container = Container::new();
    /// container.transient(|| RequestId(COUNTER.fetch_add(1, Ordering::SeqCst))).unwrap();
    ///
    /// let id1 = container.get::<RequestId>().unwrap();
    /// let id2 = container.get::<RequestId>().unwrap();
    /// assert_ne!(id1.0, id2.0);
    /// ```
    pub fn transient<T: Injectable, F>(&self, factory: F) -> Result<Arc<dyn ComponentAdapter>>
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.register_provider(Key::of::<T>(), Provider::from_factory(factory))
    }

    fn add(&self, adapter: Box<dyn ComponentAdapter>, lazy: bool) -> Result<Arc<dyn ComponentAdapter>> {
        let adapter: Arc<dyn ComponentAdapter> = Arc::from(adapter);
        if let Some(ty) = adapter.key().type_key() {
            if !adapter.provides(ty) {
                return Err(DiError::IncompatibleKey {
                    key: adapter.key().to_string(),
                    type_name: adapter.implementation().name(),
                });
            }
        }

        let _guard = self.inner.lock.lock();
        self.inner.storage.insert(Arc::clone(&adapter), lazy)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "wiring_injector",
            container = %self,
            key = %adapter.key(),
            implementation = adapter.implementation().name(),
            chain = ?adapter.chain(),
            lazy,
            "Registered component"
        );

        Ok(adapter)
    }

    /// Remove the local registration under `key`.
    ///
    /// On a started container the removed component is stopped and disposed
    /// before it is unlinked. A failing hook is reported after the
    /// registration is gone; the component still ends disposed.
    pub fn remove(&self, key: &Key) -> Result<Option<Arc<dyn ComponentAdapter>>> {
        let _guard = self.inner.lock.lock();
        let Some(adapter) = self.inner.storage.get(key) else {
            return Ok(None);
        };

        let disposed = if self.state().is_started() && adapter.has_lifecycle() {
            adapter.dispose()
        } else {
            Ok(())
        };
        self.inner.storage.remove(key);

        #[cfg(feature = "logging")]
        debug!(
            target: "wiring_injector",
            container = %self,
            key = %key,
            disposed = disposed.is_ok(),
            "Removed component"
        );

        disposed.map(|()| Some(adapter))
    }

    // =========================================================================
    // Resolution
    // =========================================================================

    /// Resolve `key`, `None` when nothing provides it
    #[inline]
    pub fn resolve(&self, key: &Key) -> Result<Option<AnyArc>> {
        self.lookup(key)
    }

    /// Resolve by type, `None` when nothing provides it
    #[inline]
    pub fn resolve_type(&self, ty: TypeKey) -> Result<Option<AnyArc>> {
        self.lookup(&Key::Type(ty))
    }

    /// Every local component assignable to `ty`, in registration order.
    ///
    /// Ancestors are not consulted.
    #[inline]
    pub fn resolve_all(&self, ty: TypeKey) -> Result<Vec<AnyArc>> {
        self.lookup_all(ty)
    }

    /// The adapter registered under `key`, wrapped in a [`ParentAdapter`] when it
    /// lives in an ancestor
    pub fn get_adapter(&self, key: &Key) -> Option<Arc<dyn ComponentAdapter>> {
        if let Some(adapter) = self.inner.storage.get(key) {
            return Some(adapter);
        }
        let mut current = self.parent();
        while let Some(container) = current {
            if let Some(adapter) = container.inner.storage.get(key) {
                return Some(Arc::new(ParentAdapter::new(container.clone(), adapter)));
            }
            current = container.parent();
        }
        None
    }

    /// Whether `key` resolves here or in an ancestor, without producing anything
    pub fn has_component(&self, key: &Key) -> Result<bool> {
        Ok(match key {
            Key::Type(ty) => self.locate_by_type(*ty, None, None, false)?.is_some(),
            _ => self.locate_key(key).is_some(),
        })
    }

    /// Inject the members of an existing value as the component under `key` would be
    pub fn inject_into(&self, key: &Key, target: &mut dyn Any) -> Result<()> {
        let located = self.locate_key(key).ok_or_else(|| DiError::NotFound { key: key.to_string() })?;
        let resolution = Resolution::new();
        located
            .adapter
            .decorate_existing(&Resolver::new(&located.owner, &resolution), target, None)
    }

    /// Inject the members of `target` as the component registered under its type would be
    pub fn inject<T: Injectable>(&self, target: &mut T) -> Result<()> {
        self.inject_into(&Key::of::<T>(), target)
    }

    pub(crate) fn lookup_in(&self, key: &Key, resolution: &Resolution) -> Result<Option<AnyArc>> {
        match key {
            Key::Type(ty) => self.lookup_as_in(key, *ty, resolution),
            _ => match self.locate_key(key) {
                Some(located) => located.produce(resolution).map(Some),
                None => Ok(self.not_found(key)),
            },
        }
    }

    pub(crate) fn lookup_as_in(&self, key: &Key, ty: TypeKey, resolution: &Resolution) -> Result<Option<AnyArc>> {
        let located = match key {
            Key::Type(requested) => self.locate_by_type(*requested, None, None, false)?,
            _ => self.locate_key(key),
        };
        match located {
            Some(located) => located.produce_as(ty, resolution).map(Some),
            None => Ok(self.not_found(key)),
        }
    }

    pub(crate) fn lookup_all_in(&self, ty: TypeKey, resolution: &Resolution) -> Result<Vec<AnyArc>> {
        self.inner
            .storage
            .assignable(ty, None)
            .into_iter()
            .map(|adapter| {
                let instance = self.instantiate(adapter.key(), &adapter, resolution)?;
                adapter.view(&instance, ty)
            })
            .collect()
    }

    fn not_found(&self, key: &Key) -> Option<AnyArc> {
        let hook = self.inner.not_found.as_ref()?;
        let instance = hook(self, key);

        #[cfg(feature = "logging")]
        trace!(
            target: "wiring_injector",
            container = %self,
            key = %key,
            synthesized = instance.is_some(),
            "Consulted not-found hook"
        );

        instance
    }

    /// Produce through `adapter` in this container and record the instantiation.
    ///
    /// A lifecycle-bearing component first resolved while the container is
    /// started is started on the spot.
    pub(crate) fn instantiate(
        &self,
        key: &Key,
        adapter: &Arc<dyn ComponentAdapter>,
        resolution: &Resolution,
    ) -> Result<AnyArc> {
        let instance = adapter.produce(&Resolver::new(self, resolution))?;

        if self.inner.storage.record_instantiated(key) {
            #[cfg(feature = "logging")]
            trace!(
                target: "wiring_injector",
                container = %self,
                key = %key,
                "First instantiation"
            );
        }

        if adapter.has_lifecycle() && !adapter.is_started() && self.state().is_started() {
            let _guard = self.inner.lock.lock();
            if self.state().is_started() && !adapter.is_started() {
                #[cfg(feature = "logging")]
                debug!(
                    target: "wiring_injector",
                    container = %self,
                    key = %key,
                    "Starting lazily resolved component"
                );

                adapter.start()?;
            }
        }
        Ok(instance)
    }

    // =========================================================================
    // Location
    // =========================================================================

    fn located(&self, adapter: Arc<dyn ComponentAdapter>) -> Located {
        Located {
            owner: self.clone(),
            adapter,
        }
    }

    /// The registration under exactly `key`, nearest container first
    pub(crate) fn locate_key(&self, key: &Key) -> Option<Located> {
        self.locate_key_excluding(key, None)
    }

    /// Like `locate_key`, skipping a local registration under `exclude`
    fn locate_key_excluding(&self, key: &Key, exclude: Option<&Key>) -> Option<Located> {
        if exclude != Some(key) {
            if let Some(adapter) = self.inner.storage.get(key) {
                #[cfg(feature = "logging")]
                trace!(
                    target: "wiring_injector",
                    container = %self,
                    key = %key,
                    "Located by key"
                );

                return Some(self.located(adapter));
            }
        }
        self.parent()?.locate_key(key)
    }

    /// The component to use for a dependency of type `ty`.
    ///
    /// In order: with `use_names`, a component registered under the binding
    /// name; the component registered under `ty` itself; the single local
    /// component assignable to `ty`; with several, the one whose key names the
    /// binding; with none, the same search in the parent. `exclude` is the
    /// requesting component and is never its own candidate.
    pub(crate) fn locate_by_type(
        &self,
        ty: TypeKey,
        binding: Option<&str>,
        exclude: Option<&Key>,
        use_names: bool,
    ) -> Result<Option<Located>> {
        if let (true, Some(binding)) = (use_names, binding) {
            let by_name = Key::named(binding.to_string());
            if let Some(located) = self.locate_key_excluding(&by_name, exclude) {
                if located.provides(ty) {
                    return Ok(Some(located));
                }
            }
        }

        if let Some(located) = self.locate_key_excluding(&Key::Type(ty), exclude) {
            return Ok(Some(located));
        }

        let mut candidates = self.inner.storage.assignable(ty, exclude);
        match candidates.len() {
            0 => match self.parent() {
                Some(parent) => parent.locate_by_type(ty, binding, None, use_names),
                None => Ok(None),
            },
            1 => {
                let adapter = candidates.remove(0);

                #[cfg(feature = "logging")]
                trace!(
                    target: "wiring_injector",
                    container = %self,
                    requested = ty.name(),
                    key = %adapter.key(),
                    "Located single assignable candidate"
                );

                Ok(Some(self.located(adapter)))
            }
            _ => {
                if let Some(binding) = binding {
                    let mut matched: Vec<_> = candidates
                        .iter()
                        .filter(|adapter| adapter.key().name() == Some(binding))
                        .collect();
                    if matched.len() == 1 {
                        let adapter = Arc::clone(matched.remove(0));

                        #[cfg(feature = "logging")]
                        trace!(
                            target: "wiring_injector",
                            container = %self,
                            requested = ty.name(),
                            binding,
                            key = %adapter.key(),
                            "Name binding disambiguated candidates"
                        );

                        return Ok(Some(self.located(adapter)));
                    }
                }
                Err(DiError::AmbiguousResolution {
                    requested: ty.name(),
                    candidates: candidates.iter().map(|adapter| adapter.implementation().name()).collect(),
                })
            }
        }
    }

    /// Every component assignable to `ty` here and in the ancestors, root first.
    ///
    /// A registration shadows an ancestor's registration under the same key.
    pub(crate) fn locate_all(&self, ty: TypeKey, exclude: Option<&Key>) -> Vec<Located> {
        let mut found = match self.parent() {
            Some(parent) => parent.locate_all(ty, None),
            None => Vec::new(),
        };
        for adapter in self.inner.storage.assignable(ty, exclude) {
            found.retain(|located| located.adapter.key() != adapter.key());
            found.push(self.located(adapter));
        }
        found
    }

    // =========================================================================
    // Hierarchy
    // =========================================================================

    /// Live child containers
    pub fn children(&self) -> Vec<Container> {
        let mut children = self.inner.children.lock();
        children.retain(|child| child.strong_count() > 0);
        children
            .iter()
            .filter_map(Weak::upgrade)
            .map(|inner| Container { inner })
            .collect()
    }

    /// Enumerate `child` with this container's lifecycle.
    ///
    /// The child keeps its own parent; only lifecycle cascading and visiting
    /// follow the new link.
    pub fn add_child(&self, child: &Container) -> Result<()> {
        let mut current = Some(self);
        while let Some(container) = current {
            if container.id() == child.id() {
                return Err(DiError::composition(format!(
                    "{child} cannot be a child of itself or of its descendant {self}"
                )));
            }
            current = container.parent();
        }
        if child.encloses(self.id()) {
            return Err(DiError::composition(format!(
                "{child} already encloses {self} through its children"
            )));
        }

        let _guard = self.inner.lock.lock();
        let mut children = self.inner.children.lock();
        if children
            .iter()
            .any(|existing| existing.upgrade().is_some_and(|inner| inner.id == child.id()))
        {
            return Ok(());
        }
        children.push(Arc::downgrade(&child.inner));
        if self.state().is_started() && child.state().is_started() {
            self.inner.started_children.lock().insert(child.id());
        }

        #[cfg(feature = "logging")]
        debug!(
            target: "wiring_injector",
            container = %self,
            child = %child,
            "Added child container"
        );

        Ok(())
    }

    /// Whether the container `id` is reachable from this one through child links
    fn encloses(&self, id: u64) -> bool {
        let mut seen = HashSet::new();
        let mut pending = self.children();
        while let Some(container) = pending.pop() {
            if container.id() == id {
                return true;
            }
            if seen.insert(container.id()) {
                pending.extend(container.children());
            }
        }
        false
    }

    /// Stop enumerating `child`; `false` if it was not a child
    pub fn remove_child(&self, child: &Container) -> bool {
        let _guard = self.inner.lock.lock();
        let mut children = self.inner.children.lock();
        let mut removed = false;
        children.retain(|existing| match existing.upgrade() {
            Some(inner) if inner.id == child.id() => {
                removed = true;
                false
            }
            Some(_) => true,
            None => false,
        });
        self.inner.started_children.lock().remove(&child.id());
        removed
    }

    /// Walk this container, its adapter chains and its children with `visitor`
    pub fn accept(&self, visitor: &mut dyn ComponentVisitor) {
        if !visitor.visit_container(self) {
            return;
        }
        for adapter in self.adapters() {
            adapter.accept(visitor);
        }
        for child in self.children() {
            child.accept(visitor);
        }
        visitor.leave_container(self);
    }

    /// Verify every registration of this container and its children
    pub fn verify(&self) -> Result<()> {
        let mut errors = Vec::new();
        self.collect_verification(&mut errors);
        if errors.is_empty() {
            Ok(())
        } else {
            Err(DiError::Verification { errors })
        }
    }

    fn collect_verification(&self, errors: &mut Vec<DiError>) {
        for adapter in self.adapters() {
            let resolution = Resolution::new();
            if let Err(e) = adapter.verify(&Resolver::new(self, &resolution)) {
                errors.push(e);
            }
        }
        for child in self.children() {
            child.collect_verification(errors);
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    #[inline]
    pub fn state(&self) -> LifecycleState {
        self.inner.state.state()
    }

    /// Start the lifecycle-bearing components and the child containers.
    ///
    /// Non-lazy lifecycle components are instantiated in registration order,
    /// then started in instantiation order, so dependencies start first. On
    /// failure everything started by this call is stopped again and the
    /// container is left stopped.
    pub fn start(&self) -> Result<()> {
        let _guard = self.inner.lock.lock();
        self.inner.state.begin(LifecycleOperation::Start, self)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "wiring_injector",
            container = %self,
            components = self.len(),
            "Starting container"
        );

        let mut started = Vec::new();
        let mut started_children = Vec::new();
        match self.start_all(&mut started, &mut started_children) {
            Ok(()) => {
                self.inner.state.finish(LifecycleState::Started);
                Ok(())
            }
            Err(e) => {
                #[cfg(feature = "logging")]
                warn!(
                    target: "wiring_injector",
                    container = %self,
                    error = %e,
                    "Start failed, rolling back"
                );

                self.roll_back(started, started_children);
                self.inner.state.finish(LifecycleState::Stopped);
                Err(e)
            }
        }
    }

    fn start_all(
        &self,
        started: &mut Vec<Arc<dyn ComponentAdapter>>,
        started_children: &mut Vec<Container>,
    ) -> Result<()> {
        let resolution = Resolution::new();
        for registered in self.inner.storage.ordered() {
            if !registered.lazy && registered.adapter.has_lifecycle() {
                self.instantiate(registered.adapter.key(), &registered.adapter, &resolution)?;
            }
        }

        for key in self.instantiation_order() {
            let Some(adapter) = self.inner.storage.get(&key) else {
                continue;
            };
            if adapter.has_lifecycle() && !adapter.is_started() {
                adapter.start()?;
                if adapter.is_started() {
                    started.push(adapter);
                }
            }
        }

        for child in self.children() {
            if child.state().can_start() {
                child.start()?;
                self.inner.started_children.lock().insert(child.id());
                started_children.push(child);
            }
        }
        Ok(())
    }

    fn roll_back(&self, started: Vec<Arc<dyn ComponentAdapter>>, started_children: Vec<Container>) {
        for child in started_children.into_iter().rev() {
            self.inner.started_children.lock().remove(&child.id());
            if let Err(_e) = child.stop() {
                #[cfg(feature = "logging")]
                warn!(
                    target: "wiring_injector",
                    container = %self,
                    child = %child,
                    error = %_e,
                    "Failed to stop child during rollback"
                );
            }
        }
        for adapter in started.into_iter().rev() {
            if let Err(_e) = adapter.stop() {
                #[cfg(feature = "logging")]
                warn!(
                    target: "wiring_injector",
                    container = %self,
                    key = %adapter.key(),
                    error = %_e,
                    "Failed to stop component during rollback"
                );
            }
        }
    }

    /// Stop the children this container started, then its started components
    /// in reverse instantiation order.
    pub fn stop(&self) -> Result<()> {
        let _guard = self.inner.lock.lock();
        self.inner.state.begin(LifecycleOperation::Stop, self)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "wiring_injector",
            container = %self,
            "Stopping container"
        );

        let mut first = None;
        let started: HashSet<u64> = std::mem::take(&mut *self.inner.started_children.lock());
        for child in self.children().into_iter().rev() {
            if started.contains(&child.id()) && child.state().can_stop() {
                if let Err(e) = child.stop() {
                    first.get_or_insert(e);
                }
            }
        }
        for key in self.instantiation_order().iter().rev() {
            let Some(adapter) = self.inner.storage.get(key) else {
                continue;
            };
            if adapter.has_lifecycle() && adapter.is_started() {
                if let Err(e) = adapter.stop() {
                    #[cfg(feature = "logging")]
                    warn!(
                        target: "wiring_injector",
                        container = %self,
                        key = %key,
                        error = %e,
                        "Failed to stop component"
                    );

                    first.get_or_insert(e);
                }
            }
        }

        self.inner.state.finish(LifecycleState::Stopped);
        first.map_or(Ok(()), Err)
    }

    /// Stop if started, then dispose the children and every lifecycle-bearing
    /// component in reverse instantiation order.
    ///
    /// Disposal continues past failures; the first one is returned.
    pub fn dispose(&self) -> Result<()> {
        let _guard = self.inner.lock.lock();
        let mut first = None;
        if self.state().is_started() {
            if let Err(e) = self.stop() {
                first = Some(e);
            }
        }
        self.inner.state.begin(LifecycleOperation::Dispose, self)?;

        #[cfg(feature = "logging")]
        debug!(
            target: "wiring_injector",
            container = %self,
            "Disposing container"
        );

        for child in self.children().into_iter().rev() {
            if child.state().can_dispose() {
                if let Err(e) = child.dispose() {
                    first.get_or_insert(e);
                }
            }
        }
        for key in self.instantiation_order().iter().rev() {
            let Some(adapter) = self.inner.storage.get(key) else {
                continue;
            };
            if adapter.has_lifecycle() {
                if let Err(e) = adapter.dispose() {
                    #[cfg(feature = "logging")]
                    warn!(
                        target: "wiring_injector",
                        container = %self,
                        key = %key,
                        error = %e,
                        "Failed to dispose component"
                    );

                    first.get_or_insert(e);
                }
            }
        }

        self.inner.state.finish(LifecycleState::Disposed);
        first.map_or(Ok(()), Err)
    }
}

impl Lookup for Container {
    fn lookup(&self, key: &Key) -> Result<Option<AnyArc>> {
        self.lookup_in(key, &Resolution::new())
    }

    fn lookup_as(&self, key: &Key, ty: TypeKey) -> Result<Option<AnyArc>> {
        self.lookup_as_in(key, ty, &Resolution::new())
    }

    fn lookup_all(&self, ty: TypeKey) -> Result<Vec<AnyArc>> {
        self.lookup_all_in(ty, &Resolution::new())
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Container {}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.name {
            Some(name) => f.write_str(name),
            None => write!(f, "container#{}", self.inner.id),
        }
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("component_count", &self.len())
            .field("depth", &self.inner.depth)
            .field("has_parent", &self.inner.parent.is_some())
            .field("state", &self.state())
            .finish()
    }
}

/// A registration found for a lookup, with the container that owns it
pub(crate) struct Located {
    owner: Container,
    adapter: Arc<dyn ComponentAdapter>,
}

impl Located {
    #[inline]
    pub(crate) fn provides(&self, ty: TypeKey) -> bool {
        self.adapter.provides(ty)
    }

    /// Produce in the owning container
    pub(crate) fn produce(&self, resolution: &Resolution) -> Result<AnyArc> {
        self.owner.instantiate(self.adapter.key(), &self.adapter, resolution)
    }

    /// Produce and view the instance as `ty`
    pub(crate) fn produce_as(&self, ty: TypeKey, resolution: &Resolution) -> Result<AnyArc> {
        let instance = self.produce(resolution)?;
        self.adapter.view(&instance, ty)
    }

    pub(crate) fn verify(&self, resolution: &Resolution) -> Result<()> {
        self.adapter.verify(&Resolver::new(&self.owner, resolution))
    }
}
