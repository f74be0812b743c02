//! Component adapters
//!
//! An adapter is the unit of composition: it knows its key, the types its
//! instances are assignable to, and how to produce, verify and decorate an
//! instance. Behaviors wrap a delegate adapter; the leaf of every chain is an
//! injector, a provider or an [`InstanceAdapter`].

use crate::container::Container;
use crate::guard::Resolver;
use crate::lifecycle::{ComponentLifecycle, ErasedHooks};
use crate::{AnyArc, DiError, Injectable, Key, Provision, Result, TypeKey, TypeMetadata};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Common contract of every adapter and behavior
pub trait ComponentAdapter: Send + Sync + 'static {
    /// Key the component is registered under
    fn key(&self) -> &Key;

    /// Implementation type of the produced instances
    fn implementation(&self) -> TypeKey;

    /// Types the produced instances are assignable to
    fn provisions(&self) -> &[Provision];

    /// Produce an instance
    fn produce(&self, resolver: &Resolver<'_>) -> Result<AnyArc>;

    /// Check that `produce` would find every required dependency, without producing
    fn verify(&self, resolver: &Resolver<'_>) -> Result<()>;

    /// Inject the members of an existing instance.
    ///
    /// `level` restricts injection to members declared at one hierarchy level.
    fn decorate_existing(
        &self,
        resolver: &Resolver<'_>,
        instance: &mut dyn Any,
        level: Option<TypeKey>,
    ) -> Result<()> {
        match self.delegate() {
            Some(delegate) => delegate.decorate_existing(resolver, instance, level),
            None => Ok(()),
        }
    }

    /// The wrapped adapter, for behaviors
    fn delegate(&self) -> Option<&dyn ComponentAdapter> {
        None
    }

    /// Short description of this link of the chain
    fn describe(&self) -> String;

    fn as_any(&self) -> &dyn Any;

    /// Whether the lifecycle state machine sequences this component
    fn has_lifecycle(&self) -> bool {
        self.delegate().is_some_and(|d| d.has_lifecycle())
    }

    fn is_started(&self) -> bool {
        self.delegate().is_some_and(|d| d.is_started())
    }

    fn start(&self) -> Result<()> {
        self.delegate().map_or(Ok(()), |d| d.start())
    }

    fn stop(&self) -> Result<()> {
        self.delegate().map_or(Ok(()), |d| d.stop())
    }

    fn dispose(&self) -> Result<()> {
        self.delegate().map_or(Ok(()), |d| d.dispose())
    }

    /// Lifecycle hooks of the implementation
    fn hooks(&self) -> ErasedHooks {
        self.delegate().map_or_else(ErasedHooks::none, |d| d.hooks())
    }
}

impl dyn ComponentAdapter {
    /// The provision of `ty`, if instances are assignable to it
    pub fn provision(&self, ty: TypeKey) -> Option<&Provision> {
        self.provisions().iter().find(|p| p.ty() == ty)
    }

    #[inline]
    pub fn provides(&self, ty: TypeKey) -> bool {
        self.provision(ty).is_some()
    }

    /// View a produced instance as `ty`
    pub fn view(&self, instance: &AnyArc, ty: TypeKey) -> Result<AnyArc> {
        self.provision(ty)
            .and_then(|provision| provision.apply(instance))
            .ok_or_else(|| DiError::TypeMismatch {
                key: self.key().to_string(),
                expected: ty.name(),
            })
    }

    /// The first link of the chain of type `B`, starting with this adapter
    pub fn find<B: ComponentAdapter>(&self) -> Option<&B> {
        let mut current = Some(self);
        while let Some(adapter) = current {
            if let Some(found) = adapter.as_any().downcast_ref::<B>() {
                return Some(found);
            }
            current = adapter.delegate();
        }
        None
    }

    /// Descriptions of the chain, outermost first
    pub fn chain(&self) -> Vec<String> {
        let mut links = Vec::new();
        let mut current = Some(self);
        while let Some(adapter) = current {
            links.push(adapter.describe());
            current = adapter.delegate();
        }
        links
    }

    /// Walk the chain with `visitor`, outermost first
    pub fn accept(&self, visitor: &mut dyn ComponentVisitor) {
        let mut current = Some(self);
        while let Some(adapter) = current {
            visitor.visit_adapter(adapter);
            current = adapter.delegate();
        }
    }
}

impl fmt::Debug for dyn ComponentAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} => {}", self.key(), self.chain().join(" -> "))
    }
}

/// Visitor over a container tree and the adapter chains it holds
pub trait ComponentVisitor {
    /// Called before a container's adapters; return `false` to skip it and its children
    fn visit_container(&mut self, _container: &Container) -> bool {
        true
    }

    /// Called for every link of every adapter chain
    fn visit_adapter(&mut self, _adapter: &dyn ComponentAdapter) {}

    /// Called after a container's adapters and children
    fn leave_container(&mut self, _container: &Container) {}
}

/// Adapter around a pre-built value
pub struct InstanceAdapter {
    key: Key,
    implementation: TypeKey,
    provisions: Vec<Provision>,
    instance: AnyArc,
    hooks: ErasedHooks,
    lifecycle: ComponentLifecycle,
}

impl InstanceAdapter {
    /// Adapter producing `instance`, assignable to `T` only
    pub fn new<T: Injectable>(key: impl Into<Key>, instance: Arc<T>) -> Self {
        Self {
            key: key.into(),
            implementation: TypeKey::of::<T>(),
            provisions: vec![Provision::itself::<T>()],
            instance,
            hooks: ErasedHooks::none(),
            lifecycle: ComponentLifecycle::new(),
        }
    }

    /// Adapter producing `instance`, with the provisions and lifecycle hooks of `metadata`
    pub fn with_metadata<T: Injectable>(key: impl Into<Key>, instance: Arc<T>, metadata: &TypeMetadata<T>) -> Self {
        Self {
            key: key.into(),
            implementation: TypeKey::of::<T>(),
            provisions: metadata.provisions().to_vec(),
            instance,
            hooks: metadata.hooks().erase(),
            lifecycle: ComponentLifecycle::new(),
        }
    }

    /// Adapter producing a value that is only known through interface `I`
    pub fn from_dyn<I: ?Sized + Send + Sync + 'static>(key: impl Into<Key>, instance: Arc<I>) -> Self {
        Self {
            key: key.into(),
            implementation: TypeKey::of::<I>(),
            provisions: vec![Provision::view::<I>()],
            instance: Arc::new(instance),
            hooks: ErasedHooks::none(),
            lifecycle: ComponentLifecycle::new(),
        }
    }

    fn subject(&self) -> String {
        self.key.to_string()
    }
}

impl ComponentAdapter for InstanceAdapter {
    fn key(&self) -> &Key {
        &self.key
    }

    fn implementation(&self) -> TypeKey {
        self.implementation
    }

    fn provisions(&self) -> &[Provision] {
        &self.provisions
    }

    fn produce(&self, _resolver: &Resolver<'_>) -> Result<AnyArc> {
        Ok(Arc::clone(&self.instance))
    }

    fn verify(&self, _resolver: &Resolver<'_>) -> Result<()> {
        Ok(())
    }

    fn describe(&self) -> String {
        format!("Instance[{}]", self.implementation)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn has_lifecycle(&self) -> bool {
        self.hooks.has_any()
    }

    fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    fn start(&self) -> Result<()> {
        self.lifecycle.start(&self.subject(), &self.hooks, [&self.instance])
    }

    fn stop(&self) -> Result<()> {
        self.lifecycle.stop(&self.subject(), &self.hooks, [&self.instance])
    }

    fn dispose(&self) -> Result<()> {
        self.lifecycle.dispose(&self.subject(), &self.hooks, [&self.instance])
    }

    fn hooks(&self) -> ErasedHooks {
        self.hooks.clone()
    }
}

/// Pass-through view of an adapter registered in an ancestor container.
///
/// Returned by [`Container::get_adapter`] for keys found above the local
/// container; producing through it resolves in the owning ancestor.
pub struct ParentAdapter {
    owner: Container,
    inner: Arc<dyn ComponentAdapter>,
}

impl ParentAdapter {
    pub(crate) fn new(owner: Container, inner: Arc<dyn ComponentAdapter>) -> Self {
        Self { owner, inner }
    }

    /// The ancestor holding the registration
    pub fn owner(&self) -> &Container {
        &self.owner
    }
}

impl ComponentAdapter for ParentAdapter {
    fn key(&self) -> &Key {
        self.inner.key()
    }

    fn implementation(&self) -> TypeKey {
        self.inner.implementation()
    }

    fn provisions(&self) -> &[Provision] {
        self.inner.provisions()
    }

    fn produce(&self, resolver: &Resolver<'_>) -> Result<AnyArc> {
        self.owner
            .instantiate(self.inner.key(), &self.inner, resolver.resolution())
    }

    fn verify(&self, resolver: &Resolver<'_>) -> Result<()> {
        self.inner.verify(&resolver.within(&self.owner))
    }

    fn decorate_existing(
        &self,
        resolver: &Resolver<'_>,
        instance: &mut dyn Any,
        level: Option<TypeKey>,
    ) -> Result<()> {
        self.inner
            .decorate_existing(&resolver.within(&self.owner), instance, level)
    }

    fn delegate(&self) -> Option<&dyn ComponentAdapter> {
        Some(&*self.inner)
    }

    fn describe(&self) -> String {
        format!("Parent[{}]", self.owner)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::Resolution;
    use crate::lifecycle::Lifecycle;
    use crate::BoxError;
    use std::sync::atomic::{AtomicBool, Ordering};

    trait Named: Send + Sync {
        fn name(&self) -> &str;
    }

    #[derive(Default)]
    struct Plugin {
        started: AtomicBool,
    }

    impl Named for Plugin {
        fn name(&self) -> &str {
            "plugin"
        }
    }

    impl Lifecycle for Plugin {
        fn start(&self) -> std::result::Result<(), BoxError> {
            self.started.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_instance_adapter_views_and_lifecycle() {
        let metadata = TypeMetadata::<Plugin>::new()
            .implements::<dyn Named, _>(|p| p as Arc<dyn Named>)
            .lifecycle();
        let plugin = Arc::new(Plugin::default());
        let adapter: Arc<dyn ComponentAdapter> =
            Arc::new(InstanceAdapter::with_metadata(Key::named("plugin"), Arc::clone(&plugin), &metadata));

        let container = Container::new();
        let resolution = Resolution::new();
        let instance = adapter.produce(&Resolver::new(&container, &resolution)).unwrap();
        let view = adapter.view(&instance, TypeKey::of::<dyn Named>()).unwrap();
        let named = crate::provider::downcast_dyn::<dyn Named>(adapter.key(), view).unwrap();
        assert_eq!(named.name(), "plugin");
        assert!(adapter.view(&instance, TypeKey::of::<String>()).is_err());

        assert!(adapter.has_lifecycle());
        adapter.start().unwrap();
        assert!(plugin.started.load(Ordering::SeqCst));
        assert!(adapter.is_started());
        assert!(adapter.start().is_err());
    }

    #[test]
    fn test_find_and_chain() {
        let adapter: Arc<dyn ComponentAdapter> = Arc::new(InstanceAdapter::new(Key::of::<u32>(), Arc::new(3u32)));
        assert!(adapter.find::<InstanceAdapter>().is_some());
        assert!(adapter.find::<ParentAdapter>().is_none());
        assert_eq!(adapter.chain(), vec!["Instance[u32]".to_string()]);
    }

    #[test]
    fn test_dyn_instance_is_assignable_to_its_interface() {
        let value: Arc<dyn Named> = Arc::new(Plugin::default());
        let adapter: Arc<dyn ComponentAdapter> = Arc::new(InstanceAdapter::from_dyn(Key::of::<dyn Named>(), value));
        assert!(adapter.provides(TypeKey::of::<dyn Named>()));
        assert!(!adapter.has_lifecycle());
    }
}
