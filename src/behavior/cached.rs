//! Instance caching
//!
//! The caching behaviors own the produced instances, so they also own the
//! component lifecycle: starting, stopping and disposing run the hooks on the
//! cached instance(s).

use crate::adapter::ComponentAdapter;
use crate::guard::Resolver;
use crate::lifecycle::{ComponentLifecycle, ErasedHooks};
use crate::{AnyArc, Key, Provision, Result, TypeKey};
use ahash::RandomState;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::any::Any;
use std::sync::Arc;
use std::thread::{self, ThreadId};

#[cfg(feature = "logging")]
use tracing::debug;

/// Keeps the first produced instance and returns it on every later call
pub struct Caching {
    delegate: Box<dyn ComponentAdapter>,
    slot: RwLock<Option<AnyArc>>,
    hooks: ErasedHooks,
    lifecycle: ComponentLifecycle,
}

impl Caching {
    pub fn new(delegate: Box<dyn ComponentAdapter>) -> Self {
        let hooks = delegate.hooks();
        Self {
            delegate,
            slot: RwLock::new(None),
            hooks,
            lifecycle: ComponentLifecycle::new(),
        }
    }

    /// The cached instance, if one was produced
    pub fn cached(&self) -> Option<AnyArc> {
        self.slot.read().clone()
    }

    /// Stop and dispose the cached instance and clear the slot.
    ///
    /// The next `produce` builds a fresh instance.
    pub fn flush(&self) -> Result<()> {
        let Some(instance) = self.slot.write().take() else {
            return Ok(());
        };
        let subject = self.subject();
        let disposed = if self.hooks.has_any() {
            self.lifecycle.dispose(&subject, &self.hooks, [&instance])
        } else {
            Ok(())
        };
        self.lifecycle.reset();
        disposed?;

        #[cfg(feature = "logging")]
        debug!(
            target: "wiring_injector",
            key = %subject,
            "Flushed cached instance"
        );

        Ok(())
    }

    fn subject(&self) -> String {
        self.delegate.key().to_string()
    }
}

impl ComponentAdapter for Caching {
    fn key(&self) -> &Key {
        self.delegate.key()
    }

    fn implementation(&self) -> TypeKey {
        self.delegate.implementation()
    }

    fn provisions(&self) -> &[Provision] {
        self.delegate.provisions()
    }

    fn produce(&self, resolver: &Resolver<'_>) -> Result<AnyArc> {
        if let Some(instance) = self.slot.read().as_ref() {
            return Ok(Arc::clone(instance));
        }
        let produced = self.delegate.produce(resolver)?;

        let mut slot = self.slot.write();
        // another thread may have filled the slot meanwhile; the first one wins
        if let Some(existing) = slot.as_ref() {
            return Ok(Arc::clone(existing));
        }
        *slot = Some(Arc::clone(&produced));

        #[cfg(feature = "logging")]
        debug!(
            target: "wiring_injector",
            key = %self.key(),
            implementation = self.implementation().name(),
            "Cached component instance"
        );

        Ok(produced)
    }

    fn verify(&self, resolver: &Resolver<'_>) -> Result<()> {
        self.delegate.verify(resolver)
    }

    fn delegate(&self) -> Option<&dyn ComponentAdapter> {
        Some(&*self.delegate)
    }

    fn describe(&self) -> String {
        "Caching".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn has_lifecycle(&self) -> bool {
        self.hooks.has_any() || self.delegate.has_lifecycle()
    }

    fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    fn start(&self) -> Result<()> {
        let Some(instance) = self.cached() else {
            return Ok(());
        };
        self.lifecycle.start(&self.subject(), &self.hooks, [&instance])
    }

    fn stop(&self) -> Result<()> {
        let instance = self.cached();
        self.lifecycle.stop(&self.subject(), &self.hooks, instance.iter())
    }

    fn dispose(&self) -> Result<()> {
        let instance = self.cached();
        self.lifecycle.dispose(&self.subject(), &self.hooks, instance.iter())
    }

    fn hooks(&self) -> ErasedHooks {
        self.hooks.clone()
    }
}

/// Keeps one instance per calling thread.
///
/// Instances are keyed by [`ThreadId`] and outlive the thread that produced
/// them: an entry is only released by [`ThreadCaching::flush`] or by dropping
/// the adapter. Components resolved from many short-lived threads should be
/// flushed periodically, or cached with [`Caching`] instead.
pub struct ThreadCaching {
    delegate: Box<dyn ComponentAdapter>,
    instances: DashMap<ThreadId, AnyArc, RandomState>,
    hooks: ErasedHooks,
    lifecycle: ComponentLifecycle,
}

impl ThreadCaching {
    pub fn new(delegate: Box<dyn ComponentAdapter>) -> Self {
        let hooks = delegate.hooks();
        Self {
            delegate,
            instances: DashMap::with_hasher(RandomState::new()),
            hooks,
            lifecycle: ComponentLifecycle::new(),
        }
    }

    /// The instance cached for the calling thread
    pub fn cached(&self) -> Option<AnyArc> {
        self.instances
            .get(&thread::current().id())
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Number of threads holding an instance
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    /// Stop and dispose every cached instance and clear all slots
    pub fn flush(&self) -> Result<()> {
        let instances = self.snapshot();
        self.instances.clear();
        if instances.is_empty() {
            return Ok(());
        }
        let disposed = if self.hooks.has_any() {
            self.lifecycle.dispose(&self.subject(), &self.hooks, instances.iter())
        } else {
            Ok(())
        };
        self.lifecycle.reset();
        disposed?;

        #[cfg(feature = "logging")]
        debug!(
            target: "wiring_injector",
            key = %self.key(),
            instances = instances.len(),
            "Flushed thread-cached instances"
        );

        Ok(())
    }

    fn snapshot(&self) -> Vec<AnyArc> {
        self.instances
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    fn subject(&self) -> String {
        self.delegate.key().to_string()
    }
}

impl ComponentAdapter for ThreadCaching {
    fn key(&self) -> &Key {
        self.delegate.key()
    }

    fn implementation(&self) -> TypeKey {
        self.delegate.implementation()
    }

    fn provisions(&self) -> &[Provision] {
        self.delegate.provisions()
    }

    fn produce(&self, resolver: &Resolver<'_>) -> Result<AnyArc> {
        let thread = thread::current().id();
        if let Some(instance) = self.instances.get(&thread) {
            return Ok(Arc::clone(instance.value()));
        }
        // produce outside the map guard; nested resolutions may touch this map
        let produced = self.delegate.produce(resolver)?;
        Ok(Arc::clone(self.instances.entry(thread).or_insert(produced).value()))
    }

    fn verify(&self, resolver: &Resolver<'_>) -> Result<()> {
        self.delegate.verify(resolver)
    }

    fn delegate(&self) -> Option<&dyn ComponentAdapter> {
        Some(&*self.delegate)
    }

    fn describe(&self) -> String {
        "ThreadCaching".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn has_lifecycle(&self) -> bool {
        self.hooks.has_any() || self.delegate.has_lifecycle()
    }

    fn is_started(&self) -> bool {
        self.lifecycle.is_started()
    }

    fn start(&self) -> Result<()> {
        let instances = self.snapshot();
        if instances.is_empty() {
            return Ok(());
        }
        self.lifecycle.start(&self.subject(), &self.hooks, instances.iter())
    }

    fn stop(&self) -> Result<()> {
        let instances = self.snapshot();
        self.lifecycle.stop(&self.subject(), &self.hooks, instances.iter())
    }

    fn dispose(&self) -> Result<()> {
        let instances = self.snapshot();
        self.lifecycle.dispose(&self.subject(), &self.hooks, instances.iter())
    }

    fn hooks(&self) -> ErasedHooks {
        self.hooks.clone()
    }
}
