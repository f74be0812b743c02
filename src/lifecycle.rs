//! Lifecycle state machine
//!
//! Containers and lifecycle-bearing components move through
//! `not-started -> starting -> started -> stopping -> stopped -> ... -> disposed`.
//! Illegal transitions are programming errors and surface as
//! [`DiError::IllegalLifecycleState`].

use crate::behavior::Facade;
use crate::{AnyArc, BoxError, DiError, Injectable, Result};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// State of a container or of a lifecycle-bearing component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LifecycleState {
    #[default]
    NotStarted,
    Starting,
    Started,
    Stopping,
    Stopped,
    Disposing,
    Disposed,
}

impl LifecycleState {
    /// Whether `start` is legal from this state
    #[inline]
    pub fn can_start(self) -> bool {
        matches!(self, Self::NotStarted | Self::Stopped)
    }

    /// Whether `stop` is legal from this state
    #[inline]
    pub fn can_stop(self) -> bool {
        self == Self::Started
    }

    /// Whether `dispose` is legal from this state
    #[inline]
    pub fn can_dispose(self) -> bool {
        matches!(self, Self::NotStarted | Self::Started | Self::Stopped)
    }

    #[inline]
    pub fn is_started(self) -> bool {
        self == Self::Started
    }

    #[inline]
    pub fn is_disposed(self) -> bool {
        self == Self::Disposed
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::NotStarted => "not started",
            Self::Starting => "starting",
            Self::Started => "started",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Disposing => "disposing",
            Self::Disposed => "disposed",
        })
    }
}

/// A lifecycle operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleOperation {
    Start,
    Stop,
    Dispose,
}

impl fmt::Display for LifecycleOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Dispose => "dispose",
        })
    }
}

/// Guarded lifecycle state.
///
/// `begin` validates a transition and moves into the intermediate state;
/// `finish` records the terminal state of the operation.
#[derive(Debug, Default)]
pub(crate) struct StateMachine {
    state: Mutex<LifecycleState>,
}

impl StateMachine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn state(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Validate `operation` against the current state and enter its intermediate state.
    ///
    /// Returns the state the operation started from.
    pub(crate) fn begin(&self, operation: LifecycleOperation, subject: impl fmt::Display) -> Result<LifecycleState> {
        let mut state = self.state.lock();
        let current = *state;
        let (legal, next) = match operation {
            LifecycleOperation::Start => (current.can_start(), LifecycleState::Starting),
            LifecycleOperation::Stop => (current.can_stop(), LifecycleState::Stopping),
            LifecycleOperation::Dispose => (current.can_dispose(), LifecycleState::Disposing),
        };
        if !legal {
            return Err(DiError::IllegalLifecycleState {
                subject: subject.to_string(),
                operation,
                state: current,
            });
        }

        #[cfg(feature = "logging")]
        trace!(
            target: "wiring_injector",
            subject = %subject,
            from = %current,
            to = %next,
            "Lifecycle transition"
        );

        *state = next;
        Ok(current)
    }

    #[inline]
    pub(crate) fn finish(&self, state: LifecycleState) {
        *self.state.lock() = state;
    }
}

/// Lifecycle hooks a component type exposes.
///
/// Implementing this trait and registering the type with
/// [`TypeMetadata::lifecycle`](crate::TypeMetadata::lifecycle) (or
/// `#[describe(lifecycle)]`) makes the component lifecycle-bearing once it is
/// cached by the container.
pub trait Lifecycle: Send + Sync + 'static {
    fn start(&self) -> std::result::Result<(), BoxError> {
        Ok(())
    }

    fn stop(&self) -> std::result::Result<(), BoxError> {
        Ok(())
    }

    fn dispose(&self) -> std::result::Result<(), BoxError> {
        Ok(())
    }
}

type Hook<T> = Arc<dyn Fn(&T) -> std::result::Result<(), BoxError> + Send + Sync>;

/// Typed start/stop/dispose hooks of a component type
pub struct LifecycleHooks<T> {
    start: Option<Hook<T>>,
    stop: Option<Hook<T>>,
    dispose: Option<Hook<T>>,
}

impl<T> Default for LifecycleHooks<T> {
    fn default() -> Self {
        Self {
            start: None,
            stop: None,
            dispose: None,
        }
    }
}

impl<T> Clone for LifecycleHooks<T> {
    fn clone(&self) -> Self {
        Self {
            start: self.start.clone(),
            stop: self.stop.clone(),
            dispose: self.dispose.clone(),
        }
    }
}

impl<T: Injectable> LifecycleHooks<T> {
    /// Hooks forwarding to the [`Lifecycle`] implementation of `T`
    pub fn from_trait() -> Self
    where
        T: Lifecycle,
    {
        Self {
            start: Some(Arc::new(|c: &T| Lifecycle::start(c))),
            stop: Some(Arc::new(|c: &T| Lifecycle::stop(c))),
            dispose: Some(Arc::new(|c: &T| Lifecycle::dispose(c))),
        }
    }

    pub fn on_start(&mut self, hook: impl Fn(&T) -> std::result::Result<(), BoxError> + Send + Sync + 'static) {
        self.start = Some(Arc::new(hook));
    }

    pub fn on_stop(&mut self, hook: impl Fn(&T) -> std::result::Result<(), BoxError> + Send + Sync + 'static) {
        self.stop = Some(Arc::new(hook));
    }

    pub fn on_dispose(&mut self, hook: impl Fn(&T) -> std::result::Result<(), BoxError> + Send + Sync + 'static) {
        self.dispose = Some(Arc::new(hook));
    }

    /// Whether any hook is present
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.stop.is_none() && self.dispose.is_none()
    }

    /// Erase the component type
    pub(crate) fn erase(&self) -> ErasedHooks {
        if self.is_empty() {
            return ErasedHooks::none();
        }
        let type_name = std::any::type_name::<T>();
        let wrap = |hook: &Option<Hook<T>>, operation: LifecycleOperation| {
            hook.clone().map(|hook| {
                Arc::new(move |instance: &AnyArc| {
                    let target = unwrap_facade(instance);
                    let component = target.downcast_ref::<T>().ok_or_else(|| DiError::TypeMismatch {
                        key: type_name.to_string(),
                        expected: type_name,
                    })?;
                    hook(component).map_err(|e| DiError::lifecycle(type_name, operation, e))
                }) as ErasedHook
            })
        };
        ErasedHooks {
            start: wrap(&self.start, LifecycleOperation::Start),
            stop: wrap(&self.stop, LifecycleOperation::Stop),
            dispose: wrap(&self.dispose, LifecycleOperation::Dispose),
        }
    }
}

fn unwrap_facade(instance: &AnyArc) -> &AnyArc {
    match instance.downcast_ref::<Facade>() {
        Some(facade) => facade.target(),
        None => instance,
    }
}

type ErasedHook = Arc<dyn Fn(&AnyArc) -> Result<()> + Send + Sync>;

/// Hooks with the component type erased, invoked on produced instances
#[derive(Clone, Default)]
pub struct ErasedHooks {
    start: Option<ErasedHook>,
    stop: Option<ErasedHook>,
    dispose: Option<ErasedHook>,
}

impl ErasedHooks {
    pub(crate) fn none() -> Self {
        Self::default()
    }

    /// Whether the component exposes any hook
    pub fn has_any(&self) -> bool {
        self.start.is_some() || self.stop.is_some() || self.dispose.is_some()
    }

    pub(crate) fn run(&self, operation: LifecycleOperation, instance: &AnyArc) -> Result<()> {
        let hook = match operation {
            LifecycleOperation::Start => &self.start,
            LifecycleOperation::Stop => &self.stop,
            LifecycleOperation::Dispose => &self.dispose,
        };
        match hook {
            Some(hook) => hook(instance),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ErasedHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedHooks")
            .field("start", &self.start.is_some())
            .field("stop", &self.stop.is_some())
            .field("dispose", &self.dispose.is_some())
            .finish()
    }
}

/// Lifecycle of one component instance slot, shared by the adapters that own instances.
#[derive(Debug, Default)]
pub(crate) struct ComponentLifecycle {
    machine: StateMachine,
}

impl ComponentLifecycle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn is_started(&self) -> bool {
        self.machine.state().is_started()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        self.machine.state().is_disposed()
    }

    /// Start `instances` with `hooks`
    pub(crate) fn start<'a>(
        &self,
        subject: &str,
        hooks: &ErasedHooks,
        instances: impl IntoIterator<Item = &'a AnyArc>,
    ) -> Result<()> {
        self.machine.begin(LifecycleOperation::Start, subject)?;
        let result = instances
            .into_iter()
            .try_for_each(|instance| hooks.run(LifecycleOperation::Start, instance));
        self.machine.finish(match result {
            Ok(()) => LifecycleState::Started,
            Err(_) => LifecycleState::Stopped,
        });
        result
    }

    /// Stop `instances` with `hooks`
    pub(crate) fn stop<'a>(
        &self,
        subject: &str,
        hooks: &ErasedHooks,
        instances: impl IntoIterator<Item = &'a AnyArc>,
    ) -> Result<()> {
        self.machine.begin(LifecycleOperation::Stop, subject)?;
        let result = instances
            .into_iter()
            .try_for_each(|instance| hooks.run(LifecycleOperation::Stop, instance));
        self.machine.finish(LifecycleState::Stopped);
        result
    }

    /// Dispose `instances`, stopping first if started. Already-disposed slots are skipped.
    ///
    /// A failing stop hook does not prevent disposal; every dispose hook runs
    /// and the slot ends `Disposed`. The first failure is returned.
    pub(crate) fn dispose<'a>(
        &self,
        subject: &str,
        hooks: &ErasedHooks,
        instances: impl IntoIterator<Item = &'a AnyArc> + Clone,
    ) -> Result<()> {
        if self.is_disposed() {
            return Ok(());
        }
        let mut first = None;
        if self.is_started() {
            if let Err(e) = self.stop(subject, hooks, instances.clone()) {
                first = Some(e);
            }
        }
        self.machine.begin(LifecycleOperation::Dispose, subject)?;
        for instance in instances {
            if let Err(e) = hooks.run(LifecycleOperation::Dispose, instance) {
                first.get_or_insert(e);
            }
        }
        self.machine.finish(LifecycleState::Disposed);
        first.map_or(Ok(()), Err)
    }

    /// Forget the slot's history after its instance was flushed
    pub(crate) fn reset(&self) {
        self.machine.finish(LifecycleState::NotStarted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_legal_container_transitions() {
        let machine = StateMachine::new();
        assert_eq!(machine.state(), LifecycleState::NotStarted);

        machine.begin(LifecycleOperation::Start, "c").unwrap();
        assert_eq!(machine.state(), LifecycleState::Starting);
        machine.finish(LifecycleState::Started);

        machine.begin(LifecycleOperation::Stop, "c").unwrap();
        machine.finish(LifecycleState::Stopped);

        // restart is allowed
        machine.begin(LifecycleOperation::Start, "c").unwrap();
        machine.finish(LifecycleState::Started);
    }

    #[test]
    fn test_illegal_transitions() {
        let machine = StateMachine::new();
        let err = machine.begin(LifecycleOperation::Stop, "c").unwrap_err();
        assert!(matches!(
            err,
            DiError::IllegalLifecycleState {
                operation: LifecycleOperation::Stop,
                state: LifecycleState::NotStarted,
                ..
            }
        ));

        machine.begin(LifecycleOperation::Dispose, "c").unwrap();
        machine.finish(LifecycleState::Disposed);
        assert!(machine.begin(LifecycleOperation::Dispose, "c").is_err());
        assert!(machine.begin(LifecycleOperation::Start, "c").is_err());
    }

    struct Engine {
        starts: AtomicU32,
        disposals: AtomicU32,
    }

    impl Lifecycle for Engine {
        fn start(&self) -> std::result::Result<(), BoxError> {
            self.starts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn dispose(&self) -> std::result::Result<(), BoxError> {
            self.disposals.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_component_lifecycle_runs_hooks_once() {
        let hooks = LifecycleHooks::<Engine>::from_trait().erase();
        assert!(hooks.has_any());

        let engine = Arc::new(Engine {
            starts: AtomicU32::new(0),
            disposals: AtomicU32::new(0),
        });
        let instance: AnyArc = engine.clone();
        let lifecycle = ComponentLifecycle::new();

        lifecycle.start("engine", &hooks, [&instance]).unwrap();
        assert!(lifecycle.is_started());
        assert!(lifecycle.start("engine", &hooks, [&instance]).is_err());

        lifecycle.dispose("engine", &hooks, [&instance]).unwrap();
        lifecycle.dispose("engine", &hooks, [&instance]).unwrap();
        assert_eq!(engine.starts.load(Ordering::SeqCst), 1);
        assert_eq!(engine.disposals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_dispose_runs_after_failed_stop() {
        let disposals = Arc::new(AtomicU32::new(0));
        let d = Arc::clone(&disposals);
        let mut hooks = LifecycleHooks::<u32>::default();
        hooks.on_stop(|_| Err("stuck".into()));
        hooks.on_dispose(move |_| {
            d.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let hooks = hooks.erase();
        let instance: AnyArc = Arc::new(3u32);
        let lifecycle = ComponentLifecycle::new();

        lifecycle.start("worker", &hooks, [&instance]).unwrap();
        let err = lifecycle.dispose("worker", &hooks, [&instance]).unwrap_err();
        assert!(matches!(
            err,
            DiError::LifecycleFailed {
                operation: LifecycleOperation::Stop,
                ..
            }
        ));
        assert!(lifecycle.is_disposed());
        assert_eq!(disposals.load(Ordering::SeqCst), 1);

        // a second dispose is a no-op
        lifecycle.dispose("worker", &hooks, [&instance]).unwrap();
        assert_eq!(disposals.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_hook_failure_is_wrapped() {
        let mut hooks = LifecycleHooks::<u32>::default();
        hooks.on_start(|_| Err("refused".into()));
        let instance: AnyArc = Arc::new(7u32);
        let err = hooks.erase().run(LifecycleOperation::Start, &instance).unwrap_err();
        assert!(matches!(
            err,
            DiError::LifecycleFailed {
                operation: LifecycleOperation::Start,
                ..
            }
        ));
    }
}
