//! Serialized production
//!
//! Both behaviors are reentrant on the owning thread, so a cycle through a
//! locked component surfaces as a cycle error instead of a deadlock.

use crate::adapter::ComponentAdapter;
use crate::guard::Resolver;
use crate::{AnyArc, Key, Provision, Result, TypeKey};
use parking_lot::{Condvar, Mutex, ReentrantMutex};
use std::any::Any;
use std::thread::{self, ThreadId};

/// Serializes `produce` with a lightweight reentrant lock
pub struct Locking {
    delegate: Box<dyn ComponentAdapter>,
    lock: ReentrantMutex<()>,
}

impl Locking {
    pub fn new(delegate: Box<dyn ComponentAdapter>) -> Self {
        Self {
            delegate,
            lock: ReentrantMutex::new(()),
        }
    }
}

impl ComponentAdapter for Locking {
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
        let _guard = self.lock.lock();
        self.delegate.produce(resolver)
    }

    fn verify(&self, resolver: &Resolver<'_>) -> Result<()> {
        self.delegate.verify(resolver)
    }

    fn decorate_existing(
        &self,
        resolver: &Resolver<'_>,
        instance: &mut dyn Any,
        level: Option<TypeKey>,
    ) -> Result<()> {
        let _guard = self.lock.lock();
        self.delegate.decorate_existing(resolver, instance, level)
    }

    fn delegate(&self) -> Option<&dyn ComponentAdapter> {
        Some(&*self.delegate)
    }

    fn describe(&self) -> String {
        "Locking".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Reentrant monitor: one owning thread, any number of nested entries
#[derive(Default)]
struct Monitor {
    owner: Mutex<Option<(ThreadId, usize)>>,
    released: Condvar,
}

impl Monitor {
    fn enter(&self) -> MonitorGuard<'_> {
        let me = thread::current().id();
        let mut owner = self.owner.lock();
        loop {
            match owner.as_mut() {
                None => {
                    *owner = Some((me, 1));
                    break;
                }
                Some((thread, depth)) if *thread == me => {
                    *depth += 1;
                    break;
                }
                Some(_) => self.released.wait(&mut owner),
            }
        }
        MonitorGuard { monitor: self }
    }

    fn exit(&self) {
        let mut owner = self.owner.lock();
        if let Some((_, depth)) = owner.as_mut() {
            *depth -= 1;
            if *depth == 0 {
                *owner = None;
                self.released.notify_one();
            }
        }
    }
}

struct MonitorGuard<'a> {
    monitor: &'a Monitor,
}

impl Drop for MonitorGuard<'_> {
    fn drop(&mut self) {
        self.monitor.exit();
    }
}

/// Serializes `produce` with a reentrant monitor
pub struct Synchronizing {
    delegate: Box<dyn ComponentAdapter>,
    monitor: Monitor,
}

impl Synchronizing {
    pub fn new(delegate: Box<dyn ComponentAdapter>) -> Self {
        Self {
            delegate,
            monitor: Monitor::default(),
        }
    }
}

impl ComponentAdapter for Synchronizing {
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
        let _guard = self.monitor.enter();
        self.delegate.produce(resolver)
    }

    fn verify(&self, resolver: &Resolver<'_>) -> Result<()> {
        self.delegate.verify(resolver)
    }

    fn decorate_existing(
        &self,
        resolver: &Resolver<'_>,
        instance: &mut dyn Any,
        level: Option<TypeKey>,
    ) -> Result<()> {
        let _guard = self.monitor.enter();
        self.delegate.decorate_existing(resolver, instance, level)
    }

    fn delegate(&self) -> Option<&dyn ComponentAdapter> {
        Some(&*self.delegate)
    }

    fn describe(&self) -> String {
        "Synchronizing".to_string()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_monitor_is_reentrant() {
        let monitor = Monitor::default();
        let outer = monitor.enter();
        let inner = monitor.enter();
        drop(inner);
        assert!(monitor.owner.lock().is_some());
        drop(outer);
        assert!(monitor.owner.lock().is_none());
    }

    #[test]
    fn test_monitor_excludes_other_threads() {
        let monitor = Arc::new(Monitor::default());
        let inside = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));

        let workers: Vec<_> = (0..4)
            .map(|_| {
                let monitor = Arc::clone(&monitor);
                let inside = Arc::clone(&inside);
                let overlap = Arc::clone(&overlap);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        let _guard = monitor.enter();
                        if inside.fetch_add(1, Ordering::SeqCst) != 0 {
                            overlap.fetch_add(1, Ordering::SeqCst);
                        }
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }
}
