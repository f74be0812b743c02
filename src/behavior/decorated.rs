//! Post-production decoration

use crate::adapter::ComponentAdapter;
use crate::guard::Resolver;
use crate::provider::downcast;
use crate::{AnyArc, BoxError, DiError, Injectable, Key, Provision, Result, TypeKey};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

type DecorateFn = Arc<dyn Fn(&Key, AnyArc) -> Result<AnyArc> + Send + Sync>;

/// A function applied to every instance of `T` after production
#[derive(Clone)]
pub struct Decorator {
    target: TypeKey,
    apply: DecorateFn,
}

impl Decorator {
    pub fn new<T, F>(decorate: F) -> Self
    where
        T: Injectable,
        F: Fn(Arc<T>) -> std::result::Result<Arc<T>, BoxError> + Send + Sync + 'static,
    {
        Self {
            target: TypeKey::of::<T>(),
            apply: Arc::new(move |key: &Key, instance: AnyArc| {
                let typed = downcast::<T>(key, instance)?;
                let decorated = decorate(typed).map_err(|e| DiError::instantiation(std::any::type_name::<T>(), e))?;
                Ok(decorated as AnyArc)
            }),
        }
    }

    /// Type the decorator applies to
    #[inline]
    pub fn target(&self) -> TypeKey {
        self.target
    }
}

impl fmt::Debug for Decorator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target)
    }
}

/// Passes every produced instance through a [`Decorator`]
pub struct Decorating {
    delegate: Box<dyn ComponentAdapter>,
    decorator: Decorator,
}

impl Decorating {
    pub fn new(delegate: Box<dyn ComponentAdapter>, decorator: Decorator) -> Self {
        Self { delegate, decorator }
    }
}

impl ComponentAdapter for Decorating {
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
        let instance = self.delegate.produce(resolver)?;
        (self.decorator.apply)(self.key(), instance)
    }

    fn verify(&self, resolver: &Resolver<'_>) -> Result<()> {
        self.delegate.verify(resolver)
    }

    fn delegate(&self) -> Option<&dyn ComponentAdapter> {
        Some(&*self.delegate)
    }

    fn describe(&self) -> String {
        format!("Decorating({})", self.decorator.target)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::InstanceAdapter;
    use crate::guard::Resolution;
    use crate::Container;

    struct Greeting(String);

    #[test]
    fn test_decorator_replaces_instance() {
        let decorating = Decorating::new(
            Box::new(InstanceAdapter::new(Key::of::<Greeting>(), Arc::new(Greeting("hi".into())))),
            Decorator::new(|g: Arc<Greeting>| Ok(Arc::new(Greeting(format!("{}!", g.0))))),
        );
        let container = Container::new();
        let resolution = Resolution::new();
        let instance = decorating.produce(&Resolver::new(&container, &resolution)).unwrap();
        assert_eq!(instance.downcast_ref::<Greeting>().unwrap().0, "hi!");
    }

    #[test]
    fn test_decorator_failure_is_wrapped() {
        let decorating = Decorating::new(
            Box::new(InstanceAdapter::new(Key::of::<Greeting>(), Arc::new(Greeting("hi".into())))),
            Decorator::new(|_: Arc<Greeting>| Err("rejected".into())),
        );
        let container = Container::new();
        let resolution = Resolution::new();
        let err = decorating.produce(&Resolver::new(&container, &resolution)).err().unwrap();
        assert!(matches!(err, DiError::InstantiationFailed { .. }));
    }
}
