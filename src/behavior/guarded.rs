//! Guarded production

use crate::adapter::ComponentAdapter;
use crate::guard::{Lookup, Resolver};
use crate::{AnyArc, DiError, Key, Provision, Result, TypeKey};
use std::any::Any;

#[cfg(feature = "logging")]
use tracing::trace;

/// Resolves a guard component before producing; a missing guard fails fast
pub struct Guarding {
    delegate: Box<dyn ComponentAdapter>,
    guard: Key,
}

impl Guarding {
    pub fn new(delegate: Box<dyn ComponentAdapter>, guard: Key) -> Self {
        Self { delegate, guard }
    }

    /// Key of the guard component
    pub fn guard(&self) -> &Key {
        &self.guard
    }

    fn missing(&self) -> DiError {
        DiError::UnsatisfiedDependency {
            type_name: self.delegate.implementation().name(),
            unresolved: vec![format!("guard {}", self.guard)],
        }
    }
}

impl ComponentAdapter for Guarding {
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
        if resolver.lookup(&self.guard)?.is_none() {
            return Err(self.missing());
        }

        #[cfg(feature = "logging")]
        trace!(
            target: "wiring_injector",
            key = %self.key(),
            guard = %self.guard,
            "Guard satisfied"
        );

        self.delegate.produce(resolver)
    }

    fn verify(&self, resolver: &Resolver<'_>) -> Result<()> {
        if !resolver.container().has_component(&self.guard)? {
            return Err(self.missing());
        }
        self.delegate.verify(resolver)
    }

    fn delegate(&self) -> Option<&dyn ComponentAdapter> {
        Some(&*self.delegate)
    }

    fn describe(&self) -> String {
        format!("Guarding({})", self.guard)
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
    use std::sync::Arc;

    struct Vault;

    #[test]
    fn test_missing_guard_fails_fast() {
        let container = Container::new();
        let guarded = Guarding::new(
            Box::new(InstanceAdapter::new(Key::of::<Vault>(), Arc::new(Vault))),
            Key::named("license"),
        );
        let resolution = Resolution::new();
        let resolver = Resolver::new(&container, &resolution);

        let err = guarded.produce(&resolver).err().unwrap();
        assert!(err.is_unsatisfied());
        assert!(guarded.verify(&resolver).is_err());

        container.register_instance(Key::named("license"), 1u8).unwrap();
        assert!(guarded.produce(&resolver).is_ok());
        assert!(guarded.verify(&resolver).is_ok());
    }
}
