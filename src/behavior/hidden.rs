//! Implementation hiding

use crate::adapter::ComponentAdapter;
use crate::guard::Resolver;
use crate::{AnyArc, DiError, Key, Provision, Result, TypeKey};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::debug;

/// Interface-only wrapper around a hidden instance.
///
/// A facade holds one view per declared interface and never hands out the
/// implementation, so callers cannot downcast to the concrete type.
pub struct Facade {
    target: AnyArc,
    views: Vec<(TypeKey, AnyArc)>,
}

impl Facade {
    /// The instance viewed through interface `I`
    pub fn view<I: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<I>> {
        self.view_any(TypeKey::of::<I>())?
            .downcast::<Arc<I>>()
            .ok()
            .map(|view| Arc::clone(&*view))
    }

    /// Interfaces the facade exposes
    pub fn interfaces(&self) -> impl Iterator<Item = TypeKey> + '_ {
        self.views.iter().map(|(ty, _)| *ty)
    }

    pub(crate) fn view_any(&self, ty: TypeKey) -> Option<AnyArc> {
        self.views
            .iter()
            .find(|(view_ty, _)| *view_ty == ty)
            .map(|(_, view)| Arc::clone(view))
    }

    pub(crate) fn target(&self) -> &AnyArc {
        &self.target
    }
}

impl fmt::Debug for Facade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.interfaces()).finish()
    }
}

/// Produces a [`Facade`] of the delegate's interfaces instead of the instance
pub struct HidingImplementation {
    delegate: Box<dyn ComponentAdapter>,
    provisions: Vec<Provision>,
}

impl HidingImplementation {
    pub fn new(delegate: Box<dyn ComponentAdapter>) -> Result<Self> {
        let implementation = delegate.implementation();
        if delegate.key() == &Key::Type(implementation) {
            return Err(DiError::composition(format!(
                "{implementation} is registered under its own type and cannot be hidden"
            )));
        }
        let provisions: Vec<Provision> = delegate
            .provisions()
            .iter()
            .filter(|p| p.ty() != implementation)
            .cloned()
            .collect();
        if provisions.is_empty() {
            return Err(DiError::composition(format!(
                "{implementation} declares no interface to hide behind"
            )));
        }
        Ok(Self { delegate, provisions })
    }
}

impl ComponentAdapter for HidingImplementation {
    fn key(&self) -> &Key {
        self.delegate.key()
    }

    fn implementation(&self) -> TypeKey {
        self.delegate.implementation()
    }

    fn provisions(&self) -> &[Provision] {
        &self.provisions
    }

    fn produce(&self, resolver: &Resolver<'_>) -> Result<AnyArc> {
        let instance = self.delegate.produce(resolver)?;
        if instance.is::<Facade>() {
            return Ok(instance);
        }
        let views = self
            .provisions
            .iter()
            .filter_map(|p| p.apply(&instance).map(|view| (p.ty(), view)))
            .collect();

        #[cfg(feature = "logging")]
        debug!(
            target: "wiring_injector",
            key = %self.key(),
            implementation = self.implementation().name(),
            interfaces = self.provisions.len(),
            "Hiding implementation behind facade"
        );

        Ok(Arc::new(Facade { target: instance, views }))
    }

    fn verify(&self, resolver: &Resolver<'_>) -> Result<()> {
        self.delegate.verify(resolver)
    }

    fn delegate(&self) -> Option<&dyn ComponentAdapter> {
        Some(&*self.delegate)
    }

    fn describe(&self) -> String {
        "HidingImplementation".to_string()
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
    use crate::{Container, TypeMetadata};

    trait Account: Send + Sync {
        fn balance(&self) -> i64;
    }

    struct Savings;

    impl Account for Savings {
        fn balance(&self) -> i64 {
            100
        }
    }

    fn metadata() -> TypeMetadata<Savings> {
        TypeMetadata::new().implements::<dyn Account, _>(|s| s as Arc<dyn Account>)
    }

    #[test]
    fn test_facade_exposes_interfaces_only() {
        let leaf = InstanceAdapter::with_metadata(Key::of::<dyn Account>(), Arc::new(Savings), &metadata());
        let hidden = HidingImplementation::new(Box::new(leaf)).unwrap();

        let container = Container::new();
        let resolution = Resolution::new();
        let instance = hidden.produce(&Resolver::new(&container, &resolution)).unwrap();

        assert!(!instance.is::<Savings>());
        let facade = instance.downcast_ref::<Facade>().unwrap();
        assert_eq!(facade.view::<dyn Account>().unwrap().balance(), 100);
        assert!(facade.view::<Savings>().is_none());

        let hidden: &dyn ComponentAdapter = &hidden;
        assert!(!hidden.provides(TypeKey::of::<Savings>()));
        assert!(hidden.view(&instance, TypeKey::of::<dyn Account>()).is_ok());
    }

    #[test]
    fn test_hiding_needs_an_interface() {
        let leaf = InstanceAdapter::new(Key::named("plain"), Arc::new(Savings));
        assert!(matches!(
            HidingImplementation::new(Box::new(leaf)),
            Err(DiError::Composition(_))
        ));

        let own_type = InstanceAdapter::with_metadata(Key::of::<Savings>(), Arc::new(Savings), &metadata());
        assert!(HidingImplementation::new(Box::new(own_type)).is_err());
    }
}
