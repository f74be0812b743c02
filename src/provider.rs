//! Injectable marker and type-erased instance plumbing
//!
//! Instances travel through the engine as [`AnyArc`]. A concrete type `T` is
//! stored as `T`; a view through an interface `dyn I` is stored as `Arc<dyn I>`
//! inside the erased arc. [`Provision`] describes one type an adapter's
//! instances can be viewed as, together with the cast producing that view.

use crate::behavior::Facade;
use crate::{DiError, Key, Result, TypeKey};
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased shared instance.
pub type AnyArc = Arc<dyn Any + Send + Sync>;

/// Marker trait for types that can be managed by a container.
///
/// This is automatically implemented for all types that are `Send + Sync + 'static`.
/// You never need to implement this manually.
pub trait Injectable: Send + Sync + 'static {
    /// Returns the key of this type (for internal use)
    #[inline]
    fn type_key_of() -> TypeKey
    where
        Self: Sized,
    {
        TypeKey::of::<Self>()
    }

    /// Returns the type name for debugging
    #[inline]
    fn type_name_of() -> &'static str
    where
        Self: Sized,
    {
        std::any::type_name::<Self>()
    }
}

// Blanket implementation - everything that's Send + Sync + 'static is Injectable
impl<T: Send + Sync + 'static> Injectable for T {}

type CastFn = Arc<dyn Fn(&AnyArc) -> Option<AnyArc> + Send + Sync>;

/// A type an adapter's instances are assignable to, with the cast to view them as it.
#[derive(Clone)]
pub struct Provision {
    ty: TypeKey,
    cast: CastFn,
}

impl Provision {
    /// The implementation type itself (identity view)
    pub fn itself<T: Injectable>() -> Self {
        Self {
            ty: TypeKey::of::<T>(),
            cast: Arc::new(|instance: &AnyArc| instance.is::<T>().then(|| Arc::clone(instance))),
        }
    }

    /// An interface `I` implemented by `T`, viewed through `cast`.
    ///
    /// The view is stored as `Arc<I>` inside the erased arc.
    pub fn interface<T, I, F>(cast: F) -> Self
    where
        T: Injectable,
        I: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        Self {
            ty: TypeKey::of::<I>(),
            cast: Arc::new(move |instance: &AnyArc| {
                let concrete = Arc::clone(instance).downcast::<T>().ok()?;
                Some(Arc::new(cast(concrete)) as AnyArc)
            }),
        }
    }

    /// Identity view of an instance that already is a view through `I`
    pub fn view<I: ?Sized + Send + Sync + 'static>() -> Self {
        Self {
            ty: TypeKey::of::<I>(),
            cast: Arc::new(|instance: &AnyArc| instance.is::<Arc<I>>().then(|| Arc::clone(instance))),
        }
    }

    /// The type this provision makes the instance assignable to
    #[inline]
    pub fn ty(&self) -> TypeKey {
        self.ty
    }

    /// View `instance` as this provision's type.
    ///
    /// A [`Facade`] answers with its stored view instead of the cast.
    pub fn apply(&self, instance: &AnyArc) -> Option<AnyArc> {
        if let Some(facade) = instance.downcast_ref::<Facade>() {
            return facade.view_any(self.ty);
        }
        (self.cast)(instance)
    }
}

impl fmt::Debug for Provision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Provision").field(&self.ty).finish()
    }
}

/// Downcast an erased concrete instance.
pub fn downcast<T: Injectable>(key: &Key, instance: AnyArc) -> Result<Arc<T>> {
    instance.downcast::<T>().map_err(|_| DiError::TypeMismatch {
        key: key.to_string(),
        expected: std::any::type_name::<T>(),
    })
}

/// Unwrap an erased interface view (`Arc<I>` stored inside the erased arc).
pub fn downcast_dyn<I: ?Sized + Send + Sync + 'static>(key: &Key, instance: AnyArc) -> Result<Arc<I>> {
    instance
        .downcast::<Arc<I>>()
        .map(|view| Arc::clone(&*view))
        .map_err(|_| DiError::TypeMismatch {
            key: key.to_string(),
            expected: std::any::type_name::<I>(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".into()
        }
    }

    #[test]
    fn test_identity_provision() {
        let provision = Provision::itself::<English>();
        let instance: AnyArc = Arc::new(English);
        let viewed = provision.apply(&instance).unwrap();
        assert!(Arc::ptr_eq(&viewed, &instance));

        let other: AnyArc = Arc::new(42u32);
        assert!(provision.apply(&other).is_none());
    }

    #[test]
    fn test_interface_provision() {
        let provision = Provision::interface::<English, dyn Greeter, _>(|e| e as Arc<dyn Greeter>);
        assert_eq!(provision.ty(), TypeKey::of::<dyn Greeter>());

        let instance: AnyArc = Arc::new(English);
        let viewed = provision.apply(&instance).unwrap();
        let greeter = downcast_dyn::<dyn Greeter>(&Key::of::<dyn Greeter>(), viewed).unwrap();
        assert_eq!(greeter.greet(), "hello");
    }

    #[test]
    fn test_downcast_mismatch() {
        let instance: AnyArc = Arc::new(English);
        let err = downcast::<u32>(&Key::named("english"), instance).unwrap_err();
        assert!(matches!(err, DiError::TypeMismatch { .. }));
    }
}
