//! Component keys
//!
//! A component is registered under a [`Key`]: either a type (concrete or
//! `dyn Trait`), an application-chosen name, or a type qualified by a name.

use std::any::TypeId;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Identity of a Rust type, usable for unsized types such as `dyn Trait`.
///
/// Equality and hashing only consider the `TypeId`; the name is carried for
/// diagnostics.
#[derive(Clone, Copy)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    /// The key of type `T`
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// The underlying `TypeId`
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// The type name, as reported by `std::any::type_name`
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeKey {}

impl Hash for TypeKey {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Key of a registered component.
///
/// Keys are unique within one container; a child container may shadow a key
/// of its parent.
///
/// # Examples
///
/// ```rust
/// use wiring_injector::{Key, TypeKey};
///
/// struct Database;
///
/// assert_eq!(Key::of::<Database>(), Key::Type(TypeKey::of::<Database>()));
/// assert_eq!(Key::named("primary").name(), Some("primary"));
/// assert_eq!(Key::qualified::<Database>("replica").type_key(), Some(TypeKey::of::<Database>()));
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Key {
    /// A type: resolution by this key is resolution by type
    Type(TypeKey),
    /// An application-chosen name
    Name(Cow<'static, str>),
    /// A type plus a qualifier
    Qualified(TypeKey, Cow<'static, str>),
}

impl Key {
    /// Type key of `T`
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Key::Type(TypeKey::of::<T>())
    }

    /// Name key
    #[inline]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Key::Name(name.into())
    }

    /// Type key of `T` qualified by `name`
    #[inline]
    pub fn qualified<T: ?Sized + 'static>(name: impl Into<Cow<'static, str>>) -> Self {
        Key::Qualified(TypeKey::of::<T>(), name.into())
    }

    /// The type part of the key, if any
    pub fn type_key(&self) -> Option<TypeKey> {
        match self {
            Key::Type(ty) | Key::Qualified(ty, _) => Some(*ty),
            Key::Name(_) => None,
        }
    }

    /// The name part of the key, if any
    pub fn name(&self) -> Option<&str> {
        match self {
            Key::Name(name) | Key::Qualified(_, name) => Some(name),
            Key::Type(_) => None,
        }
    }

    /// Whether the key is a plain type key
    #[inline]
    pub fn is_type(&self) -> bool {
        matches!(self, Key::Type(_))
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Type(ty) => write!(f, "{ty}"),
            Key::Name(name) => write!(f, "\"{name}\""),
            Key::Qualified(ty, name) => write!(f, "{ty}@\"{name}\""),
        }
    }
}

impl From<TypeKey> for Key {
    fn from(ty: TypeKey) -> Self {
        Key::Type(ty)
    }
}

impl From<&'static str> for Key {
    fn from(name: &'static str) -> Self {
        Key::Name(Cow::Borrowed(name))
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(Cow::Owned(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    trait Shape {}
    struct Square;

    #[test]
    fn test_type_keys_for_unsized_types() {
        let a = TypeKey::of::<dyn Shape>();
        let b = TypeKey::of::<dyn Shape>();
        assert_eq!(a, b);
        assert_ne!(a, TypeKey::of::<Square>());
        assert!(a.name().contains("Shape"));
    }

    #[test]
    fn test_keys_hash_by_identity() {
        let mut keys = HashSet::new();
        keys.insert(Key::of::<Square>());
        keys.insert(Key::named("square"));
        keys.insert(Key::named(String::from("square")));
        keys.insert(Key::qualified::<Square>("square"));
        assert_eq!(keys.len(), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(Key::named("db").to_string(), "\"db\"");
        assert!(Key::qualified::<Square>("x").to_string().ends_with("@\"x\""));
    }
}
