//! Dependency parameters
//!
//! A [`Parameter`] tells an injector where the value of one dependency comes
//! from. Without explicit parameters every dependency is [`Parameter::Auto`]:
//! resolve by declared type, disambiguated by the injection point's name.

use crate::container::Located;
use crate::guard::Resolver;
use crate::metadata::{ArgValue, Dependency, Shape};
use crate::{AnyArc, Injectable, Key, Result, TypeKey};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Where the value of one dependency comes from
#[derive(Clone)]
pub enum Parameter {
    /// Resolve by the dependency's type; `binding` overrides the injection point's name
    Auto { binding: Option<Cow<'static, str>> },
    /// A literal value of type `ty`
    Constant { value: AnyArc, ty: TypeKey },
    /// The component registered under a specific key
    Reference(Key),
}

impl Parameter {
    /// Resolve by type with the injection point's own name binding
    pub fn auto() -> Self {
        Parameter::Auto { binding: None }
    }

    /// Resolve by type, disambiguating with `binding`
    pub fn bound(binding: impl Into<Cow<'static, str>>) -> Self {
        Parameter::Auto {
            binding: Some(binding.into()),
        }
    }

    /// A literal value
    pub fn constant<T: Injectable>(value: T) -> Self {
        Parameter::Constant {
            value: Arc::new(value),
            ty: TypeKey::of::<T>(),
        }
    }

    /// A literal value viewed through interface `I`
    pub fn constant_dyn<I: ?Sized + Send + Sync + 'static>(value: Arc<I>) -> Self {
        Parameter::Constant {
            value: Arc::new(value),
            ty: TypeKey::of::<I>(),
        }
    }

    /// The component registered under `key`
    pub fn reference(key: impl Into<Key>) -> Self {
        Parameter::Reference(key.into())
    }

    fn locate(&self, dep: &Dependency, site: &Site<'_>, resolver: &Resolver<'_>) -> Result<Source> {
        let container = resolver.container();
        let source = match self {
            Parameter::Constant { value, ty } if *ty == dep.ty() => Source::Constant(Arc::clone(value)),
            Parameter::Constant { .. } => Source::Absent,
            Parameter::Reference(key) => match container.locate_key(key) {
                Some(located) if located.provides(dep.ty()) => match dep.shape() {
                    Shape::All => Source::Many(vec![located]),
                    _ => Source::Component(located),
                },
                _ => Source::Absent,
            },
            Parameter::Auto { binding } => match dep.shape() {
                Shape::All => Source::Many(container.locate_all(dep.ty(), Some(site.requester))),
                _ => {
                    let binding = binding.as_deref().unwrap_or(site.binding);
                    match container.locate_by_type(dep.ty(), Some(binding), Some(site.requester), site.use_names)? {
                        Some(located) => Source::Component(located),
                        None => Source::Absent,
                    }
                }
            },
        };
        Ok(source)
    }

    /// Resolve the value of `dep`; `None` means a required dependency found nothing
    pub(crate) fn resolve(
        &self,
        dep: &Dependency,
        site: &Site<'_>,
        resolver: &Resolver<'_>,
    ) -> Result<Option<ArgValue>> {
        let ty = dep.ty();
        let resolution = resolver.resolution();
        let value = match (self.locate(dep, site, resolver)?, dep.shape()) {
            (Source::Constant(value), Shape::All) => ArgValue::All(vec![value]),
            (Source::Constant(value), Shape::Optional) => ArgValue::Optional(Some(value)),
            (Source::Constant(value), Shape::One) => ArgValue::One(value),
            (Source::Component(located), Shape::Optional) => {
                ArgValue::Optional(Some(located.produce_as(ty, resolution)?))
            }
            (Source::Component(located), _) => ArgValue::One(located.produce_as(ty, resolution)?),
            (Source::Many(found), _) => ArgValue::All(
                found
                    .iter()
                    .map(|located| located.produce_as(ty, resolution))
                    .collect::<Result<_>>()?,
            ),
            (Source::Absent, Shape::One) => return Ok(None),
            (Source::Absent, Shape::Optional) => ArgValue::Optional(None),
            (Source::Absent, Shape::All) => ArgValue::All(Vec::new()),
        };
        Ok(Some(value))
    }

    /// Whether `dep` would resolve, without producing anything
    pub(crate) fn is_resolvable(
        &self,
        dep: &Dependency,
        site: &Site<'_>,
        resolver: &Resolver<'_>,
    ) -> Result<bool> {
        Ok(!dep.is_required() || !matches!(self.locate(dep, site, resolver)?, Source::Absent))
    }

    /// Verify the component graph behind `dep`; `false` means a required dependency found nothing
    pub(crate) fn verify(&self, dep: &Dependency, site: &Site<'_>, resolver: &Resolver<'_>) -> Result<bool> {
        let resolution = resolver.resolution();
        match self.locate(dep, site, resolver)? {
            Source::Component(located) => located.verify(resolution).map(|()| true),
            Source::Many(found) => {
                for located in &found {
                    located.verify(resolution)?;
                }
                Ok(true)
            }
            Source::Constant(_) => Ok(true),
            Source::Absent => Ok(!dep.is_required()),
        }
    }
}

impl Default for Parameter {
    fn default() -> Self {
        Self::auto()
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Auto { binding: None } => f.write_str("Auto"),
            Parameter::Auto { binding: Some(binding) } => write!(f, "Auto({binding:?})"),
            Parameter::Constant { ty, .. } => write!(f, "Constant({ty})"),
            Parameter::Reference(key) => write!(f, "Reference({key})"),
        }
    }
}

/// Injection point an explicit parameter list applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// A member by name, or a setter by the name it binds
    Member(Cow<'static, str>),
    /// The n-th member injection point, in discovery order
    Index(usize),
}

impl Target {
    pub fn member(name: impl Into<Cow<'static, str>>) -> Self {
        Target::Member(name.into())
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Member(name) => write!(f, "member `{name}`"),
            Target::Index(index) => write!(f, "injection point #{index}"),
        }
    }
}

/// The injection point a dependency is resolved for
pub(crate) struct Site<'a> {
    /// Name binding of the point
    pub binding: &'a str,
    /// Key of the component being built, never a candidate for itself
    pub requester: &'a Key,
    /// Prefer a component registered under the binding name
    pub use_names: bool,
}

enum Source {
    Constant(AnyArc),
    Component(Located),
    Many(Vec<Located>),
    Absent,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::Resolution;
    use crate::{Container, DiError};

    struct Port(u16);
    struct Host;

    fn site<'a>(requester: &'a Key) -> Site<'a> {
        Site {
            binding: "port",
            requester,
            use_names: false,
        }
    }

    #[test]
    fn test_constant_must_match_type() {
        let container = Container::new();
        let resolution = Resolution::new();
        let resolver = Resolver::new(&container, &resolution);
        let requester = Key::of::<Host>();

        let param = Parameter::constant(Port(80));
        let dep = Dependency::one::<Port>("port");
        match param.resolve(&dep, &site(&requester), &resolver).unwrap() {
            Some(ArgValue::One(value)) => assert_eq!(value.downcast_ref::<Port>().unwrap().0, 80),
            _ => panic!("constant not resolved"),
        }

        let wrong = Dependency::one::<String>("port");
        assert!(!param.is_resolvable(&wrong, &site(&requester), &resolver).unwrap());
        assert!(param.resolve(&wrong, &site(&requester), &resolver).unwrap().is_none());
    }

    #[test]
    fn test_absent_shapes() {
        let container = Container::new();
        let resolution = Resolution::new();
        let resolver = Resolver::new(&container, &resolution);
        let requester = Key::of::<Host>();
        let param = Parameter::auto();

        let optional = Dependency::optional::<Port>("port");
        assert!(matches!(
            param.resolve(&optional, &site(&requester), &resolver).unwrap(),
            Some(ArgValue::Optional(None))
        ));

        let all = Dependency::all::<Port>("ports");
        match param.resolve(&all, &site(&requester), &resolver).unwrap() {
            Some(ArgValue::All(values)) => assert!(values.is_empty()),
            _ => panic!("collection not resolved"),
        }

        let one = Dependency::one::<Port>("port");
        assert!(!param.verify(&one, &site(&requester), &resolver).unwrap());
    }

    #[test]
    fn test_reference_resolves_named_component() {
        let container = Container::new();
        container.register_instance(Key::named("http"), Port(8080)).unwrap();
        container.register_instance(Key::named("https"), Port(8443)).unwrap();

        let resolution = Resolution::new();
        let resolver = Resolver::new(&container, &resolution);
        let requester = Key::of::<Host>();
        let dep = Dependency::one::<Port>("port");

        // two candidates and a binding matching neither
        let err = Parameter::auto()
            .resolve(&dep, &site(&requester), &resolver)
            .err()
            .unwrap();
        assert!(matches!(err, DiError::AmbiguousResolution { .. }));

        match Parameter::reference("https")
            .resolve(&dep, &site(&requester), &resolver)
            .unwrap()
        {
            Some(ArgValue::One(value)) => assert_eq!(value.downcast_ref::<Port>().unwrap().0, 8443),
            _ => panic!("reference not resolved"),
        }
        match Parameter::bound("http")
            .resolve(&dep, &site(&requester), &resolver)
            .unwrap()
        {
            Some(ArgValue::One(value)) => assert_eq!(value.downcast_ref::<Port>().unwrap().0, 8080),
            _ => panic!("binding not honored"),
        }
    }
}
