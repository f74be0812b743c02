//! Injector strategies
//!
//! An injector is the leaf adapter that actually builds an instance from
//! [`TypeMetadata`]. The strategies differ in which injection points they
//! discover:
//!
//! - [`ConstructorInjector`]: the greediest satisfiable constructor
//! - [`MemberInjector`]: the zero-argument constructor, then the members one
//!   [`Discovery`] rule selects
//! - [`CompositeInjector`]: constructor injection, then several member rules,
//!   hierarchy level by hierarchy level from the root down

mod composite;
mod constructor;
mod member;

pub use composite::CompositeInjector;
pub use constructor::ConstructorInjector;
pub use member::MemberInjector;

use crate::adapter::ComponentAdapter;
use crate::guard::Resolver;
use crate::lifecycle::ErasedHooks;
use crate::metadata::{ArgValue, Dependency, Member, MemberKind};
use crate::parameter::{Parameter, Site, Target};
use crate::properties::{DEFAULT_METHOD_NAME, DEFAULT_SETTER_PREFIX};
use crate::{DiError, Injectable, Key, Result, TypeKey, TypeMetadata};
use std::borrow::Cow;
use std::sync::Arc;

/// Injection strategy of a registered component
#[derive(Debug, Clone, Default)]
pub enum Injection {
    /// Composite over marked fields and methods when the type has marked
    /// members, constructor injection otherwise
    #[default]
    Adaptive,
    /// Greediest satisfiable constructor
    Constructor,
    /// Zero-argument constructor, then the members one rule selects
    Members(Discovery),
    /// Constructor injection, then the members each rule selects
    Composite(Vec<Discovery>),
}

/// Rule selecting member injection points
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// Setters whose name starts with `prefix`; they bind by the remaining name
    Setters { prefix: Cow<'static, str> },
    /// The method with this name
    NamedMethod(Cow<'static, str>),
    /// Every field
    Fields,
    /// Fields with one of these names
    NamedFields(Vec<Cow<'static, str>>),
    /// Fields holding one of these types
    TypedFields(Vec<TypeKey>),
    /// Fields carrying the injection marker
    MarkedFields,
    /// Setters and methods carrying the injection marker
    MarkedMethods,
}

impl Discovery {
    /// Setters with the default `set_` prefix
    pub fn setters() -> Self {
        Discovery::Setters {
            prefix: Cow::Borrowed(DEFAULT_SETTER_PREFIX),
        }
    }

    /// The method named `inject`
    pub fn inject_method() -> Self {
        Discovery::NamedMethod(Cow::Borrowed(DEFAULT_METHOD_NAME))
    }

    pub fn selects<T>(&self, member: &Member<T>) -> bool
    where
        T: Injectable,
    {
        let is_field = member.kind() == MemberKind::Field;
        match self {
            Discovery::Setters { prefix } => member.kind() == MemberKind::Setter && member.name().starts_with(&**prefix),
            Discovery::NamedMethod(name) => member.kind() == MemberKind::Method && member.name() == name,
            Discovery::Fields => is_field,
            Discovery::NamedFields(names) => is_field && names.iter().any(|n| n == member.name()),
            Discovery::TypedFields(types) => {
                is_field && member.dependencies().iter().any(|dep| types.contains(&dep.ty()))
            }
            Discovery::MarkedFields => is_field && member.is_marked(),
            Discovery::MarkedMethods => !is_field && member.is_marked(),
        }
    }

    /// Prefix stripped from setter names to get their name binding
    fn setter_prefix(&self) -> Cow<'static, str> {
        match self {
            Discovery::Setters { prefix } => prefix.clone(),
            _ => Cow::Borrowed(DEFAULT_SETTER_PREFIX),
        }
    }
}

/// Resolution options of an injector
#[derive(Debug, Clone, Default)]
pub struct InjectorOptions {
    /// Prefer a component registered under the injection point's name
    pub use_names: bool,
    /// Skip member injection points that cannot be satisfied
    pub optional: bool,
    /// Explicit constructor parameters; restricts candidates to that arity
    pub constructor_params: Option<Vec<Parameter>>,
    /// Explicit parameters of member injection points
    pub member_params: Vec<(Target, Vec<Parameter>)>,
}

/// Build the leaf injector for `injection`
pub(crate) fn build<T: Injectable>(
    key: Key,
    metadata: TypeMetadata<T>,
    injection: Injection,
    options: InjectorOptions,
) -> Result<Box<dyn ComponentAdapter>> {
    let injection = match injection {
        Injection::Adaptive if metadata.has_marked_members() => {
            Injection::Composite(vec![Discovery::MarkedFields, Discovery::MarkedMethods])
        }
        Injection::Adaptive => Injection::Constructor,
        other => other,
    };
    Ok(match injection {
        Injection::Members(discovery) => Box::new(MemberInjector::new(key, metadata, discovery, options)?),
        Injection::Composite(discoveries) => Box::new(CompositeInjector::new(key, metadata, discoveries, options)?),
        _ => Box::new(ConstructorInjector::new(key, metadata, options)?),
    })
}

/// State shared by every injector strategy
pub(crate) struct InjectorCore<T> {
    pub key: Key,
    pub metadata: Arc<TypeMetadata<T>>,
    pub hooks: ErasedHooks,
    pub use_names: bool,
    pub optional: bool,
}

/// Values of one injection point, or what it is missing
pub(crate) struct Resolved {
    pub values: Vec<ArgValue>,
    pub missing: Vec<String>,
}

impl<T: Injectable> InjectorCore<T> {
    fn new(key: Key, metadata: TypeMetadata<T>, options: &InjectorOptions) -> Result<Self> {
        if !metadata.is_concrete() {
            return Err(DiError::NotConcreteType {
                type_name: std::any::type_name::<T>(),
            });
        }
        let hooks = metadata.hooks().erase();
        Ok(Self {
            key,
            metadata: Arc::new(metadata),
            hooks,
            use_names: options.use_names,
            optional: options.optional,
        })
    }

    #[inline]
    pub fn implementation(&self) -> TypeKey {
        TypeKey::of::<T>()
    }

    #[inline]
    pub fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    pub fn unsatisfied(&self, unresolved: Vec<String>) -> DiError {
        DiError::UnsatisfiedDependency {
            type_name: self.type_name(),
            unresolved,
        }
    }

    fn site<'s>(&'s self, binding: &'s str) -> Site<'s> {
        Site {
            binding,
            requester: &self.key,
            use_names: self.use_names,
        }
    }

    /// Resolve the dependencies of one injection point
    pub fn resolve_point<'m>(
        &self,
        deps: &'m [Dependency],
        params: Option<&[Parameter]>,
        binding: impl Fn(usize) -> &'m str,
        resolver: &Resolver<'_>,
    ) -> Result<Resolved> {
        let auto = Parameter::auto();
        let mut resolved = Resolved {
            values: Vec::with_capacity(deps.len()),
            missing: Vec::new(),
        };
        for (index, dep) in deps.iter().enumerate() {
            let param = params.and_then(|p| p.get(index)).unwrap_or(&auto);
            match param.resolve(dep, &self.site(binding(index)), resolver)? {
                Some(value) => resolved.values.push(value),
                None => resolved.missing.push(dep.to_string()),
            }
        }
        Ok(resolved)
    }

    /// Dependencies of one injection point that cannot be resolved
    pub fn unresolvable<'m>(
        &self,
        deps: &'m [Dependency],
        params: Option<&[Parameter]>,
        binding: impl Fn(usize) -> &'m str,
        resolver: &Resolver<'_>,
    ) -> Result<Vec<String>> {
        let auto = Parameter::auto();
        let mut missing = Vec::new();
        for (index, dep) in deps.iter().enumerate() {
            let param = params.and_then(|p| p.get(index)).unwrap_or(&auto);
            if !param.is_resolvable(dep, &self.site(binding(index)), resolver)? {
                missing.push(dep.to_string());
            }
        }
        Ok(missing)
    }

    /// Verify the graph behind one injection point
    pub fn verify_point<'m>(
        &self,
        deps: &'m [Dependency],
        params: Option<&[Parameter]>,
        binding: impl Fn(usize) -> &'m str,
        resolver: &Resolver<'_>,
    ) -> Result<Vec<String>> {
        let auto = Parameter::auto();
        let mut missing = Vec::new();
        for (index, dep) in deps.iter().enumerate() {
            let param = params.and_then(|p| p.get(index)).unwrap_or(&auto);
            if !param.verify(dep, &self.site(binding(index)), resolver)? {
                missing.push(dep.to_string());
            }
        }
        Ok(missing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Repo;

    struct Handler {
        repo: Option<Arc<Repo>>,
    }

    #[test]
    fn test_discovery_rules() {
        let setter = Member::<Handler>::setter::<Repo>("set_repo", |h, r| h.repo = Some(r));
        let field = Member::<Handler>::field::<Repo>("repo", |h, r| h.repo = Some(r)).marked();
        let method = Member::<Handler>::method("inject", |_, _| Ok(())).arg::<Repo>("repo");

        assert!(Discovery::setters().selects(&setter));
        assert!(!Discovery::setters().selects(&field));
        assert!(Discovery::inject_method().selects(&method));
        assert!(Discovery::MarkedFields.selects(&field));
        assert!(!Discovery::MarkedMethods.selects(&field));
        assert!(Discovery::TypedFields(vec![TypeKey::of::<Repo>()]).selects(&field));
        assert!(Discovery::NamedFields(vec!["repo".into()]).selects(&field));
        assert!(!Discovery::NamedFields(vec!["other".into()]).selects(&field));
        assert!(!Discovery::Setters { prefix: "with_".into() }.selects(&setter));
    }

    #[test]
    fn test_abstract_type_is_rejected() {
        let metadata = TypeMetadata::<Repo>::new().abstract_type();
        let err = ConstructorInjector::new(Key::of::<Repo>(), metadata, InjectorOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, DiError::NotConcreteType { .. }));
    }
}
