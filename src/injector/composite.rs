//! Constructor injection followed by several member rules

use super::constructor::ConstructorPlan;
use super::member::{target_of, MemberPlan};
use super::{Discovery, InjectorCore, InjectorOptions};
use crate::adapter::ComponentAdapter;
use crate::guard::Resolver;
use crate::lifecycle::ErasedHooks;
use crate::{AnyArc, Injectable, Key, Provision, Result, TypeKey, TypeMetadata};
use std::any::Any;
use std::sync::Arc;

/// Runs constructor injection, then every member rule hierarchy level by
/// hierarchy level, the root first
pub struct CompositeInjector<T> {
    core: InjectorCore<T>,
    constructor: ConstructorPlan,
    members: MemberPlan,
    discoveries: Vec<Discovery>,
}

impl<T: Injectable> CompositeInjector<T> {
    pub fn new(
        key: impl Into<Key>,
        metadata: TypeMetadata<T>,
        discoveries: Vec<Discovery>,
        options: InjectorOptions,
    ) -> Result<Self> {
        let core = InjectorCore::new(key.into(), metadata, &options)?;
        let constructor = ConstructorPlan::new(&core.metadata, options.constructor_params, false)?;
        let members = MemberPlan::new(&core.metadata, &discoveries, options.member_params)?;
        Ok(Self {
            core,
            constructor,
            members,
            discoveries,
        })
    }

    #[inline]
    pub fn discoveries(&self) -> &[Discovery] {
        &self.discoveries
    }
}

impl<T: Injectable> ComponentAdapter for CompositeInjector<T> {
    fn key(&self) -> &Key {
        &self.core.key
    }

    fn implementation(&self) -> TypeKey {
        self.core.implementation()
    }

    fn provisions(&self) -> &[Provision] {
        self.core.metadata.provisions()
    }

    fn produce(&self, resolver: &Resolver<'_>) -> Result<AnyArc> {
        let _visit = resolver.visit(self.core.implementation())?;
        let mut instance = self.constructor.construct(&self.core, resolver)?;
        self.members.inject(&self.core, &mut instance, None, resolver)?;
        Ok(Arc::new(instance))
    }

    fn verify(&self, resolver: &Resolver<'_>) -> Result<()> {
        let _visit = resolver.visit(self.core.implementation())?;
        self.constructor.verify(&self.core, resolver)?;
        self.members.verify(&self.core, resolver)
    }

    fn decorate_existing(&self, resolver: &Resolver<'_>, instance: &mut dyn Any, level: Option<TypeKey>) -> Result<()> {
        let _visit = resolver.visit(self.core.implementation())?;
        let target = target_of(&self.core, instance)?;
        self.members.inject(&self.core, target, level, resolver)
    }

    fn describe(&self) -> String {
        format!("CompositeInjector[{}]", self.core.type_name())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn hooks(&self) -> ErasedHooks {
        self.core.hooks.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::Resolution;
    use crate::metadata::Member;
    use crate::{Constructor, Container, DiError};

    struct Config(u16);
    struct Pool;
    struct Metrics;

    struct Layer;

    struct Server {
        config: Arc<Config>,
        pool: Option<Arc<Pool>>,
        metrics: Option<Arc<Metrics>>,
        order: Vec<&'static str>,
    }

    fn server() -> TypeMetadata<Server> {
        TypeMetadata::new()
            .extends::<Layer>()
            .constructor(
                Constructor::new(|args| {
                    Ok(Server {
                        config: args.next()?,
                        pool: None,
                        metrics: None,
                        order: vec!["constructor"],
                    })
                })
                .arg::<Config>("config"),
            )
            .member(
                Member::method("init", |s: &mut Server, args| {
                    s.metrics = Some(args.next()?);
                    s.order.push("init");
                    Ok(())
                })
                .arg::<Metrics>("metrics")
                .marked(),
            )
            .member(
                Member::field::<Pool>("pool", |s: &mut Server, p| {
                    s.pool = Some(p);
                    s.order.push("pool");
                })
                .declared_by::<Layer>()
                .marked(),
            )
    }

    fn produce(injector: &CompositeInjector<Server>, container: &Container) -> Result<AnyArc> {
        let resolution = Resolution::new();
        injector.produce(&Resolver::new(container, &resolution))
    }

    #[test]
    fn test_constructor_then_members_root_level_first() {
        let injector = CompositeInjector::new(
            Key::of::<Server>(),
            server(),
            vec![Discovery::MarkedFields, Discovery::MarkedMethods],
            InjectorOptions::default(),
        )
        .unwrap();
        let container = Container::new();
        container.singleton(Config(8080)).unwrap();
        container.singleton(Pool).unwrap();
        container.singleton(Metrics).unwrap();

        let instance = produce(&injector, &container).unwrap();
        let server = instance.downcast_ref::<Server>().unwrap();
        assert_eq!(server.config.0, 8080);
        assert!(server.pool.is_some() && server.metrics.is_some());
        assert_eq!(server.order, vec!["constructor", "pool", "init"]);
    }

    #[test]
    fn test_verify_reports_member_dependencies() {
        let injector = CompositeInjector::new(
            Key::of::<Server>(),
            server(),
            vec![Discovery::MarkedFields, Discovery::MarkedMethods],
            InjectorOptions::default(),
        )
        .unwrap();
        let container = Container::new();
        container.singleton(Config(1)).unwrap();
        container.singleton(Pool).unwrap();

        let resolution = Resolution::new();
        let err = injector.verify(&Resolver::new(&container, &resolution)).unwrap_err();
        match err {
            DiError::UnsatisfiedDependency { unresolved, .. } => {
                assert_eq!(unresolved.len(), 1);
                assert!(unresolved[0].starts_with("init("));
            }
            other => panic!("unexpected error {other}"),
        }
    }
}
