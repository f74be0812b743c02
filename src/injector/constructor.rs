//! Constructor injection

use super::{InjectorCore, InjectorOptions};
use crate::adapter::ComponentAdapter;
use crate::guard::Resolver;
use crate::lifecycle::ErasedHooks;
use crate::metadata::{Args, Constructor};
use crate::parameter::Parameter;
use crate::{AnyArc, DiError, Injectable, Key, Provision, Result, TypeKey, TypeMetadata};
use std::any::Any;
use std::cmp::Reverse;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// Constructor candidates of one component, greediest first
pub(crate) struct ConstructorPlan {
    candidates: Vec<usize>,
    params: Option<Vec<Parameter>>,
}

impl ConstructorPlan {
    /// Candidates of `metadata`; explicit parameters restrict them to that arity
    pub(crate) fn new<T: Injectable>(
        metadata: &TypeMetadata<T>,
        params: Option<Vec<Parameter>>,
        zero_arg_only: bool,
    ) -> Result<Self> {
        let type_name = std::any::type_name::<T>();
        let constructors = metadata.constructors();
        if constructors.is_empty() {
            return Err(DiError::composition(format!("{type_name} declares no constructor")));
        }

        let mut candidates: Vec<usize> = (0..constructors.len())
            .filter(|&i| {
                let arity = constructors[i].arity();
                (!zero_arg_only || arity == 0) && params.as_ref().is_none_or(|p| p.len() == arity)
            })
            .collect();
        if candidates.is_empty() {
            let reason = if zero_arg_only {
                format!("{type_name} needs a zero-argument constructor for member injection")
            } else {
                let count = params.as_ref().map_or(0, Vec::len);
                format!("{type_name} has no constructor taking {count} parameters")
            };
            return Err(DiError::composition(reason));
        }
        // stable: declaration order breaks arity ties
        candidates.sort_by_key(|&i| Reverse(constructors[i].arity()));
        Ok(Self { candidates, params })
    }

    /// The greediest satisfiable constructor
    pub(crate) fn choose<'m, T: Injectable>(
        &self,
        core: &'m InjectorCore<T>,
        resolver: &Resolver<'_>,
    ) -> Result<&'m Constructor<T>> {
        let constructors = core.metadata.constructors();
        let mut chosen: Option<&Constructor<T>> = None;
        let mut satisfiable = 0;
        let mut greediest_missing: Option<Vec<String>> = None;

        for &index in &self.candidates {
            let ctor = &constructors[index];
            if chosen.is_some_and(|best| ctor.arity() < best.arity()) {
                break;
            }
            let deps = ctor.dependencies();
            let missing = core.unresolvable(deps, self.params.as_deref(), |i| deps[i].name(), resolver)?;
            if missing.is_empty() {
                satisfiable += 1;
                chosen.get_or_insert(ctor);
            } else if greediest_missing.is_none() {
                greediest_missing = Some(missing);
            }
        }

        match chosen {
            Some(ctor) if satisfiable > 1 => Err(DiError::TooManySatisfiableConstructors {
                type_name: core.type_name(),
                arity: ctor.arity(),
                count: satisfiable,
            }),
            Some(ctor) => {
                #[cfg(feature = "logging")]
                trace!(
                    target: "wiring_injector",
                    implementation = core.type_name(),
                    arity = ctor.arity(),
                    "Chose constructor"
                );
                Ok(ctor)
            }
            None => Err(core.unsatisfied(greediest_missing.unwrap_or_default())),
        }
    }

    /// Choose a constructor and call it
    pub(crate) fn construct<T: Injectable>(&self, core: &InjectorCore<T>, resolver: &Resolver<'_>) -> Result<T> {
        let ctor = self.choose(core, resolver)?;
        let deps = ctor.dependencies();
        let resolved = core.resolve_point(deps, self.params.as_deref(), |i| deps[i].name(), resolver)?;
        if !resolved.missing.is_empty() {
            return Err(core.unsatisfied(resolved.missing));
        }
        ctor.build(Args::new(resolved.values))
            .map_err(|e| DiError::instantiation(core.type_name(), e))
    }

    pub(crate) fn verify<T: Injectable>(&self, core: &InjectorCore<T>, resolver: &Resolver<'_>) -> Result<()> {
        let ctor = self.choose(core, resolver)?;
        let deps = ctor.dependencies();
        let missing = core.verify_point(deps, self.params.as_deref(), |i| deps[i].name(), resolver)?;
        if missing.is_empty() {
            Ok(())
        } else {
            Err(core.unsatisfied(missing))
        }
    }
}

/// Builds instances with the greediest satisfiable constructor
pub struct ConstructorInjector<T> {
    core: InjectorCore<T>,
    plan: ConstructorPlan,
}

impl<T: Injectable> ConstructorInjector<T> {
    pub fn new(key: impl Into<Key>, metadata: TypeMetadata<T>, options: InjectorOptions) -> Result<Self> {
        let core = InjectorCore::new(key.into(), metadata, &options)?;
        if let Some((target, _)) = options.member_params.first() {
            return Err(DiError::composition(format!(
                "{target} of {} is not an injection point: constructor injection has no members",
                core.type_name()
            )));
        }
        let plan = ConstructorPlan::new(&core.metadata, options.constructor_params, false)?;
        Ok(Self { core, plan })
    }
}

impl<T: Injectable> ComponentAdapter for ConstructorInjector<T> {
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
        let instance = self.plan.construct(&self.core, resolver)?;
        Ok(Arc::new(instance))
    }

    fn verify(&self, resolver: &Resolver<'_>) -> Result<()> {
        let _visit = resolver.visit(self.core.implementation())?;
        self.plan.verify(&self.core, resolver)
    }

    fn decorate_existing(&self, resolver: &Resolver<'_>, _instance: &mut dyn Any, _level: Option<TypeKey>) -> Result<()> {
        let _visit = resolver.visit(self.core.implementation())?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("ConstructorInjector[{}]", self.core.type_name())
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
    use crate::parameter::Target;
    use crate::{Constructor, Container};

    struct Engine(u32);

    #[derive(Default)]
    struct Wheels;

    struct Car {
        engine: Option<Arc<Engine>>,
        wheels: Option<Arc<Wheels>>,
    }

    fn car() -> TypeMetadata<Car> {
        TypeMetadata::new()
            .constructor(Constructor::new(|_| {
                Ok(Car {
                    engine: None,
                    wheels: None,
                })
            }))
            .constructor(
                Constructor::new(|args| {
                    Ok(Car {
                        engine: Some(args.next()?),
                        wheels: None,
                    })
                })
                .arg::<Engine>("engine"),
            )
            .constructor(
                Constructor::new(|args| {
                    Ok(Car {
                        engine: Some(args.next()?),
                        wheels: Some(args.next()?),
                    })
                })
                .arg::<Engine>("engine")
                .arg::<Wheels>("wheels"),
            )
    }

    fn produce(injector: &ConstructorInjector<Car>, container: &Container) -> Result<AnyArc> {
        let resolution = Resolution::new();
        injector.produce(&Resolver::new(container, &resolution))
    }

    #[test]
    fn test_greediest_satisfiable_constructor_wins() {
        let injector = ConstructorInjector::new(Key::of::<Car>(), car(), InjectorOptions::default()).unwrap();
        let container = Container::new();

        let instance = produce(&injector, &container).unwrap();
        assert!(instance.downcast_ref::<Car>().unwrap().engine.is_none());

        container.singleton(Engine(8)).unwrap();
        let instance = produce(&injector, &container).unwrap();
        let car = instance.downcast_ref::<Car>().unwrap();
        assert_eq!(car.engine.as_ref().unwrap().0, 8);
        assert!(car.wheels.is_none());

        container.singleton(Wheels).unwrap();
        let instance = produce(&injector, &container).unwrap();
        assert!(instance.downcast_ref::<Car>().unwrap().wheels.is_some());
    }

    #[test]
    fn test_equally_greedy_constructors_are_ambiguous() {
        let metadata = TypeMetadata::<Car>::new()
            .constructor(
                Constructor::new(|args| {
                    Ok(Car {
                        engine: Some(args.next()?),
                        wheels: None,
                    })
                })
                .arg::<Engine>("engine"),
            )
            .constructor(
                Constructor::new(|args| {
                    Ok(Car {
                        engine: None,
                        wheels: Some(args.next()?),
                    })
                })
                .arg::<Wheels>("wheels"),
            );
        let injector = ConstructorInjector::new(Key::of::<Car>(), metadata, InjectorOptions::default()).unwrap();
        let container = Container::new();
        container.singleton(Engine(1)).unwrap();
        container.singleton(Wheels).unwrap();

        let err = produce(&injector, &container).err().unwrap();
        assert!(matches!(
            err,
            DiError::TooManySatisfiableConstructors { arity: 1, count: 2, .. }
        ));
    }

    #[test]
    fn test_unsatisfied_reports_greediest_constructor() {
        let metadata = TypeMetadata::<Car>::new().constructor(
            Constructor::new(|args| {
                Ok(Car {
                    engine: Some(args.next()?),
                    wheels: Some(args.next()?),
                })
            })
            .arg::<Engine>("engine")
            .arg::<Wheels>("wheels"),
        );
        let injector = ConstructorInjector::new(Key::of::<Car>(), metadata, InjectorOptions::default()).unwrap();
        let container = Container::new();
        container.singleton(Engine(1)).unwrap();

        match produce(&injector, &container).err().unwrap() {
            DiError::UnsatisfiedDependency { unresolved, .. } => {
                assert_eq!(unresolved.len(), 1);
                assert!(unresolved[0].contains("wheels"));
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_explicit_parameters_select_arity() {
        let options = InjectorOptions {
            constructor_params: Some(vec![Parameter::constant(Engine(3))]),
            ..Default::default()
        };
        let injector = ConstructorInjector::new(Key::of::<Car>(), car(), options).unwrap();
        let container = Container::new();
        container.singleton(Wheels).unwrap();

        let instance = produce(&injector, &container).unwrap();
        let car = instance.downcast_ref::<Car>().unwrap();
        assert_eq!(car.engine.as_ref().unwrap().0, 3);
        assert!(car.wheels.is_none());

        let options = InjectorOptions {
            constructor_params: Some(vec![Parameter::auto(); 4]),
            ..Default::default()
        };
        assert!(ConstructorInjector::new(Key::of::<Car>(), self::car(), options).is_err());
    }

    #[test]
    fn test_member_parameters_are_rejected() {
        let options = InjectorOptions {
            member_params: vec![(Target::member("engine"), vec![Parameter::auto()])],
            ..Default::default()
        };
        let err = ConstructorInjector::new(Key::of::<Car>(), car(), options).err().unwrap();
        assert!(matches!(err, DiError::Composition(_)));
    }

    #[test]
    fn test_no_constructor_is_rejected() {
        let err = ConstructorInjector::new(Key::of::<Car>(), TypeMetadata::<Car>::new(), InjectorOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, DiError::Composition(_)));
    }
}
