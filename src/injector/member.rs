//! Member injection: fields, setters and methods of an existing instance

use super::constructor::ConstructorPlan;
use super::{Discovery, InjectorCore, InjectorOptions};
use crate::adapter::ComponentAdapter;
use crate::guard::Resolver;
use crate::lifecycle::ErasedHooks;
use crate::metadata::{ArgValue, Args, Member, MemberKind};
use crate::parameter::{Parameter, Target};
use crate::{AnyArc, DiError, Injectable, Key, Provision, Result, TypeKey, TypeMetadata};
use std::any::Any;
use std::borrow::Cow;
use std::sync::Arc;

#[cfg(feature = "logging")]
use tracing::trace;

/// One selected injection point
struct Point {
    member: usize,
    /// Position of the declaring level in the hierarchy, root first
    level: usize,
    prefix: Cow<'static, str>,
    params: Option<Vec<Parameter>>,
}

/// Member injection points of one component, root level first
pub(crate) struct MemberPlan {
    points: Vec<Point>,
}

impl MemberPlan {
    pub(crate) fn new<T: Injectable>(
        metadata: &TypeMetadata<T>,
        discoveries: &[Discovery],
        member_params: Vec<(Target, Vec<Parameter>)>,
    ) -> Result<Self> {
        let type_name = std::any::type_name::<T>();
        let hierarchy = metadata.hierarchy();
        let members = metadata.members();

        let mut points: Vec<Point> = Vec::new();
        for discovery in discoveries {
            for (index, member) in members.iter().enumerate() {
                if !discovery.selects(member) || points.iter().any(|p| p.member == index) {
                    continue;
                }
                let level = hierarchy
                    .iter()
                    .position(|l| *l == member.level())
                    .unwrap_or(hierarchy.len());
                points.push(Point {
                    member: index,
                    level,
                    prefix: discovery.setter_prefix(),
                    params: None,
                });
            }
        }
        // stable: discovery order, then declaration order, within a level
        points.sort_by_key(|p| p.level);

        for (target, params) in member_params {
            let point = match &target {
                Target::Index(n) => points.get_mut(*n),
                Target::Member(name) => points.iter_mut().find(|p| {
                    let member = &members[p.member];
                    member.name() == name || member.binding(0, &p.prefix) == name
                }),
            }
            .ok_or_else(|| DiError::composition(format!("{target} matches no injection point of {type_name}")))?;

            let member = &members[point.member];
            let arity = member.dependencies().len();
            if params.len() != arity {
                return Err(DiError::composition(format!(
                    "{} of {type_name} takes {arity} parameters, {} given",
                    member.name(),
                    params.len()
                )));
            }
            point.params = Some(params);
        }
        Ok(Self { points })
    }

    pub(crate) fn len(&self) -> usize {
        self.points.len()
    }

    /// Inject every point declared at `level`, or at every level root first
    pub(crate) fn inject<T: Injectable>(
        &self,
        core: &InjectorCore<T>,
        target: &mut T,
        level: Option<TypeKey>,
        resolver: &Resolver<'_>,
    ) -> Result<()> {
        let mut start = 0;
        while start < self.points.len() {
            let depth = self.points[start].level;
            let end = self.points[start..]
                .iter()
                .position(|p| p.level != depth)
                .map_or(self.points.len(), |n| start + n);
            let ready = self.resolve(core, &self.points[start..end], level, resolver)?;
            self.apply(core, target, ready)?;
            start = end;
        }
        Ok(())
    }

    /// Values of `points`; unsatisfied points are skipped when optional
    fn resolve<T: Injectable>(
        &self,
        core: &InjectorCore<T>,
        points: &[Point],
        level: Option<TypeKey>,
        resolver: &Resolver<'_>,
    ) -> Result<Vec<(usize, Vec<ArgValue>)>> {
        let members = core.metadata.members();
        let mut ready = Vec::with_capacity(points.len());
        let mut missing = Vec::new();

        for point in points {
            let member = &members[point.member];
            if level.is_some_and(|ty| member.level() != ty) {
                continue;
            }
            let deps = member.dependencies();
            let resolved = core.resolve_point(
                deps,
                point.params.as_deref(),
                |i| member.binding(i, &point.prefix),
                resolver,
            )?;
            if resolved.missing.is_empty() {
                ready.push((point.member, resolved.values));
            } else if core.optional {
                #[cfg(feature = "logging")]
                trace!(
                    target: "wiring_injector",
                    implementation = core.type_name(),
                    member = member.name(),
                    "Skipping unsatisfied optional injection point"
                );
            } else {
                missing.extend(resolved.missing.into_iter().map(|dep| label(member, dep)));
            }
        }

        if missing.is_empty() {
            Ok(ready)
        } else {
            Err(core.unsatisfied(missing))
        }
    }

    fn apply<T: Injectable>(
        &self,
        core: &InjectorCore<T>,
        target: &mut T,
        ready: Vec<(usize, Vec<ArgValue>)>,
    ) -> Result<()> {
        let members = core.metadata.members();
        for (index, values) in ready {
            let member = &members[index];
            member
                .inject(target, Args::new(values))
                .map_err(|e| DiError::invocation(core.type_name(), member.name(), e))?;
        }
        Ok(())
    }

    pub(crate) fn verify<T: Injectable>(&self, core: &InjectorCore<T>, resolver: &Resolver<'_>) -> Result<()> {
        let members = core.metadata.members();
        let mut missing = Vec::new();
        for point in &self.points {
            let member = &members[point.member];
            let deps = member.dependencies();
            let unresolved = core.verify_point(
                deps,
                point.params.as_deref(),
                |i| member.binding(i, &point.prefix),
                resolver,
            )?;
            if !core.optional {
                missing.extend(unresolved.into_iter().map(|dep| label(member, dep)));
            }
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(core.unsatisfied(missing))
        }
    }
}

fn label<T>(member: &Member<T>, dep: String) -> String
where
    T: Injectable,
{
    match member.kind() {
        MemberKind::Field => dep,
        _ => format!("{}({dep})", member.name()),
    }
}

/// Downcast the instance handed to `decorate_existing`
pub(crate) fn target_of<'i, T: Injectable>(core: &InjectorCore<T>, instance: &'i mut dyn Any) -> Result<&'i mut T> {
    instance.downcast_mut::<T>().ok_or_else(|| DiError::TypeMismatch {
        key: core.key.to_string(),
        expected: core.type_name(),
    })
}

/// Builds instances with the zero-argument constructor, then injects the
/// members one [`Discovery`] rule selects
pub struct MemberInjector<T> {
    core: InjectorCore<T>,
    constructor: ConstructorPlan,
    members: MemberPlan,
    discovery: Discovery,
}

impl<T: Injectable> MemberInjector<T> {
    pub fn new(
        key: impl Into<Key>,
        metadata: TypeMetadata<T>,
        discovery: Discovery,
        options: InjectorOptions,
    ) -> Result<Self> {
        let core = InjectorCore::new(key.into(), metadata, &options)?;
        let constructor = ConstructorPlan::new(&core.metadata, options.constructor_params, true)?;
        let members = MemberPlan::new(&core.metadata, std::slice::from_ref(&discovery), options.member_params)?;
        Ok(Self {
            core,
            constructor,
            members,
            discovery,
        })
    }

    #[inline]
    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    /// Number of selected injection points
    #[inline]
    pub fn injection_points(&self) -> usize {
        self.members.len()
    }
}

impl<T: Injectable> ComponentAdapter for MemberInjector<T> {
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
        format!("MemberInjector[{}]", self.core.type_name())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn hooks(&self) -> ErasedHooks {
        self.core.hooks.clone()
    }
}
