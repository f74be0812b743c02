#![no_main]

//! Fuzz target for registration and resolution across a container tree
//!
//! Drives arbitrary sequences of registrations, removals and lookups and
//! checks that resolution never panics, overflows the stack on cycles, or
//! disagrees with what is registered.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use wiring_injector::{flags, Component, Constructor, Container, DiError, Key, Lookup, TypeKey, TypeMetadata};

#[derive(Clone, Debug, Arbitrary)]
struct Settings {
    id: u32,
    name: String,
}

/// Depends on `Settings`
struct Service {
    settings: Arc<Settings>,
}

/// `Left` and `Right` depend on each other
struct Left {
    _right: Arc<Right>,
}

struct Right {
    _left: Arc<Left>,
}

fn service(cached: bool) -> Component<Service> {
    let component = Component::with_metadata(TypeMetadata::new().constructor(
        Constructor::new(|args| Ok(Service { settings: args.next()? })).arg::<Settings>("settings"),
    ));
    if cached { component.flag(flags::CACHE) } else { component }
}

fn left() -> Component<Left> {
    Component::with_metadata(TypeMetadata::new().constructor(
        Constructor::new(|args| Ok(Left { _right: args.next()? })).arg::<Right>("right"),
    ))
}

fn right() -> Component<Right> {
    Component::with_metadata(TypeMetadata::new().constructor(
        Constructor::new(|args| Ok(Right { _left: args.next()? })).arg::<Left>("left"),
    ))
}

/// Operations against the container at `depth` in the tree
#[derive(Debug, Arbitrary)]
enum ContainerOp {
    RegisterSettings(u8, Settings),
    RegisterNamedSettings(u8, String, Settings),
    RegisterService(u8, bool),
    RegisterCycle(u8),
    RemoveSettings(u8),
    RemoveService(u8),
    GetSettings(u8),
    GetService(u8),
    GetAllSettings(u8),
    GetLeft(u8),
    MakeChild,
    Verify(u8),
}

fn at(tree: &[Container], depth: u8) -> &Container {
    &tree[depth as usize % tree.len()]
}

fuzz_target!(|ops: Vec<ContainerOp>| {
    let mut tree = vec![Container::new()];

    for op in ops.into_iter().take(256) {
        match op {
            ContainerOp::RegisterSettings(depth, settings) => {
                let container = at(&tree, depth);
                let existed = container.contains_key(&Key::of::<Settings>());
                let result = container.singleton(settings);
                assert_eq!(existed, matches!(result, Err(DiError::DuplicateKey { .. })));
            }
            ContainerOp::RegisterNamedSettings(depth, name, settings) => {
                let _ = at(&tree, depth).register_instance(Key::named(name), settings);
            }
            ContainerOp::RegisterService(depth, cached) => {
                let _ = at(&tree, depth).register(service(cached));
            }
            ContainerOp::RegisterCycle(depth) => {
                let container = at(&tree, depth);
                let _ = container.register(left());
                let _ = container.register(right());
            }
            ContainerOp::RemoveSettings(depth) => {
                let container = at(&tree, depth);
                let _ = container.remove(&Key::of::<Settings>());
                assert!(!container.contains_key(&Key::of::<Settings>()));
            }
            ContainerOp::RemoveService(depth) => {
                let _ = at(&tree, depth).remove(&Key::of::<Service>());
            }
            ContainerOp::GetSettings(depth) => {
                let container = at(&tree, depth);
                let by_key = container.get_keyed::<Settings>(&Key::of::<Settings>());
                if let Ok(settings) = by_key {
                    // The exact key wins over named registrations
                    let again = container.get::<Settings>().unwrap();
                    assert!(Arc::ptr_eq(&settings, &again));
                }
            }
            ContainerOp::GetService(depth) => {
                // A cached service may hold settings that were removed since
                if let Ok(service) = at(&tree, depth).get::<Service>() {
                    let _ = (service.settings.id, service.settings.name.len());
                }
            }
            ContainerOp::GetAllSettings(depth) => {
                let container = at(&tree, depth);
                let all = container.get_all::<Settings>().unwrap_or_default();
                let local = container
                    .adapters()
                    .iter()
                    .filter(|adapter| adapter.implementation() == TypeKey::of::<Settings>())
                    .count();
                assert_eq!(all.len(), local);
            }
            ContainerOp::GetLeft(depth) => {
                // A mutual dependency is never satisfiable
                assert!(at(&tree, depth).get::<Left>().is_err());
            }
            ContainerOp::MakeChild => {
                if tree.len() < 8 {
                    let parent = tree[tree.len() - 1].clone();
                    tree.push(parent.make_child());
                }
            }
            ContainerOp::Verify(depth) => {
                let _ = at(&tree, depth).verify();
            }
        }
    }
});
