#![no_main]

//! Fuzz target for container lifecycles
//!
//! Drives arbitrary start/stop/dispose sequences over a container with
//! lifecycle-bearing components and checks them against a model of the
//! state machine: illegal transitions fail without side effects, a failed
//! start rolls back, and started components are always stopped again.

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use wiring_injector::{
    flags, Component, Constructor, Container, DiError, Key, LifecycleState, Lookup, TypeMetadata,
};

struct Counted;

struct Flaky;

fn counted(id: u32, running: Arc<AtomicI64>) -> Component<Counted> {
    let on_stop = Arc::clone(&running);
    Component::with_metadata(
        TypeMetadata::new()
            .constructor(Constructor::new(|_| Ok(Counted)))
            .on_start(move |_| {
                running.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .on_stop(move |_| {
                on_stop.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }),
    )
    .named(format!("counted-{}", id))
    .flag(flags::CACHE)
}

fn flaky(fail: Arc<AtomicBool>) -> Component<Flaky> {
    Component::with_metadata(
        TypeMetadata::new()
            .constructor(Constructor::new(|_| Ok(Flaky)))
            .on_start(move |_| {
                if fail.load(Ordering::SeqCst) {
                    Err("refusing to start".into())
                } else {
                    Ok(())
                }
            }),
    )
    .flag(flags::CACHE)
}

#[derive(Debug, Arbitrary)]
enum LifecycleOp {
    RegisterCounted,
    RegisterLazyCounted,
    RegisterFlaky,
    SetFlakyFailing(bool),
    RemoveCounted(u8),
    ResolveCounted(u8),
    Start,
    Stop,
    Dispose,
    MakeChild,
    StartChild,
    DisposeChild,
}

fuzz_target!(|ops: Vec<LifecycleOp>| {
    let running = Arc::new(AtomicI64::new(0));
    let fail = Arc::new(AtomicBool::new(false));
    let container = Container::new();
    let mut child: Option<Container> = None;

    let mut next_id = 0u32;
    let mut registered: Vec<u32> = Vec::new();
    let mut lazy: Vec<u32> = Vec::new();
    let mut has_flaky = false;
    let mut state = LifecycleState::NotStarted;

    for op in ops.into_iter().take(128) {
        match op {
            LifecycleOp::RegisterCounted => {
                if container.register(counted(next_id, Arc::clone(&running))).is_ok() {
                    registered.push(next_id);
                }
                next_id += 1;
            }
            LifecycleOp::RegisterLazyCounted => {
                let component = counted(next_id, Arc::clone(&running)).flag(flags::LAZY);
                if container.register(component).is_ok() {
                    lazy.push(next_id);
                }
                next_id += 1;
            }
            LifecycleOp::RegisterFlaky => {
                let result = container.register(flaky(Arc::clone(&fail)));
                assert_eq!(has_flaky, matches!(result, Err(DiError::DuplicateKey { .. })));
                has_flaky = true;
            }
            LifecycleOp::SetFlakyFailing(failing) => fail.store(failing, Ordering::SeqCst),
            LifecycleOp::RemoveCounted(index) => {
                if registered.is_empty() {
                    continue;
                }
                let id = registered.remove(index as usize % registered.len());
                let removed = container.remove(&Key::named(format!("counted-{}", id)));
                assert!(matches!(removed, Ok(Some(_))));
            }
            LifecycleOp::ResolveCounted(index) => {
                let ids: Vec<u32> = registered.iter().chain(lazy.iter()).copied().collect();
                if ids.is_empty() {
                    continue;
                }
                let key = Key::named(format!("counted-{}", ids[index as usize % ids.len()]));
                let resolved = container.get_keyed::<Counted>(&key);
                assert!(resolved.is_ok() || state.is_disposed());
            }
            LifecycleOp::Start => {
                let result = container.start();
                if !state.can_start() {
                    assert!(matches!(result, Err(DiError::IllegalLifecycleState { .. })));
                    continue;
                }
                if has_flaky && fail.load(Ordering::SeqCst) {
                    assert!(result.is_err());
                    assert_eq!(running.load(Ordering::SeqCst), 0);
                    state = LifecycleState::Stopped;
                } else {
                    assert!(result.is_ok());
                    assert!(running.load(Ordering::SeqCst) >= registered.len() as i64);
                    state = LifecycleState::Started;
                }
            }
            LifecycleOp::Stop => {
                let result = container.stop();
                if state.can_stop() {
                    assert!(result.is_ok());
                    assert_eq!(running.load(Ordering::SeqCst), 0);
                    state = LifecycleState::Stopped;
                } else {
                    assert!(matches!(result, Err(DiError::IllegalLifecycleState { .. })));
                }
            }
            LifecycleOp::Dispose => {
                let result = container.dispose();
                if state.can_dispose() {
                    assert!(result.is_ok());
                    assert_eq!(running.load(Ordering::SeqCst), 0);
                    state = LifecycleState::Disposed;
                } else {
                    assert!(matches!(result, Err(DiError::IllegalLifecycleState { .. })));
                }
            }
            LifecycleOp::MakeChild => {
                if !state.is_disposed() {
                    child = Some(container.make_child());
                }
            }
            LifecycleOp::StartChild => {
                if let Some(child) = &child {
                    let _ = child.start();
                }
            }
            LifecycleOp::DisposeChild => {
                if let Some(child) = child.take() {
                    let _ = child.dispose();
                    assert!(child.state().is_disposed());
                }
            }
        }
        assert_eq!(container.state(), state);
    }
});
