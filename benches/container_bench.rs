//! Benchmarks for the wiring container

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use wiring_injector::{flags, Component, Constructor, Container, Key, Lookup, TypeMetadata};

#[allow(dead_code)]
struct SmallService {
    value: i32,
}

#[allow(dead_code)]
struct MediumService {
    name: String,
    values: Vec<i32>,
}

#[allow(dead_code)]
struct LargeService {
    data: Vec<u8>,
}

#[allow(dead_code)]
struct Repository {
    small: Arc<SmallService>,
}

#[allow(dead_code)]
struct Handler {
    repository: Arc<Repository>,
    medium: Arc<MediumService>,
}

trait Plugin: Send + Sync {
    fn id(&self) -> u32;
}

struct NumberedPlugin(u32);

impl Plugin for NumberedPlugin {
    fn id(&self) -> u32 {
        self.0
    }
}

fn repository() -> Component<Repository> {
    Component::with_metadata(TypeMetadata::new().constructor(
        Constructor::new(|args| Ok(Repository { small: args.next()? })).arg::<SmallService>("small"),
    ))
}

fn handler() -> Component<Handler> {
    Component::with_metadata(
        TypeMetadata::new().constructor(
            Constructor::new(|args| {
                Ok(Handler {
                    repository: args.next()?,
                    medium: args.next()?,
                })
            })
            .arg::<Repository>("repository")
            .arg::<MediumService>("medium"),
        ),
    )
}

fn plugin(id: u32) -> Component<NumberedPlugin> {
    Component::with_metadata(
        TypeMetadata::new()
            .constructor(Constructor::new(move |_| Ok(NumberedPlugin(id))))
            .implements::<dyn Plugin, _>(|this| this as Arc<dyn Plugin>),
    )
    .named(format!("plugin-{}", id))
    .flag(flags::CACHE)
}

fn worker(id: u32) -> Component<NumberedPlugin> {
    Component::with_metadata(
        TypeMetadata::new()
            .constructor(Constructor::new(move |_| Ok(NumberedPlugin(id))))
            .on_start(|plugin| {
                black_box(plugin.id());
                Ok(())
            })
            .on_stop(|_| Ok(())),
    )
    .named(format!("worker-{}", id))
    .flag(flags::CACHE)
}

fn populated() -> Container {
    let container = Container::new();
    container.singleton(SmallService { value: 42 }).unwrap();
    container
        .singleton(MediumService {
            name: "test".to_string(),
            values: vec![1, 2, 3, 4, 5],
        })
        .unwrap();
    container
}

fn bench_registration(c: &mut Criterion) {
    let mut group = c.benchmark_group("registration");

    group.bench_function("singleton_small", |b| {
        b.iter(|| {
            let container = Container::new();
            container.singleton(SmallService { value: 42 }).unwrap();
            black_box(container)
        })
    });

    group.bench_function("lazy", |b| {
        b.iter(|| {
            let container = Container::new();
            container.lazy(|| SmallService { value: 42 }).unwrap();
            black_box(container)
        })
    });

    group.bench_function("transient", |b| {
        b.iter(|| {
            let container = Container::new();
            container.transient(|| SmallService { value: 42 }).unwrap();
            black_box(container)
        })
    });

    group.bench_function("constructor_component", |b| {
        b.iter(|| {
            let container = Container::new();
            container.register(repository()).unwrap();
            black_box(container)
        })
    });

    group.bench_function("cached_component", |b| {
        b.iter(|| {
            let container = Container::new();
            container.register(repository().flag(flags::CACHE)).unwrap();
            black_box(container)
        })
    });

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let mut group = c.benchmark_group("resolution");
    group.throughput(Throughput::Elements(1));

    let container = populated();

    group.bench_function("get_singleton", |b| {
        b.iter(|| black_box(container.get::<SmallService>().unwrap()))
    });

    group.bench_function("contains_check", |b| {
        b.iter(|| black_box(container.contains::<SmallService>()))
    });

    group.bench_function("try_get_found", |b| {
        b.iter(|| black_box(container.try_get::<SmallService>()))
    });

    group.bench_function("try_get_not_found", |b| {
        b.iter(|| black_box(container.try_get::<LargeService>()))
    });

    let key = Key::of::<SmallService>();
    group.bench_function("resolve_by_key", |b| {
        b.iter(|| black_box(container.resolve(&key).unwrap()))
    });

    group.finish();
}

fn bench_injection(c: &mut Criterion) {
    let mut group = c.benchmark_group("injection");
    group.throughput(Throughput::Elements(1));

    let uncached = populated();
    uncached.register(repository()).unwrap();
    uncached.register(handler()).unwrap();

    group.bench_function("constructor_chain_uncached", |b| {
        b.iter(|| black_box(uncached.get::<Handler>().unwrap()))
    });

    let cached = populated();
    cached.register(repository().flag(flags::CACHE)).unwrap();
    cached.register(handler().flag(flags::CACHE)).unwrap();

    group.bench_function("constructor_chain_cached", |b| {
        b.iter(|| black_box(cached.get::<Handler>().unwrap()))
    });

    group.bench_function("verify", |b| b.iter(|| black_box(uncached.verify())));

    group.finish();
}

fn bench_interfaces(c: &mut Criterion) {
    let mut group = c.benchmark_group("interfaces");

    let container = Container::new();
    for id in 0..8 {
        container.register(plugin(id)).unwrap();
    }

    group.bench_function("get_all_8", |b| {
        b.iter(|| black_box(container.get_all_dyn::<dyn Plugin>().unwrap()))
    });

    let key = Key::named("plugin-3");
    group.bench_function("get_keyed", |b| {
        b.iter(|| black_box(container.get_keyed_dyn::<dyn Plugin>(&key).unwrap().id()))
    });

    group.finish();
}

fn bench_hierarchy(c: &mut Criterion) {
    let mut group = c.benchmark_group("hierarchy");

    group.bench_function("make_child", |b| {
        let root = populated();
        b.iter(|| black_box(root.make_child()))
    });

    group.bench_function("resolve_from_parent", |b| {
        let root = populated();
        let child = root.make_child();
        b.iter(|| black_box(child.get::<SmallService>().unwrap()))
    });

    group.bench_function("resolve_from_depth_4", |b| {
        let root = populated();
        let leaf = root.make_child().make_child().make_child().make_child();
        b.iter(|| black_box(leaf.get::<SmallService>().unwrap()))
    });

    group.bench_function("resolve_override", |b| {
        let root = populated();
        let child = root.make_child();
        child.singleton(SmallService { value: 100 }).unwrap();
        b.iter(|| black_box(child.get::<SmallService>().unwrap()))
    });

    group.finish();
}

fn bench_lifecycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("lifecycle");

    group.bench_function("start_stop_16", |b| {
        let container = Container::new();
        for id in 0..16 {
            container.register(worker(id)).unwrap();
        }
        b.iter(|| {
            container.start().unwrap();
            container.stop().unwrap();
        })
    });

    group.finish();
}

fn bench_concurrent(c: &mut Criterion) {
    use std::thread;

    let mut group = c.benchmark_group("concurrent");

    group.bench_function("concurrent_reads_4", |b| {
        let container = populated();
        container.register(repository().flag(flags::CACHE)).unwrap();

        b.iter(|| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let c = container.clone();
                    thread::spawn(move || {
                        for _ in 0..100 {
                            let _ = c.get::<Repository>().unwrap();
                        }
                    })
                })
                .collect();

            for h in handles {
                h.join().unwrap();
            }
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_registration,
    bench_resolution,
    bench_injection,
    bench_interfaces,
    bench_hierarchy,
    bench_lifecycle,
    bench_concurrent,
);

criterion_main!(benches);
