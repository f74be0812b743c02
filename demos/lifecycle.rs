//! Example demonstrating container lifecycles
//!
//! Run with:
//!   cargo run --example lifecycle

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use wiring_injector::{
    flags, BoxError, Component, Constructor, Container, Lifecycle, LifecycleState, Lookup, TypeMetadata,
};

struct ConnectionPool {
    size: usize,
}

impl Lifecycle for ConnectionPool {
    fn start(&self) -> Result<(), BoxError> {
        println!("  [Pool] opening {} connections", self.size);
        Ok(())
    }

    fn stop(&self) -> Result<(), BoxError> {
        println!("  [Pool] closing connections");
        Ok(())
    }

    fn dispose(&self) -> Result<(), BoxError> {
        println!("  [Pool] released");
        Ok(())
    }
}

struct HttpServer {
    pool: Arc<ConnectionPool>,
}

impl Lifecycle for HttpServer {
    fn start(&self) -> Result<(), BoxError> {
        println!("  [Server] listening with a pool of {}", self.pool.size);
        Ok(())
    }

    fn stop(&self) -> Result<(), BoxError> {
        println!("  [Server] draining requests");
        Ok(())
    }
}

struct Session;

struct Scheduler;

fn pool() -> Component<ConnectionPool> {
    Component::with_metadata(
        TypeMetadata::new()
            .constructor(Constructor::new(|_| Ok(ConnectionPool { size: 8 })))
            .lifecycle(),
    )
    .flag(flags::CACHE)
}

fn server() -> Component<HttpServer> {
    Component::with_metadata(
        TypeMetadata::new()
            .constructor(Constructor::new(|args| Ok(HttpServer { pool: args.next()? })).arg::<ConnectionPool>("pool"))
            .lifecycle(),
    )
    .flag(flags::CACHE)
}

fn session() -> Component<Session> {
    Component::with_metadata(
        TypeMetadata::new()
            .constructor(Constructor::new(|_| Ok(Session)))
            .on_start(|_| {
                println!("  [Session] opened");
                Ok(())
            })
            .on_stop(|_| {
                println!("  [Session] closed");
                Ok(())
            }),
    )
    .flag(flags::CACHE)
}

fn scheduler(fail: Arc<AtomicBool>) -> Component<Scheduler> {
    Component::with_metadata(
        TypeMetadata::new()
            .constructor(Constructor::new(|_| Ok(Scheduler)))
            .on_start(move |_| {
                if fail.load(Ordering::SeqCst) {
                    return Err("no worker threads available".into());
                }
                println!("  [Scheduler] running");
                Ok(())
            }),
    )
    .flag(flags::CACHE)
}

fn main() -> wiring_injector::Result<()> {
    println!("=== Lifecycle Demo ===\n");

    let app = Container::builder().name("app").build();
    // Registered before its dependency; still started after it
    app.register(server())?;
    app.register(pool())?;

    let request = app.make_child();
    request.register(session())?;

    println!("Starting app (children follow their parent):");
    app.start()?;
    assert_eq!(app.state(), LifecycleState::Started);
    assert_eq!(request.state(), LifecycleState::Started);

    println!("\nStopping app (reverse order):");
    app.stop()?;

    println!("\nStarting again with a failing component:");
    let fail = Arc::new(AtomicBool::new(true));
    let jobs = Container::builder().name("jobs").build();
    jobs.register(pool())?;
    jobs.register(scheduler(fail.clone()))?;
    match jobs.start() {
        Ok(()) => println!("  unexpected success"),
        Err(e) => println!("  start failed: {}", e),
    }
    // Everything started before the failure has been stopped again
    assert_eq!(jobs.state(), LifecycleState::Stopped);

    fail.store(false, Ordering::SeqCst);
    jobs.start()?;
    jobs.dispose()?;

    println!("\nLazy components start when first requested:");
    let lazy = Container::new();
    lazy.register(session().flag(flags::LAZY))?;
    lazy.start()?;
    let _session = lazy.get::<Session>()?;
    lazy.dispose()?;

    println!("\nDisposing app:");
    app.dispose()?;
    assert!(app.state().is_disposed());

    if let Err(e) = app.start() {
        println!("  after dispose: {}", e);
    }

    println!("\n=== Demo Complete ===");
    Ok(())
}
