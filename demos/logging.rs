//! Example demonstrating logging capabilities
//!
//! Run with JSON logging (production):
//! ```bash
//! cargo run --example logging --features logging-json
//! ```
//!
//! Run with pretty logging (development):
//! ```bash
//! cargo run --example logging --features logging-pretty
//! ```

use wiring_injector::{flags, Component, Constructor, Container, Key, Lookup, TypeMetadata};
use std::sync::Arc;

#[allow(dead_code)]
struct Database {
    url: String,
}

#[allow(dead_code)]
struct UserService {
    db: Arc<Database>,
}

#[allow(dead_code)]
struct RequestContext {
    request_id: String,
}

fn user_service() -> Component<UserService> {
    Component::with_metadata(TypeMetadata::new().constructor(
        Constructor::new(|args| Ok(UserService { db: args.next()? })).arg::<Database>("db"),
    ))
    .flag(flags::CACHE)
}

fn main() {
    // JSON lines with logging-json, plain text otherwise; RUST_LOG overrides
    wiring_injector::logging::builder().trace().di_only().from_env().init();

    println!("=== Wiring Injector Logging Demo ===\n");

    // logs: "Creating container"
    let container = Container::builder().name("app").build();

    // logs: "Assembling component", "Registered component"
    container
        .singleton(Database {
            url: "postgres://localhost/mydb".into(),
        })
        .unwrap();
    container.register(user_service()).unwrap();

    container
        .lazy(|| {
            println!("  [App] Lazy request context being created...");
            RequestContext {
                request_id: "default".into(),
            }
        })
        .unwrap();

    // logs: "Located by key", "Chose constructor", "Cached component instance"
    let _users = container.get::<UserService>().unwrap();

    // Nothing registered, nothing logged beyond the lookup
    assert!(container.try_get::<i32>().is_none());

    // logs: "Creating container" with depth 1
    let request = container.make_child();
    request
        .singleton(RequestContext {
            request_id: "req-12345".into(),
        })
        .unwrap();

    let _ctx = request.get::<RequestContext>().unwrap();
    let _db_from_child = request.get::<Database>().unwrap();

    // logs: "Lifecycle transition" for each step
    container.start().unwrap();
    container.stop().unwrap();

    // logs: "Removed component"
    container.remove(&Key::of::<RequestContext>()).unwrap();

    // logs: "Disposing container"
    container.dispose().unwrap();

    println!("\n=== Demo Complete ===");
    println!("Check the log output above to see structured logging in action!");
    println!("\nTip: Use --features logging-json for production (JSON output)");
    println!("     Use --features logging-pretty for development (colorful output)");
    println!("     Set RUST_LOG to override the filter");
}
