//! Example demonstrating #[derive(Describe)]
//!
//! Run with:
//!   cargo run --example derive --features derive

use wiring_injector::{flags, Component, Constructor, Container, Describe, Lifecycle, Lookup, TypeMetadata};
use std::sync::Arc;

struct Database {
    url: String,
}

// Hand-written metadata next to the derived ones
impl Describe for Database {
    fn describe() -> TypeMetadata<Self> {
        TypeMetadata::new().constructor(Constructor::new(|_| {
            Ok(Database {
                url: "postgres://localhost/app".into(),
            })
        }))
    }
}

trait Plugin: Send + Sync {
    fn name(&self) -> &'static str;
}

#[derive(Default, Describe)]
#[describe(implements(dyn Plugin))]
struct Audit;

impl Plugin for Audit {
    fn name(&self) -> &'static str {
        "audit"
    }
}

#[derive(Default, Describe)]
#[describe(implements(dyn Plugin))]
struct Metrics;

impl Plugin for Metrics {
    fn name(&self) -> &'static str {
        "metrics"
    }
}

#[allow(dead_code)]
struct Cache;

// Service with injected dependencies
#[derive(Describe)]
#[describe(lifecycle)]
struct UserService {
    #[inject]
    db: Arc<Database>,
    #[inject(optional)]
    cache: Option<Arc<Cache>>,
    #[inject(all)]
    plugins: Vec<Arc<dyn Plugin>>,
    // Non-injected field uses Default
    request_count: u64,
}

impl Lifecycle for UserService {
    fn start(&self) -> Result<(), wiring_injector::BoxError> {
        println!("  [UserService] started against {}", self.db.url);
        Ok(())
    }

    fn stop(&self) -> Result<(), wiring_injector::BoxError> {
        println!("  [UserService] stopped");
        Ok(())
    }
}

impl UserService {
    fn summary(&self) -> String {
        let plugins: Vec<_> = self.plugins.iter().map(|p| p.name()).collect();
        format!(
            "UserService on {} ({}, plugins: {:?}, requests: {})",
            self.db.url,
            if self.cache.is_some() { "cached" } else { "uncached" },
            plugins,
            self.request_count
        )
    }
}

// Nested injection
#[derive(Describe)]
struct ApiController {
    #[inject]
    users: Arc<UserService>,
}

fn main() -> wiring_injector::Result<()> {
    println!("=== #[derive(Describe)] Demo ===\n");

    let container = Container::new();
    container.register(Component::<Database>::of().flag(flags::CACHE))?;
    container.register_type::<Audit>()?;
    container.register_type::<Metrics>()?;
    container.register(Component::<UserService>::of().flag(flags::CACHE))?;
    container.register_type::<ApiController>()?;

    let metadata = UserService::describe();
    println!(
        "UserService constructor takes {:?}\n",
        metadata.constructors()[0].dependencies()
    );

    container.start()?;

    let controller = container.get::<ApiController>()?;
    println!("{}", controller.users.summary());
    assert!(Arc::ptr_eq(&controller.users, &container.get::<UserService>()?));

    container.stop()?;
    container.dispose()?;

    println!("\n=== Demo Complete ===");
    Ok(())
}
