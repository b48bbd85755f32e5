//! Instrumented article service demonstration.
//!
//! This example composes a registry with an in-memory article service and an
//! authentication service, wraps both in logging decorators, and runs:
//! 1. A successful create, bracketed by entry and exit records
//! 2. A login whose credentials and tokens are redacted
//! 3. A lookup that fails with "not found", logged and returned unchanged
//! 4. A self-referencing value rendered with a bounded depth
//!
//! Run with: `cargo run --example instrumented_articles`
//! Set `RUST_LOG=service_instrument=debug` to also see the registry rewrite.

use std::error::Error;
use std::sync::{Arc, RwLock};

use serde::Serialize;
use service_instrument::articles::{
    self, ArticleService, CreateArticleRequest, InMemoryArticleService,
};
use service_instrument::auth::{
    self, AuthenticationService, InMemoryAuthenticationService, LoginCredentials,
};
use service_instrument::{LogArg, RedactingSerializer, ServiceCollection, TracingSink};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Serialize)]
struct Category {
    name: String,
    parent: Option<Arc<RwLock<Category>>>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Instrumented Services Example ===\n");

    let mut services = ServiceCollection::new();
    services
        .add_log_sink(Arc::new(TracingSink::new()))
        .add_singleton::<dyn ArticleService, _>(|_| Ok(Arc::new(InMemoryArticleService::new())))
        .add_singleton::<dyn AuthenticationService, _>(|_| {
            Ok(Arc::new(
                InMemoryAuthenticationService::new().with_user("alice", "u-1", "hunter2"),
            ))
        });

    // Startup fails here if either capability was never registered.
    articles::decorate_article_service(&mut services)?;
    auth::decorate_authentication_service(&mut services)?;

    for registration in services.registrations() {
        println!("registered {} ({:?})", registration.key(), registration.lifetime());
    }

    let provider = services.build()?;
    let scope = provider.create_scope();
    let article_service = scope.resolve::<dyn ArticleService>()?;
    let authn = scope.resolve::<dyn AuthenticationService>()?;

    println!("\n--- Scenario 1: Create an article ---");
    let created = article_service
        .create_article(CreateArticleRequest::new("A", "B"), "w1")
        .await?;
    println!("✓ Created article {}", created.id);

    println!("\n--- Scenario 2: Sign in ---");
    let response = authn
        .login(LoginCredentials::new("alice", "hunter2"))
        .await?;
    println!(
        "✓ Signed in as {}; no token text appears in the log above",
        response.user_id.as_deref().unwrap_or("?")
    );

    println!("\n--- Scenario 3: Look up a missing article ---");
    match article_service.get_article_by_id(999, "en").await {
        Ok(_) => println!("✗ Unexpectedly found article 999"),
        Err(err) => println!("✓ Caller received: {}", err),
    }

    println!("\n--- Scenario 4: Render a cyclic value ---");
    let category = Arc::new(RwLock::new(Category {
        name: "news".to_string(),
        parent: None,
    }));
    if let Ok(mut guard) = category.write() {
        guard.parent = Some(Arc::clone(&category));
    }
    let text = RedactingSerializer::default().serialize(&LogArg::serialize_only(&category));
    println!("✓ Rendered: {}", text);
    if let Ok(mut guard) = category.write() {
        guard.parent = None;
    }

    println!("\n=== Example Complete ===");
    Ok(())
}
