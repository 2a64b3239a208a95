use std::env;
use std::sync::Arc;

use client_runtime::navigation::{MemoryRouter, Navigator, Route, Router};
use client_runtime::oauth::{redirect_gitlab, verify_state, OAuthConfig, RedirectOutcome};
use client_runtime::query::url_queries;
use client_runtime::storage::FileStore;
use client_runtime::transport::GraphQLRequest;
use client_runtime::{create_provider, on_login, ProviderOverrides};
use service_core::telemetry::logging::{init_subscriber, make_subscriber};

type Error = Box<dyn std::error::Error>;

/// Stands in for the browser: prints where it would go.
struct PrintNavigator;

impl Navigator for PrintNavigator {
    fn assign(&self, url: &str) {
        println!("Open {} to log in.", url);
    }
}

/// Usage: `client_test [location.search]`, e.g. `client_test '?code=...&state=...'`.
#[tokio::main]
async fn main() -> Result<(), Error> {
    init_subscriber(make_subscriber("client_test", "info", std::io::stdout))?;

    let search = env::args().nth(1).unwrap_or_default();
    let store = Arc::new(FileStore::open(
        env::var("DEMO_STORE").unwrap_or_else(|_| String::from("demo-session.json")),
    ));
    let router = Arc::new(MemoryRouter::new(Route::new(Some("chat"), "/chat")));

    if env::var("DEMO_TOKEN").is_err() {
        match redirect_gitlab(&search, store.as_ref(), &PrintNavigator, &OAuthConfig::from_env()) {
            RedirectOutcome::Redirected { .. } => return Ok(()),
            RedirectOutcome::CodePresent => {
                let queries = url_queries(&search);
                if let Err(e) = verify_state(store.as_ref(), queries.get("state").map(String::as_str)) {
                    tracing::warn!(error = %e, "Ignoring OAuth callback.");
                    return Ok(());
                }
            }
        }
    }

    let provider = create_provider(ProviderOverrides::default(), router.clone(), store.clone())?;

    if let Ok(token) = env::var("DEMO_TOKEN") {
        let outcome = on_login(&provider, store.as_ref(), &token).await;
        tracing::info!(?outcome, "Logged in.");
    }

    match provider.client.query(GraphQLRequest::new("{ apiVersion }")).await {
        Ok(data) => println!("{}", data),
        Err(e) => {
            let disposition = provider.error_handler.handle(&e);
            println!("{:?} (now at {})", disposition, router.current_route().full_path);
        }
    }

    Ok(())
}
