use std::sync::Arc;

use typed_builder::TypedBuilder;

use crate::config::ContextKey;
use crate::error::ClientError;
use crate::navigation::{RouteLocation, Router};
use crate::storage::{KeyValueStore, AUTH_TOKEN};
use crate::transport::http::{HttpClient, InMemoryCache};
use crate::transport::ws::WsClient;
use crate::transport::{FetchPolicy, GetAuth, GraphQLClient};

pub const DEFAULT_HTTP_ENDPOINT: &str = "http://localhost:4000/graphql";
pub const DEFAULT_WS_ENDPOINT: &str = "ws://localhost:4000/graphql";

/// `Authorization` value for the token stored under `token_name`: empty when there is none.
pub fn auth_header(store: &dyn KeyValueStore, token_name: &str) -> String {
    match store.get(token_name) {
        Some(token) if !token.is_empty() => format!("Bearer {}", token),
        _ => String::new(),
    }
}

/// The default `GetAuth`: reads the token from `store` on every call.
pub fn stored_token_auth(store: Arc<dyn KeyValueStore>) -> GetAuth {
    Arc::new(move |name: &str| auth_header(store.as_ref(), name))
}

/// Caller settings taking precedence over the defaults. Unset fields keep the default.
#[derive(TypedBuilder, Default)]
pub struct ProviderOverrides {
    #[builder(default, setter(strip_option, into))]
    pub http_endpoint: Option<String>,
    /// `Some(None)` disables the subscription transport.
    #[builder(default, setter(strip_option))]
    pub ws_endpoint: Option<Option<String>>,
    #[builder(default, setter(strip_option, into))]
    pub token_name: Option<String>,
    #[builder(default, setter(strip_option))]
    pub cache: Option<Arc<InMemoryCache>>,
    #[builder(default, setter(strip_option))]
    pub get_auth: Option<GetAuth>,
    #[builder(default, setter(strip_option))]
    pub fetch_policy: Option<FetchPolicy>,
}

/// What the error handler did with an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorDisposition {
    RedirectedToLogin { wanted_route: String },
    /// Authorization failure while the login page is showing.
    Ignored,
    Logged,
}

pub struct ErrorHandler {
    router: Arc<dyn Router>,
}

impl ErrorHandler {
    pub fn new(router: Arc<dyn Router>) -> Self {
        ErrorHandler { router }
    }

    /// Sends the user to the login page on authorization failures, unless already there. Other
    /// errors are logged.
    pub fn handle(&self, error: &ClientError) -> ErrorDisposition {
        if !error.is_unauthorized() {
            tracing::error!(error = %error, kind = ?error.kind, "GraphQL request failed.");
            return ErrorDisposition::Logged;
        }

        let route = self.router.current_route();
        if route.is_login() {
            return ErrorDisposition::Ignored;
        }

        tracing::info!(wanted_route = %route.full_path, "Not authorized, redirecting to login.");
        self.router.replace(RouteLocation::login(&route.full_path));
        ErrorDisposition::RedirectedToLogin {
            wanted_route: route.full_path,
        }
    }
}

pub struct ClientProvider {
    pub client: Arc<dyn GraphQLClient>,
    pub error_handler: ErrorHandler,
    /// Storage key the client reads its token from.
    pub token_name: String,
}

/// Builds the GraphQL client wired to both transports.
pub fn create_provider(
    overrides: ProviderOverrides,
    router: Arc<dyn Router>,
    store: Arc<dyn KeyValueStore>,
) -> Result<ClientProvider, ClientError> {
    let http_endpoint = overrides
        .http_endpoint
        .unwrap_or_else(|| ContextKey::GraphqlHttp.get_or(DEFAULT_HTTP_ENDPOINT));
    let ws_endpoint = overrides
        .ws_endpoint
        .unwrap_or_else(|| Some(ContextKey::GraphqlWs.get_or(DEFAULT_WS_ENDPOINT)));
    let token_name = overrides.token_name.unwrap_or_else(|| AUTH_TOKEN.to_owned());
    let cache = overrides.cache.unwrap_or_default();
    let get_auth = overrides.get_auth.unwrap_or_else(|| stored_token_auth(store));

    let mut client = HttpClient::new(&http_endpoint, &token_name, get_auth.clone(), cache)?
        .with_fetch_policy(overrides.fetch_policy.unwrap_or_default());
    if let Some(ws_endpoint) = ws_endpoint {
        client = client.with_realtime(Arc::new(WsClient::new(ws_endpoint, &token_name, get_auth)));
    }
    tracing::info!(endpoint = %http_endpoint, "Created GraphQL client.");

    Ok(ClientProvider {
        client: Arc::new(client),
        error_handler: ErrorHandler::new(router),
        token_name,
    })
}
