use thiserror::Error;
use typed_builder::TypedBuilder;

use crate::config::ContextKey;
use crate::navigation::Navigator;
use crate::query::url_queries;
use crate::storage::{KeyValueStore, AUTH_TOKEN, OAUTH_STATE};

const DEFAULT_AUTHORIZE_URL: &str = "https://gitlab.com/oauth/authorize";
const DEFAULT_SCOPE: &str = "read_user";
const DEFAULT_REDIRECT_URI: &str = "http://localhost:8080/login";

/// Parameters of the authorization-code request sent to the OAuth provider.
#[derive(Debug, Clone, PartialEq, Eq, TypedBuilder)]
pub struct OAuthConfig {
    #[builder(setter(into))]
    pub authorization_endpoint: String,
    #[builder(default = String::from("code"), setter(into))]
    pub response_type: String,
    #[builder(setter(into))]
    pub client_id: String,
    #[builder(default = String::from(DEFAULT_SCOPE), setter(into))]
    pub scope: String,
    #[builder(setter(into))]
    pub redirect_uri: String,
}

/// What `redirect_gitlab` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedirectOutcome {
    /// No `code` in the query; the browser was sent to the provider.
    Redirected { url: String },
    /// The provider already answered; nothing to do.
    CodePresent,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    #[error("No OAuth state is pending.")]
    Missing,
    #[error("OAuth state does not match the pending request.")]
    Mismatch,
}

impl OAuthConfig {
    pub fn from_env() -> Self {
        OAuthConfig::builder()
            .authorization_endpoint(ContextKey::OauthAuthorizeUrl.get_or(DEFAULT_AUTHORIZE_URL))
            .client_id(ContextKey::OauthClientId.get_or(""))
            .scope(ContextKey::OauthScope.get_or(DEFAULT_SCOPE))
            .redirect_uri(ContextKey::OauthRedirectUri.get_or(DEFAULT_REDIRECT_URI))
            .build()
    }

    /// The provider URL for a request carrying `state`. Parameters are concatenated as given,
    /// without encoding.
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?response_type={}&state={}&client_id={}&scope={}&redirect_uri={}",
            self.authorization_endpoint, self.response_type, state, self.client_id, self.scope, self.redirect_uri
        )
    }
}

pub fn generate_state() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Starts the login flow unless `location_search` already carries the provider's `code`.
///
/// Starting the flow stores a fresh state nonce, drops any session token and navigates away.
pub fn redirect_gitlab(
    location_search: &str,
    store: &dyn KeyValueStore,
    navigator: &dyn Navigator,
    config: &OAuthConfig,
) -> RedirectOutcome {
    if url_queries(location_search).contains_key("code") {
        return RedirectOutcome::CodePresent;
    }

    let state = generate_state();
    store.set(OAUTH_STATE, &state);
    store.remove(AUTH_TOKEN);

    let url = config.authorize_url(&state);
    tracing::info!(endpoint = %config.authorization_endpoint, "Redirecting to OAuth provider.");
    navigator.assign(&url);

    RedirectOutcome::Redirected { url }
}

/// Checks the `state` the provider sent back. The pending nonce is consumed whatever the result.
pub fn verify_state(store: &dyn KeyValueStore, returned: Option<&str>) -> Result<(), StateError> {
    let pending = store.get(OAUTH_STATE).ok_or(StateError::Missing)?;
    store.remove(OAUTH_STATE);

    match returned {
        Some(state) if state == pending => Ok(()),
        _ => Err(StateError::Mismatch),
    }
}
