use core::fmt;
use std::env;

/// Environment variables the client reads. All are optional; unset ones fall back to the demo
/// defaults.
pub enum ContextKey {
    GraphqlHttp,
    GraphqlWs,
    OauthAuthorizeUrl,
    OauthClientId,
    OauthScope,
    OauthRedirectUri,
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::GraphqlHttp => write!(f, "GRAPHQL_HTTP"),
            Self::GraphqlWs => write!(f, "GRAPHQL_WS"),
            Self::OauthAuthorizeUrl => write!(f, "OAUTH_AUTHORIZE_URL"),
            Self::OauthClientId => write!(f, "OAUTH_CLIENT_ID"),
            Self::OauthScope => write!(f, "OAUTH_SCOPE"),
            Self::OauthRedirectUri => write!(f, "OAUTH_REDIRECT_URI"),
        }
    }
}

impl ContextKey {
    pub fn get(&self) -> Option<String> {
        env::var(self.to_string()).ok()
    }

    pub fn get_or(&self, default: &str) -> String {
        self.get().unwrap_or_else(|| default.to_owned())
    }
}
