use crate::error::ClientError;
use crate::provider::ClientProvider;
use crate::storage::KeyValueStore;
use crate::transport::GraphQLClient;

/// How the cache reset after a login or logout went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetOutcome {
    Reset,
    /// Reset failed with an authorization error; expected while credentials change.
    Suppressed(ClientError),
    /// Reset failed for another reason and was logged.
    Reported(ClientError),
}

/// Stores `token` under the provider's token key and resets the client so it reconnects and
/// refetches with the new identity.
pub async fn on_login(provider: &ClientProvider, store: &dyn KeyValueStore, token: &str) -> ResetOutcome {
    store.set(&provider.token_name, token);
    reset(provider.client.as_ref(), "login").await
}

pub async fn on_logout(provider: &ClientProvider, store: &dyn KeyValueStore) -> ResetOutcome {
    store.remove(&provider.token_name);
    reset(provider.client.as_ref(), "logout").await
}

async fn reset(client: &dyn GraphQLClient, cause: &str) -> ResetOutcome {
    if let Some(ws) = client.ws_client() {
        ws.restart();
    }

    match client.reset_store().await {
        Ok(()) => ResetOutcome::Reset,
        Err(e) if e.is_unauthorized() => {
            tracing::debug!(error = %e, cause, "Ignoring authorization error on cache reset.");
            ResetOutcome::Suppressed(e)
        }
        Err(e) => {
            tracing::error!(error = %e, cause, "Error on cache reset.");
            ResetOutcome::Reported(e)
        }
    }
}
