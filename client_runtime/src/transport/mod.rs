use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::Stream;
use serde::Serialize;
use serde_json::Value;

use crate::error::ClientError;

pub mod http;
pub mod ws;

/// Computes the `Authorization` value for the token stored under the given key. An empty string
/// means the header is left out.
pub type GetAuth = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Results of one subscription. Ends when the server completes the operation.
pub type SubscriptionStream = Pin<Box<dyn Stream<Item = Result<Value, ClientError>> + Send>>;

/// How a query uses the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchPolicy {
    /// Answer from the cache when possible.
    CacheFirst,
    /// Always ask the server, then update the cache.
    #[default]
    CacheAndNetwork,
    /// Always ask the server and keep the result out of the cache.
    NoCache,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQLRequest {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_name: Option<String>,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub variables: Value,
    /// Overrides the client's default policy for this request.
    #[serde(skip)]
    pub fetch_policy: Option<FetchPolicy>,
}

impl GraphQLRequest {
    pub fn new(query: impl Into<String>) -> Self {
        GraphQLRequest {
            query: query.into(),
            operation_name: None,
            variables: Value::Null,
            fetch_policy: None,
        }
    }

    pub fn variables(mut self, variables: Value) -> Self {
        self.variables = variables;
        self
    }

    pub fn fetch_policy(mut self, fetch_policy: FetchPolicy) -> Self {
        self.fetch_policy = Some(fetch_policy);
        self
    }

    /// Identity of the request in the query cache.
    pub(crate) fn cache_key(&self) -> String {
        // serde_json writes object keys in a stable order, so equal requests share a key.
        serde_json::to_string(self).unwrap_or_else(|_| self.query.clone())
    }
}

/// The subscription side of the client.
#[cfg_attr(test, mockall::automock)]
pub trait RealtimeTransport: Send + Sync {
    /// Closes the current connection, if any, and reconnects with freshly computed connection
    /// parameters. Active subscriptions are started again on the new connection.
    fn restart(&self);

    fn subscribe(&self, request: GraphQLRequest) -> Result<SubscriptionStream, ClientError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GraphQLClient: Send + Sync {
    async fn query(&self, request: GraphQLRequest) -> Result<Value, ClientError>;

    async fn subscribe(&self, request: GraphQLRequest) -> Result<SubscriptionStream, ClientError>;

    /// Clears cached results and refetches the queries that were cached.
    async fn reset_store(&self) -> Result<(), ClientError>;

    fn ws_client(&self) -> Option<Arc<dyn RealtimeTransport>>;
}
