use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::Value;

use super::{FetchPolicy, GetAuth, GraphQLClient, GraphQLRequest, RealtimeTransport, SubscriptionStream};
use crate::error::{ClientError, ErrorKind};

/// Results of successful queries, keyed by request.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: Mutex<HashMap<String, (GraphQLRequest, Value)>>,
}

impl InMemoryCache {
    pub fn get(&self, request: &GraphQLRequest) -> Option<Value> {
        self.lock().get(&request.cache_key()).map(|(_, data)| data.clone())
    }

    fn put(&self, request: GraphQLRequest, data: Value) {
        self.lock().insert(request.cache_key(), (request, data));
    }

    /// Empties the cache, returning the requests it held.
    fn drain(&self) -> Vec<GraphQLRequest> {
        self.lock().drain().map(|(_, (request, _))| request).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, (GraphQLRequest, Value)>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Deserialize)]
struct GraphQLResponse {
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQLResponseError>,
}

#[derive(Debug, Deserialize)]
struct GraphQLResponseError {
    message: String,
}

/// GraphQL client sending queries over HTTP, optionally paired with a subscription transport.
pub struct HttpClient {
    endpoint: String,
    fetch_policy: FetchPolicy,
    token_name: String,
    get_auth: GetAuth,
    http: reqwest::Client,
    cache: Arc<InMemoryCache>,
    realtime: Option<Arc<dyn RealtimeTransport>>,
}

impl HttpClient {
    pub fn new(
        endpoint: impl Into<String>,
        token_name: impl Into<String>,
        get_auth: GetAuth,
        cache: Arc<InMemoryCache>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::network(format!("Network error: {}", e)))?;

        Ok(HttpClient {
            endpoint: endpoint.into(),
            fetch_policy: FetchPolicy::default(),
            token_name: token_name.into(),
            get_auth,
            http,
            cache,
            realtime: None,
        })
    }

    pub fn with_realtime(mut self, realtime: Arc<dyn RealtimeTransport>) -> Self {
        self.realtime = Some(realtime);
        self
    }

    /// Policy of requests that do not set their own.
    pub fn with_fetch_policy(mut self, fetch_policy: FetchPolicy) -> Self {
        self.fetch_policy = fetch_policy;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn cache(&self) -> &Arc<InMemoryCache> {
        &self.cache
    }

    #[tracing::instrument(skip(self, request), fields(endpoint = %self.endpoint))]
    async fn fetch(&self, request: &GraphQLRequest) -> Result<Value, ClientError> {
        let mut builder = self.http.post(&self.endpoint).json(request);
        let auth = (self.get_auth)(&self.token_name);
        if !auth.is_empty() {
            builder = builder.header(AUTHORIZATION, auth);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ClientError::network(format!("Network error: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let err = ClientError::status(status.as_u16());
            return Err(ClientError::new(err.kind, format!("Network error: {}", err.message)));
        }

        let body: GraphQLResponse = response
            .json()
            .await
            .map_err(|e| ClientError::network(format!("Network error: {}", e)))?;

        if let Some(error) = body.errors.into_iter().next() {
            return Err(ClientError::from_message(format!("GraphQL error: {}", error.message)));
        }

        Ok(body.data.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl GraphQLClient for HttpClient {
    async fn query(&self, request: GraphQLRequest) -> Result<Value, ClientError> {
        let policy = request.fetch_policy.unwrap_or(self.fetch_policy);
        if policy == FetchPolicy::CacheFirst {
            if let Some(data) = self.cache.get(&request) {
                return Ok(data);
            }
        }

        let data = self.fetch(&request).await?;
        if policy != FetchPolicy::NoCache {
            self.cache.put(request, data.clone());
        }
        Ok(data)
    }

    async fn subscribe(&self, request: GraphQLRequest) -> Result<SubscriptionStream, ClientError> {
        match &self.realtime {
            Some(realtime) => realtime.subscribe(request),
            None => Err(ClientError::new(
                ErrorKind::Other,
                "No subscription transport is configured.",
            )),
        }
    }

    async fn reset_store(&self) -> Result<(), ClientError> {
        let requests = self.cache.drain();
        tracing::debug!(refetching = requests.len(), "Resetting query cache.");

        let mut first_error = None;
        for request in requests {
            match self.fetch(&request).await {
                Ok(data) => self.cache.put(request, data),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn ws_client(&self) -> Option<Arc<dyn RealtimeTransport>> {
        self.realtime.clone()
    }
}
