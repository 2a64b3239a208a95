use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};

use super::{GetAuth, GraphQLRequest, RealtimeTransport, SubscriptionStream};
use crate::error::{ClientError, ErrorKind};

/// Subprotocol of the server's subscription endpoint (`subscriptions-transport-ws`).
pub const SUBPROTOCOL: &str = "graphql-ws";

type Events = mpsc::UnboundedSender<Result<Value, ClientError>>;

enum Command {
    Start(String),
    Stop(String),
    Close,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage<'a> {
    ConnectionInit { payload: &'a Value },
    Start { id: &'a str, payload: &'a Value },
    Stop { id: &'a str },
    ConnectionTerminate,
}

#[derive(Deserialize)]
struct ServerMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    payload: Value,
}

struct ActiveSubscription {
    payload: Value,
    events: Events,
}

struct Shared {
    endpoint: String,
    token_name: String,
    get_auth: GetAuth,
    connection_params: Mutex<Value>,
    generation: AtomicU64,
    next_id: AtomicU64,
    subscriptions: Mutex<HashMap<String, ActiveSubscription>>,
    connection: Mutex<Option<mpsc::UnboundedSender<Command>>>,
}

/// Subscription transport. The socket is opened by the first subscription or restart; its
/// `connection_init` payload carries the `Authorization` value computed at connect time.
pub struct WsClient {
    shared: Arc<Shared>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn network(e: impl Display) -> ClientError {
    ClientError::network(format!("Network error: {}", e))
}

fn connection_closed() -> ClientError {
    ClientError::network("Network error: subscription connection closed")
}

fn handshake_error(e: tungstenite::Error) -> ClientError {
    match e {
        tungstenite::Error::Http(response) => {
            let err = ClientError::status(response.status().as_u16());
            ClientError::new(err.kind, format!("Network error: {}", err.message))
        }
        e => network(e),
    }
}

/// Message of a GraphQL error payload, which is either one error or a list of them.
fn error_message(payload: &Value) -> String {
    let first = if payload.is_array() { &payload[0] } else { payload };
    first["message"]
        .as_str()
        .map(str::to_owned)
        .unwrap_or_else(|| payload.to_string())
}

impl WsClient {
    pub fn new(endpoint: impl Into<String>, token_name: impl Into<String>, get_auth: GetAuth) -> Self {
        WsClient {
            shared: Arc::new(Shared {
                endpoint: endpoint.into(),
                token_name: token_name.into(),
                get_auth,
                connection_params: Mutex::new(Value::Null),
                generation: AtomicU64::new(0),
                next_id: AtomicU64::new(1),
                subscriptions: Mutex::new(HashMap::new()),
                connection: Mutex::new(None),
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.shared.endpoint
    }

    /// Payload of the latest `connection_init` message.
    pub fn connection_params(&self) -> Value {
        lock(&self.shared.connection_params).clone()
    }

    /// How many connections have been opened.
    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::SeqCst)
    }

    /// Opens a new connection, telling the current one to close.
    fn connect(&self) -> Result<(), ClientError> {
        let runtime = tokio::runtime::Handle::try_current().map_err(network)?;

        let params = json!({ "Authorization": (self.shared.get_auth)(&self.shared.token_name) });
        *lock(&self.shared.connection_params) = params.clone();
        let generation = self.shared.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let (commands, rx) = mpsc::unbounded_channel();
        if let Some(previous) = lock(&self.shared.connection).replace(commands) {
            let _ = previous.send(Command::Close);
        }
        runtime.spawn(run_connection(self.shared.clone(), generation, params, rx));

        Ok(())
    }
}

impl RealtimeTransport for WsClient {
    fn restart(&self) {
        match self.connect() {
            Ok(()) => tracing::debug!(endpoint = %self.shared.endpoint, generation = self.generation(), "Restarted subscription transport."),
            Err(e) => tracing::warn!(error = %e, endpoint = %self.shared.endpoint, "Cannot restart subscription transport."),
        }
    }

    fn subscribe(&self, request: GraphQLRequest) -> Result<SubscriptionStream, ClientError> {
        let payload = serde_json::to_value(&request).map_err(|e| ClientError::new(ErrorKind::Other, e.to_string()))?;
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let (events, rx) = mpsc::unbounded_channel();
        lock(&self.shared.subscriptions).insert(id.clone(), ActiveSubscription { payload, events });

        let started = match lock(&self.shared.connection).as_ref() {
            Some(connection) => connection.send(Command::Start(id.clone())).is_ok(),
            None => false,
        };
        if !started {
            if let Err(e) = self.connect() {
                lock(&self.shared.subscriptions).remove(&id);
                return Err(e);
            }
        }

        Ok(Box::pin(Subscription {
            id,
            shared: self.shared.clone(),
            rx,
        }))
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        if let Some(connection) = lock(&self.shared.connection).take() {
            let _ = connection.send(Command::Close);
        }
    }
}

/// Events of one subscription; dropping it stops the operation on the server.
struct Subscription {
    id: String,
    shared: Arc<Shared>,
    rx: mpsc::UnboundedReceiver<Result<Value, ClientError>>,
}

impl Stream for Subscription {
    type Item = Result<Value, ClientError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if lock(&self.shared.subscriptions).remove(&self.id).is_none() {
            return;
        }
        if let Some(connection) = lock(&self.shared.connection).as_ref() {
            let _ = connection.send(Command::Stop(self.id.clone()));
        }
    }
}

async fn run_connection(
    shared: Arc<Shared>,
    generation: u64,
    params: Value,
    mut commands: mpsc::UnboundedReceiver<Command>,
) {
    let result = serve_connection(&shared, &params, &mut commands).await;
    let current = shared.generation.load(Ordering::SeqCst) == generation;

    match result {
        Ok(()) => tracing::debug!(endpoint = %shared.endpoint, generation, "Subscription connection closed."),
        Err(e) => {
            tracing::warn!(error = %e, endpoint = %shared.endpoint, generation, "Subscription connection failed.");
            if current {
                for subscription in lock(&shared.subscriptions).values() {
                    let _ = subscription.events.send(Err(e.clone()));
                }
            }
        }
    }

    let mut connection = lock(&shared.connection);
    if shared.generation.load(Ordering::SeqCst) == generation {
        *connection = None;
    }
}

async fn send<S>(ws: &mut S, message: &ClientMessage<'_>) -> Result<(), ClientError>
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    let text = serde_json::to_string(message).map_err(|e| ClientError::new(ErrorKind::Other, e.to_string()))?;
    ws.send(Message::Text(text.into())).await.map_err(network)
}

/// Drives one socket until it is told to close or the server goes away. Operations are started
/// once the server acknowledged the connection.
async fn serve_connection(
    shared: &Shared,
    params: &Value,
    commands: &mut mpsc::UnboundedReceiver<Command>,
) -> Result<(), ClientError> {
    let mut request = shared.endpoint.as_str().into_client_request().map_err(network)?;
    request
        .headers_mut()
        .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));
    let (mut ws, _) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(handshake_error)?;

    send(&mut ws, &ClientMessage::ConnectionInit { payload: params }).await?;

    let mut acknowledged = false;
    let mut started = HashSet::new();

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Start(id)) => {
                    let payload = lock(&shared.subscriptions).get(&id).map(|s| s.payload.clone());
                    if let (true, false, Some(payload)) = (acknowledged, started.contains(&id), payload) {
                        send(&mut ws, &ClientMessage::Start { id: &id, payload: &payload }).await?;
                        started.insert(id);
                    }
                }
                Some(Command::Stop(id)) => {
                    if started.remove(&id) {
                        send(&mut ws, &ClientMessage::Stop { id: &id }).await?;
                    }
                }
                Some(Command::Close) | None => {
                    let _ = send(&mut ws, &ClientMessage::ConnectionTerminate).await;
                    let _ = ws.close(None).await;
                    return Ok(());
                }
            },
            message = ws.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let message: ServerMessage = match serde_json::from_str(&text) {
                        Ok(message) => message,
                        Err(e) => {
                            tracing::warn!(error = %e, "Dropping undecodable subscription message.");
                            continue;
                        }
                    };

                    if message.kind == "connection_ack" {
                        acknowledged = true;
                        let pending: Vec<(String, Value)> = lock(&shared.subscriptions)
                            .iter()
                            .filter(|(id, _)| !started.contains(*id))
                            .map(|(id, s)| (id.clone(), s.payload.clone()))
                            .collect();
                        for (id, payload) in pending {
                            send(&mut ws, &ClientMessage::Start { id: &id, payload: &payload }).await?;
                            started.insert(id);
                        }
                    } else if message.kind == "connection_error" {
                        return Err(ClientError::from_message(format!(
                            "GraphQL error: {}",
                            error_message(&message.payload)
                        )));
                    } else {
                        dispatch(shared, message, &mut started);
                    }
                }
                Some(Ok(Message::Close(_))) | None => return Err(connection_closed()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(network(e)),
            },
        }
    }
}

/// Routes an operation message to its subscriber.
fn dispatch(shared: &Shared, message: ServerMessage, started: &mut HashSet<String>) {
    let Some(id) = message.id else {
        return;
    };
    let mut subscriptions = lock(&shared.subscriptions);

    match message.kind.as_str() {
        "data" => {
            let event = match message.payload["errors"].as_array().and_then(|errors| errors.first()) {
                Some(error) => Err(ClientError::from_message(format!("GraphQL error: {}", error_message(error)))),
                None => Ok(message.payload["data"].clone()),
            };
            if let Some(subscription) = subscriptions.get(&id) {
                let _ = subscription.events.send(event);
            }
        }
        "error" => {
            started.remove(&id);
            if let Some(subscription) = subscriptions.remove(&id) {
                let error = ClientError::from_message(format!("GraphQL error: {}", error_message(&message.payload)));
                let _ = subscription.events.send(Err(error));
            }
        }
        "complete" => {
            started.remove(&id);
            subscriptions.remove(&id);
        }
        other => tracing::debug!(kind = other, %id, "Ignoring subscription message."),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::{TcpListener, TcpStream};
    use tokio::time::timeout;
    use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
    use tokio_tungstenite::WebSocketStream;

    use super::*;
    use crate::provider::stored_token_auth;
    use crate::storage::{KeyValueStore, MemoryStore, AUTH_TOKEN};

    const SUBSCRIPTION: &str = r#"subscription { messageChanged(channelId: "42") { type } }"#;

    fn graphql_ws(request: &Request, mut response: Response) -> Result<Response, ErrorResponse> {
        let protocol = request
            .headers()
            .get(SEC_WEBSOCKET_PROTOCOL)
            .and_then(|value| value.to_str().ok());
        assert_eq!(protocol, Some(SUBPROTOCOL));
        response
            .headers_mut()
            .insert(SEC_WEBSOCKET_PROTOCOL, HeaderValue::from_static(SUBPROTOCOL));
        Ok(response)
    }

    async fn listen() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("ws://{}/graphql", listener.local_addr().unwrap());
        (listener, endpoint)
    }

    async fn accept(listener: &TcpListener) -> WebSocketStream<TcpStream> {
        let (stream, _) = timeout(Duration::from_millis(500), listener.accept())
            .await
            .expect("client should connect")
            .unwrap();
        tokio_tungstenite::accept_hdr_async(stream, graphql_ws).await.unwrap()
    }

    async fn next_json(ws: &mut WebSocketStream<TcpStream>) -> Value {
        loop {
            match timeout(Duration::from_millis(500), ws.next()).await.expect("client should write") {
                Some(Ok(Message::Text(text))) => return serde_json::from_str(&text).unwrap(),
                Some(Ok(_)) => {}
                other => panic!("socket ended: {:?}", other),
            }
        }
    }

    async fn reply(ws: &mut WebSocketStream<TcpStream>, message: Value) {
        ws.send(Message::Text(message.to_string().into())).await.unwrap();
    }

    #[tokio::test]
    async fn restart_reconnects_with_current_token() {
        let (listener, endpoint) = listen().await;
        let store = Arc::new(MemoryStore::default());
        let ws = WsClient::new(endpoint, AUTH_TOKEN, stored_token_auth(store.clone()));
        assert_eq!(ws.generation(), 0);

        store.set(AUTH_TOKEN, "abc");
        ws.restart();
        let mut first = accept(&listener).await;
        assert_eq!(
            next_json(&mut first).await,
            json!({ "type": "connection_init", "payload": { "Authorization": "Bearer abc" } })
        );

        store.remove(AUTH_TOKEN);
        ws.restart();

        assert_eq!(next_json(&mut first).await, json!({ "type": "connection_terminate" }));
        let mut second = accept(&listener).await;
        assert_eq!(next_json(&mut second).await["payload"], json!({ "Authorization": "" }));
        assert_eq!(ws.connection_params(), json!({ "Authorization": "" }));
        assert_eq!(ws.generation(), 2);
    }

    #[tokio::test]
    async fn subscription_streams_data_until_complete() {
        let (listener, endpoint) = listen().await;
        let ws = WsClient::new(endpoint, AUTH_TOKEN, Arc::new(|_: &str| String::new()));

        let mut events = ws.subscribe(GraphQLRequest::new(SUBSCRIPTION)).unwrap();
        let mut server = accept(&listener).await;
        assert_eq!(next_json(&mut server).await["type"], "connection_init");
        reply(&mut server, json!({ "type": "connection_ack" })).await;

        let start = next_json(&mut server).await;
        assert_eq!(start["type"], "start");
        assert_eq!(start["payload"]["query"], SUBSCRIPTION);
        let id = start["id"].clone();

        reply(
            &mut server,
            json!({ "type": "data", "id": id, "payload": { "data": { "messageChanged": { "type": "INSERT" } } } }),
        )
        .await;
        reply(&mut server, json!({ "type": "complete", "id": id })).await;

        assert_eq!(events.next().await, Some(Ok(json!({ "messageChanged": { "type": "INSERT" } }))));
        assert_eq!(events.next().await, None);
    }

    #[tokio::test]
    async fn dropping_subscription_stops_operation() {
        let (listener, endpoint) = listen().await;
        let ws = WsClient::new(endpoint, AUTH_TOKEN, Arc::new(|_: &str| String::new()));

        let events = ws.subscribe(GraphQLRequest::new(SUBSCRIPTION)).unwrap();
        let mut server = accept(&listener).await;
        next_json(&mut server).await;
        reply(&mut server, json!({ "type": "connection_ack" })).await;
        let id = next_json(&mut server).await["id"].clone();

        drop(events);

        assert_eq!(next_json(&mut server).await, json!({ "type": "stop", "id": id }));
    }

    #[tokio::test]
    async fn rejected_connection_is_unauthorized() {
        let (listener, endpoint) = listen().await;
        let ws = WsClient::new(endpoint, AUTH_TOKEN, Arc::new(|_: &str| String::from("Bearer expired")));

        let mut events = ws.subscribe(GraphQLRequest::new(SUBSCRIPTION)).unwrap();
        let mut server = accept(&listener).await;
        next_json(&mut server).await;
        reply(
            &mut server,
            json!({ "type": "connection_error", "payload": { "message": "Unauthorized: invalid token." } }),
        )
        .await;

        let error = events.next().await.unwrap().unwrap_err();
        assert!(error.is_unauthorized());
        assert_eq!(error.message, "GraphQL error: Unauthorized: invalid token.");
    }
}
