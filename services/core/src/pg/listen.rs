use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::stream::{self, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_postgres::{AsyncMessage, NoTls};

use super::adapter::Adapter;
use super::{quote_ident, PgError};

/// Payloads of the notifications received on one channel.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Result<String, PgError>> + Send>>;

#[async_trait]
pub trait Listen {
    /// Issues `LISTEN` on a dedicated connection. The connection lives as long as the returned
    /// stream.
    async fn listen(&self, channel: &str) -> Result<NotificationStream, PgError>;
}

#[async_trait]
impl Listen for Adapter {
    #[tracing::instrument(skip(self))]
    async fn listen(&self, channel: &str) -> Result<NotificationStream, PgError> {
        let (client, mut connection) = tokio_postgres::connect(&self.url, NoTls).await?;
        let (tx, rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            let messages = stream::poll_fn(move |cx| connection.poll_message(cx));
            futures_util::pin_mut!(messages);
            loop {
                let forwarded = match messages.next().await {
                    Some(Ok(AsyncMessage::Notification(n))) => tx.send(Ok(n.payload().to_owned())),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        tracing::error!(error = ?e, "LISTEN connection failed.");
                        let _ = tx.send(Err(e.into()));
                        break;
                    }
                    None => {
                        let _ = tx.send(Err(PgError::ConnectionClosed));
                        break;
                    }
                };
                if forwarded.is_err() {
                    break;
                }
            }
            tracing::debug!("LISTEN connection closed.");
        });

        client.batch_execute(&format!("LISTEN {}", quote_ident(channel))).await?;

        Ok(Box::pin(Listening { _client: client, rx }))
    }
}

struct Listening {
    _client: tokio_postgres::Client,
    rx: mpsc::UnboundedReceiver<Result<String, PgError>>,
}

impl Stream for Listening {
    type Item = Result<String, PgError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
