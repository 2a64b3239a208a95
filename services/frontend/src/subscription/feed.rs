use std::pin::Pin;

use async_trait::async_trait;
use futures_util::future;
use futures_util::stream::{Stream, StreamExt};
use service_core::operation_error::{ErrorCode, OperationError};
use service_core::pg::listen::Listen;
use service_core::pg::PgError;
use thiserror::Error;

use super::change_event::ChangeEvent;

/// Prefix of the notification channels the database trigger publishes on.
pub(crate) const CHANNEL_PREFIX: &str = "postgraphile:";

pub type ChangeStream = Pin<Box<dyn Stream<Item = ChangeEvent> + Send>>;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("Cannot listen for changes: {0}")]
    Listen(#[from] PgError),
}

impl OperationError for FeedError {
    fn code(&self) -> ErrorCode {
        ErrorCode::Internal
    }
}

/// Source of change events for a topic.
#[async_trait]
pub trait ChangeFeed: Send + Sync {
    async fn subscribe(&self, topic: &str) -> Result<ChangeStream, FeedError>;
}

/// Change feed backed by Postgres `LISTEN`/`NOTIFY`, one connection per subscription.
pub struct PgChangeFeed<L> {
    listener: L,
}

impl<L> PgChangeFeed<L> {
    pub fn new(listener: L) -> Self {
        PgChangeFeed { listener }
    }
}

#[async_trait]
impl<L> ChangeFeed for PgChangeFeed<L>
where
    L: Listen + Send + Sync,
{
    async fn subscribe(&self, topic: &str) -> Result<ChangeStream, FeedError> {
        let channel = format!("{}{}", CHANNEL_PREFIX, topic);
        let notifications = self.listener.listen(&channel).await?;

        let events = notifications
            .take_while(|payload| future::ready(payload.is_ok()))
            .filter_map(|payload| {
                let event = payload.ok().and_then(|raw| match serde_json::from_str::<ChangeEvent>(&raw) {
                    Ok(event) => Some(event),
                    Err(e) => {
                        tracing::warn!(error = ?e, payload = %raw, "Dropping undecodable change notification.");
                        None
                    }
                });
                future::ready(event)
            });

        Ok(Box::pin(events))
    }
}
