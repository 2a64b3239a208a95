use std::convert::Infallible;
use std::sync::Arc;

use async_graphql::{Context, ErrorExtensions, Object, SimpleObject};
use serde::Deserialize;
use service_core::endpoint_error::EndpointError;
use service_core::simple_err_map;

use crate::repository::{MessageRepository, Projection};
use crate::subscription::change_event::ChangeEvent;
use crate::subscription::resolver::resolve_message;

/// A row of `apollo_demo.messages`, holding only the columns that were selected.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Message {
    pub id: i64,
    pub channel_id: Option<String>,
    pub user_id: Option<i64>,
    pub body: Option<String>,
    pub created_at: Option<String>,
}

/// A message row as carried by a change notification, where every column may be missing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, SimpleObject)]
pub struct MessageNullable {
    pub id: Option<i64>,
    pub channel_id: Option<String>,
    pub user_id: Option<i64>,
    pub body: Option<String>,
    pub created_at: Option<String>,
}

/// Payload of `Subscription.messageChanged`.
pub struct MessageChanged {
    event: ChangeEvent,
}

fn not_selected(column: &str) -> async_graphql::Error {
    tracing::error!(column, "Column was resolved without being selected.");
    async_graphql::Error::new("Internal server error.")
}

#[Object]
impl Message {
    async fn id(&self) -> i64 {
        self.id
    }

    async fn channel_id(&self) -> async_graphql::Result<&str> {
        self.channel_id.as_deref().ok_or_else(|| not_selected("channel_id"))
    }

    async fn user_id(&self) -> Option<i64> {
        self.user_id
    }

    async fn body(&self) -> async_graphql::Result<&str> {
        self.body.as_deref().ok_or_else(|| not_selected("body"))
    }

    async fn created_at(&self) -> async_graphql::Result<&str> {
        self.created_at.as_deref().ok_or_else(|| not_selected("created_at"))
    }
}

#[Object]
impl MessageChanged {
    /// `INSERT`, `UPDATE` or `DELETE`, as reported by the database.
    #[graphql(name = "type")]
    async fn kind(&self) -> &'static str {
        self.event.kind.as_str()
    }

    /// The current state of the changed row, fetched with the fields requested here. Null when
    /// the row was deleted, including when it disappeared before it could be read.
    async fn message(&self, ctx: &Context<'_>) -> async_graphql::Result<Option<Message>> {
        let repository = ctx.data::<Arc<dyn MessageRepository>>()?;
        let projection = Projection::from_fields(ctx.field().selection_set().map(|field| field.name()));

        resolve_message(&self.event, repository.as_ref(), &projection)
            .await
            .map_err(simple_err_map!(
                "Resolving changed message failed.",
                EndpointError::<Infallible>::internal().extend()
            ))
    }

    /// The row before the change, straight from the notification.
    async fn oldrec(&self) -> Option<&MessageNullable> {
        self.event.oldrec.as_ref()
    }
}

impl From<ChangeEvent> for MessageChanged {
    fn from(event: ChangeEvent) -> Self {
        MessageChanged { event }
    }
}
