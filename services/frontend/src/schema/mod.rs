pub mod authorization;
pub mod message;

use std::convert::Infallible;
use std::sync::Arc;

use async_graphql::extensions::Tracing;
use async_graphql::{Context, ErrorExtensions, Object, Schema};
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::{ErrorCode, OperationError};
use service_core::simple_err_map;
use thiserror::Error;

use crate::repository::{MessageRepository, NewMessage, Projection};
use crate::subscription::feed::ChangeFeed;
use crate::subscription::topic::{validate_channel_id, TopicAuthorizer};
use crate::subscription::SubscriptionRoot;
use authorization::Authorization;
use message::Message;

pub type AppSchema = Schema<QueryRoot, MutationRoot, SubscriptionRoot>;

const MAX_PAGE_SIZE: i32 = 100;

/// Keeps change notifications, which carry the row before and after an update, well under the
/// `NOTIFY` payload limit.
const MAX_BODY_BYTES: usize = 2048;

pub fn build_schema(
    repository: Arc<dyn MessageRepository>,
    feed: Arc<dyn ChangeFeed>,
    authorizer: Arc<dyn TopicAuthorizer>,
) -> AppSchema {
    Schema::build(QueryRoot, MutationRoot, SubscriptionRoot)
        .data(repository)
        .data(feed)
        .data(authorizer)
        .extension(Tracing)
        .finish()
}

#[derive(Default)]
pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn api_version(&self, _ctx: &Context<'_>) -> u32 {
        1
    }

    /// Latest messages of a channel, newest first.
    async fn messages(
        &self,
        ctx: &Context<'_>,
        channel_id: String,
        #[graphql(default = 50)] first: i32,
    ) -> async_graphql::Result<Vec<Message>> {
        if !(1..=MAX_PAGE_SIZE).contains(&first) {
            return Err(EndpointError::<Infallible>::validation(format!(
                "`first` must be between 1 and {}.",
                MAX_PAGE_SIZE
            ))
            .extend());
        }

        let repository = ctx.data::<Arc<dyn MessageRepository>>()?;
        let projection = Projection::from_fields(ctx.field().selection_set().map(|field| field.name()));
        repository
            .list_messages(&channel_id, i64::from(first), &projection)
            .await
            .map_err(simple_err_map!(
                "Listing messages failed.",
                EndpointError::<Infallible>::internal().extend()
            ))
    }

    async fn message(&self, ctx: &Context<'_>, id: i64) -> async_graphql::Result<Option<Message>> {
        let repository = ctx.data::<Arc<dyn MessageRepository>>()?;
        let projection = Projection::from_fields(ctx.field().selection_set().map(|field| field.name()));
        repository.find_message(id, &projection).await.map_err(simple_err_map!(
            "Fetching message failed.",
            EndpointError::<Infallible>::internal().extend()
        ))
    }
}

#[derive(Debug, Error)]
pub enum CreateMessageError {
    // Worded like the database's own privilege error, which clients already treat as a reason to
    // log in again.
    #[error("permission denied for table messages")]
    PermissionDenied,
}

impl OperationError for CreateMessageError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::PermissionDenied => ErrorCode::PermissionDenied,
        }
    }
}

#[derive(Default)]
pub struct MutationRoot;

#[Object]
impl MutationRoot {
    /// Posts a message to a channel as the calling user.
    async fn create_message(
        &self,
        ctx: &Context<'_>,
        channel_id: String,
        body: String,
    ) -> async_graphql::Result<Message> {
        let user_id = ctx
            .data_opt::<Authorization>()
            .and_then(|auth| auth.claims.user_id())
            .ok_or_else(|| EndpointError::operation(CreateMessageError::PermissionDenied).extend())?;
        if body.trim().is_empty() {
            return Err(EndpointError::<CreateMessageError>::validation("Message body must not be empty.").extend());
        }
        if body.len() > MAX_BODY_BYTES {
            return Err(EndpointError::<CreateMessageError>::validation(format!(
                "Message body must be at most {} bytes long.",
                MAX_BODY_BYTES
            ))
            .extend());
        }
        validate_channel_id(&channel_id).map_err(|e| e.extend())?;

        let repository = ctx.data::<Arc<dyn MessageRepository>>()?;
        let message = NewMessage {
            channel_id,
            user_id: user_id.as_i64(),
            body,
        };
        repository.create_message(message).await.map_err(simple_err_map!(
            "Creating message failed.",
            EndpointError::<CreateMessageError>::internal().extend()
        ))
    }
}
