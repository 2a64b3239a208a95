//! `Subscription.messageChanged`: topic authorization, the change feed behind it and the
//! resolution of changed rows.

pub mod change_event;
pub mod feed;
pub mod resolver;
pub mod topic;

use std::convert::Infallible;
use std::sync::Arc;

use async_graphql::{Context, ErrorExtensions, Subscription};
use futures_util::stream::{Stream, StreamExt};
use service_core::endpoint_error::EndpointError;
use service_core::simple_err_map;
use tracing_futures::Instrument;

use crate::schema::authorization::Authorization;
use crate::schema::message::MessageChanged;
use feed::ChangeFeed;
use topic::{validate_channel_id, TopicAuthorizer};

#[derive(Default)]
pub struct SubscriptionRoot;

#[Subscription]
impl SubscriptionRoot {
    /// Streams every change made to the messages of a channel.
    async fn message_changed(
        &self,
        ctx: &Context<'_>,
        channel_id: String,
    ) -> async_graphql::Result<impl Stream<Item = MessageChanged>> {
        validate_channel_id(&channel_id).map_err(|e| e.extend())?;

        let authorizer = ctx.data::<Arc<dyn TopicAuthorizer>>()?;
        let claims = ctx.data_opt::<Authorization>().map(|auth| &auth.claims);
        let topic = authorizer
            .make_topic(&channel_id, claims)
            .map_err(|e| EndpointError::operation(e).extend())?;

        let feed = ctx.data::<Arc<dyn ChangeFeed>>()?;
        let changes = feed.subscribe(&topic).await.map_err(simple_err_map!(
            "Subscribing to topic failed.",
            EndpointError::<Infallible>::internal().extend()
        ))?;
        tracing::info!(%topic, "Subscription started.");

        let span = tracing::info_span!("message_changed", %topic);
        Ok(changes.map(MessageChanged::from).instrument(span))
    }
}
