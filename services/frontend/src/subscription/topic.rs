use std::convert::Infallible;
use std::sync::Arc;

use service_core::auth::jwt::Claims;
use service_core::endpoint_error::EndpointError;
use service_core::operation_error::{ErrorCode, OperationError};
use thiserror::Error;

use super::feed::CHANNEL_PREFIX;

const TOPIC_PREFIX: &str = "graphql:message:";

/// Postgres refuses `NOTIFY` channel names of 64 bytes or more.
const MAX_CHANNEL_NAME_BYTES: usize = 63;

/// Longest channel id whose notification channel the trigger can still publish on.
pub const MAX_CHANNEL_ID_BYTES: usize = MAX_CHANNEL_NAME_BYTES - CHANNEL_PREFIX.len() - TOPIC_PREFIX.len();

#[derive(Debug, Error)]
pub enum TopicError {
    #[error("You're not logged in")]
    NotLoggedIn,
}

impl OperationError for TopicError {
    fn code(&self) -> ErrorCode {
        match self {
            Self::NotLoggedIn => ErrorCode::Unauthenticated,
        }
    }
}

/// Decides which pub/sub topic a `messageChanged` subscription listens on, and whether the
/// caller may listen at all.
pub trait TopicAuthorizer: Send + Sync {
    fn make_topic(&self, channel_id: &str, claims: Option<&Claims>) -> Result<String, TopicError>;
}

/// Grants the channel topic to any caller whose token carries a user id.
#[derive(Debug, Default)]
pub struct ClaimsTopicAuthorizer;

impl TopicAuthorizer for ClaimsTopicAuthorizer {
    fn make_topic(&self, channel_id: &str, claims: Option<&Claims>) -> Result<String, TopicError> {
        match claims.and_then(Claims::user_id) {
            Some(user_id) => {
                tracing::debug!(%user_id, channel_id, "Topic granted.");
                Ok(message_topic(channel_id))
            }
            None => Err(TopicError::NotLoggedIn),
        }
    }
}

/// Grants every channel topic to everyone, logging what it was given.
#[cfg(feature = "insecure-debug-subscriptions")]
#[derive(Debug, Default)]
pub struct DebugTopicAuthorizer;

#[cfg(feature = "insecure-debug-subscriptions")]
impl TopicAuthorizer for DebugTopicAuthorizer {
    fn make_topic(&self, channel_id: &str, claims: Option<&Claims>) -> Result<String, TopicError> {
        tracing::debug!(channel_id, ?claims, "Granting topic without checking claims.");
        Ok(message_topic(channel_id))
    }
}

pub fn message_topic(channel_id: &str) -> String {
    format!("{}{}", TOPIC_PREFIX, channel_id)
}

/// Rejects channel ids that would make the change trigger fail, and with it the write.
pub fn validate_channel_id(channel_id: &str) -> Result<(), EndpointError<Infallible>> {
    if channel_id.len() > MAX_CHANNEL_ID_BYTES {
        return Err(EndpointError::validation(format!(
            "`channelId` must be at most {} bytes long.",
            MAX_CHANNEL_ID_BYTES
        )));
    }
    Ok(())
}

/// The authorizer this build serves subscriptions with.
pub fn default_authorizer() -> Arc<dyn TopicAuthorizer> {
    #[cfg(feature = "insecure-debug-subscriptions")]
    {
        tracing::warn!("Subscriptions are served WITHOUT authorization checks.");
        Arc::new(DebugTopicAuthorizer)
    }

    #[cfg(not(feature = "insecure-debug-subscriptions"))]
    {
        Arc::new(ClaimsTopicAuthorizer)
    }
}
