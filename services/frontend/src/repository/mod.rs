mod pg;

use std::collections::BTreeSet;

use async_trait::async_trait;
use service_core::pg::PgError;
use thiserror::Error;

use crate::schema::message::Message;

pub use pg::PgMessageRepository;

pub const MESSAGES_TABLE: &str = "apollo_demo.messages";

/// Columns of [`MESSAGES_TABLE`] that the GraphQL `Message` type exposes.
#[derive(Clone, Copy, Debug, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub enum MessageColumn {
    Id,
    ChannelId,
    UserId,
    Body,
    CreatedAt,
}

/// The columns to fetch for a message. The primary key is always part of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Projection(BTreeSet<MessageColumn>);

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub channel_id: String,
    pub user_id: Option<i64>,
    pub body: String,
}

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error(transparent)]
    Datastore(#[from] PgError),

    #[error("Decoding row failed: {0}")]
    Decode(#[from] serde_json::Error),
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Looks a message up by primary key, fetching only the projected columns.
    async fn find_message(&self, id: i64, projection: &Projection) -> Result<Option<Message>, RepositoryError>;

    /// Most recent messages of a channel, newest first.
    async fn list_messages(
        &self,
        channel_id: &str,
        limit: i64,
        projection: &Projection,
    ) -> Result<Vec<Message>, RepositoryError>;

    async fn create_message(&self, message: NewMessage) -> Result<Message, RepositoryError>;
}

impl MessageColumn {
    pub const ALL: [MessageColumn; 5] = [
        MessageColumn::Id,
        MessageColumn::ChannelId,
        MessageColumn::UserId,
        MessageColumn::Body,
        MessageColumn::CreatedAt,
    ];

    /// Maps a GraphQL field name of `Message` to its column.
    pub fn from_field(name: &str) -> Option<Self> {
        match name {
            "id" => Some(Self::Id),
            "channelId" => Some(Self::ChannelId),
            "userId" => Some(Self::UserId),
            "body" => Some(Self::Body),
            "createdAt" => Some(Self::CreatedAt),
            _ => None,
        }
    }

    /// Select-list expression, aliased to the name the row decoder expects.
    pub fn select_expression(&self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::ChannelId => "channel_id",
            Self::UserId => "user_id",
            Self::Body => "body",
            Self::CreatedAt => "created_at::text AS created_at",
        }
    }
}

impl Projection {
    pub fn all() -> Self {
        Projection(MessageColumn::ALL.into_iter().collect())
    }

    /// Builds the projection matching the requested GraphQL fields. Unknown names such as
    /// `__typename` are ignored.
    pub fn from_fields<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let mut columns: BTreeSet<MessageColumn> = names.into_iter().filter_map(MessageColumn::from_field).collect();
        columns.insert(MessageColumn::Id);
        Projection(columns)
    }

    pub fn contains(&self, column: MessageColumn) -> bool {
        self.0.contains(&column)
    }

    pub fn select_list(&self) -> Vec<String> {
        self.0.iter().map(|c| c.select_expression().to_owned()).collect()
    }
}
