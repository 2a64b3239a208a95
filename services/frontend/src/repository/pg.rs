use async_trait::async_trait;
use serde_json::Value;
use service_core::pg::insert_row::{InsertRow, InsertRowInput};
use service_core::pg::select_rows::{SelectRows, SelectRowsInput};
use service_core::pg::SqlValue;

use super::{MessageRepository, NewMessage, Projection, RepositoryError, MESSAGES_TABLE};
use crate::schema::message::Message;

pub struct PgMessageRepository<A> {
    adapter: A,
}

impl<A> PgMessageRepository<A> {
    pub fn new(adapter: A) -> Self {
        PgMessageRepository { adapter }
    }
}

fn decode(rows: Vec<Value>) -> Result<Vec<Message>, RepositoryError> {
    rows.into_iter()
        .map(|row| serde_json::from_value(row).map_err(RepositoryError::from))
        .collect()
}

#[async_trait]
impl<A> MessageRepository for PgMessageRepository<A>
where
    A: SelectRows + InsertRow + Send + Sync,
{
    async fn find_message(&self, id: i64, projection: &Projection) -> Result<Option<Message>, RepositoryError> {
        let input = SelectRowsInput::builder()
            .table_name(MESSAGES_TABLE)
            .key_column("id")
            .key(id)
            .projection(projection.select_list())
            .build();
        let rows = self.adapter.select_rows(input).await?;

        Ok(decode(rows)?.into_iter().next())
    }

    async fn list_messages(
        &self,
        channel_id: &str,
        limit: i64,
        projection: &Projection,
    ) -> Result<Vec<Message>, RepositoryError> {
        let input = SelectRowsInput::builder()
            .table_name(MESSAGES_TABLE)
            .key_column("channel_id")
            .key(channel_id)
            .projection(projection.select_list())
            .order_by("id DESC")
            .limit(limit)
            .build();

        decode(self.adapter.select_rows(input).await?)
    }

    async fn create_message(&self, message: NewMessage) -> Result<Message, RepositoryError> {
        let input = InsertRowInput::builder()
            .table_name(MESSAGES_TABLE)
            .values(vec![
                (String::from("channel_id"), SqlValue::from(message.channel_id)),
                (String::from("user_id"), SqlValue::from(message.user_id)),
                (String::from("body"), SqlValue::from(message.body)),
            ])
            .returning(Projection::all().select_list())
            .build();
        let row = self.adapter.insert_row(input).await?;

        Ok(serde_json::from_value(row)?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use serde_json::json;
    use service_core::pg::PgError;

    use super::*;
    use crate::repository::MessageColumn;

    #[derive(Default)]
    struct RecordingAdapter {
        rows: Vec<Value>,
        statements: Mutex<Vec<(Vec<String>, SqlValue)>>,
    }

    #[async_trait]
    impl SelectRows for RecordingAdapter {
        async fn select_rows(&self, input: SelectRowsInput) -> Result<Vec<Value>, PgError> {
            self.statements.lock().unwrap().push((input.projection, input.key));
            Ok(self.rows.clone())
        }
    }

    #[async_trait]
    impl InsertRow for RecordingAdapter {
        async fn insert_row(&self, input: InsertRowInput) -> Result<Value, PgError> {
            let channel = input.values[0].1.clone();
            self.statements.lock().unwrap().push((input.returning, channel));
            Ok(json!({"id": 9, "channel_id": "42", "user_id": 7, "body": "hello", "created_at": "2024-01-01 00:00:00+00"}))
        }
    }

    #[tokio::test]
    async fn find_returns_first_row_only() {
        let adapter = RecordingAdapter {
            rows: vec![json!({"id": 1, "body": "first"}), json!({"id": 2, "body": "second"})],
            ..RecordingAdapter::default()
        };
        let repository = PgMessageRepository::new(adapter);

        let projection = Projection::from_fields(["body"]);
        let message = repository.find_message(1, &projection).await.unwrap().unwrap();
        assert_eq!(message.id, 1);
        assert_eq!(message.body.as_deref(), Some("first"));
        assert_eq!(message.channel_id, None);

        let statements = repository.adapter.statements.lock().unwrap();
        assert_eq!(statements[0], (vec!["id".to_string(), "body".to_string()], SqlValue::Int(1)));
    }

    #[tokio::test]
    async fn find_without_rows_is_none() {
        let repository = PgMessageRepository::new(RecordingAdapter::default());
        let found = repository.find_message(5, &Projection::all()).await.unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn create_returns_every_column() {
        let repository = PgMessageRepository::new(RecordingAdapter::default());
        let created = repository
            .create_message(NewMessage {
                channel_id: "42".to_string(),
                user_id: Some(7),
                body: "hello".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(created.user_id, Some(7));

        let statements = repository.adapter.statements.lock().unwrap();
        assert_eq!(statements[0].0.len(), MessageColumn::ALL.len());
        assert_eq!(statements[0].1, SqlValue::Text("42".to_string()));
    }
}
