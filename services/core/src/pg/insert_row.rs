use async_trait::async_trait;
use serde_json::Value;
use typed_builder::TypedBuilder;

use super::adapter::Adapter;
use super::{param_refs, params, placeholders, PgError, SqlValue};

/// Single-row insert returning the stored row as JSON.
#[derive(Debug, TypedBuilder)]
pub struct InsertRowInput {
    #[builder(setter(into))]
    pub table_name: String,

    pub values: Vec<(String, SqlValue)>,

    #[builder(default)]
    pub returning: Vec<String>,
}

impl InsertRowInput {
    pub(crate) fn statement(&self) -> String {
        let columns: Vec<&str> = self.values.iter().map(|(c, _)| c.as_str()).collect();
        let values = placeholders(self.values.iter().map(|(_, v)| v));
        let returning = if self.returning.is_empty() {
            String::from("*")
        } else {
            self.returning.join(", ")
        };

        format!(
            "WITH __row AS (INSERT INTO {} ({}) VALUES ({}) RETURNING {}) SELECT row_to_json(__row) FROM __row",
            self.table_name,
            columns.join(", "),
            values.join(", "),
            returning
        )
    }
}

#[async_trait]
pub trait InsertRow {
    async fn insert_row(&self, input: InsertRowInput) -> Result<Value, PgError>;
}

#[async_trait]
impl InsertRow for Adapter {
    #[tracing::instrument(skip_all, fields(table = %input.table_name))]
    async fn insert_row(&self, input: InsertRowInput) -> Result<Value, PgError> {
        let statement = input.statement();
        let values: Vec<&SqlValue> = input.values.iter().map(|(_, v)| v).collect();
        let params = params(&values);

        let client = self.pool.get().await?;
        let row = client.query_one(statement.as_str(), &param_refs(&params)).await?;
        Ok(row.try_get(0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_values_are_inlined() {
        let input = InsertRowInput::builder()
            .table_name("apollo_demo.messages")
            .values(vec![
                ("channel_id".to_string(), SqlValue::from("42")),
                ("user_id".to_string(), SqlValue::Null),
                ("body".to_string(), SqlValue::from("hi")),
            ])
            .returning(vec!["id".to_string()])
            .build();

        assert_eq!(
            input.statement(),
            "WITH __row AS (INSERT INTO apollo_demo.messages (channel_id, user_id, body) VALUES ($1::text, NULL, $2::text) RETURNING id) SELECT row_to_json(__row) FROM __row"
        );
    }
}
