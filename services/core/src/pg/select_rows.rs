use async_trait::async_trait;
use serde_json::Value;
use typed_builder::TypedBuilder;

use super::adapter::Adapter;
use super::{param_refs, params, placeholders, PgError, SqlValue};

/// Filtered single-table selection.
///
/// `projection` lists the select-list expressions, already aliased to the names the rows should
/// carry. Rows come back as JSON objects keyed by those aliases, so callers decide how to decode
/// them. Identifiers are interpolated as given and must come from trusted code, never from
/// request input.
#[derive(Debug, TypedBuilder)]
pub struct SelectRowsInput {
    #[builder(setter(into))]
    pub table_name: String,

    #[builder(setter(into))]
    pub key_column: String,

    #[builder(setter(into))]
    pub key: SqlValue,

    #[builder(default)]
    pub projection: Vec<String>,

    #[builder(default, setter(strip_option, into))]
    pub order_by: Option<String>,

    #[builder(default, setter(strip_option))]
    pub limit: Option<i64>,
}

impl SelectRowsInput {
    pub(crate) fn statement(&self) -> String {
        let columns = if self.projection.is_empty() {
            String::from("*")
        } else {
            self.projection.join(", ")
        };
        let placeholder = placeholders([&self.key]).remove(0);
        let filter = match self.key {
            SqlValue::Null => format!("{} IS NULL", self.key_column),
            _ => format!("{} = {}", self.key_column, placeholder),
        };

        let mut statement = format!(
            "SELECT row_to_json(__row) FROM (SELECT {} FROM {} WHERE {}",
            columns, self.table_name, filter
        );
        if let Some(order_by) = &self.order_by {
            statement.push_str(" ORDER BY ");
            statement.push_str(order_by);
        }
        if let Some(limit) = self.limit {
            statement.push_str(&format!(" LIMIT {}", limit));
        }
        statement.push_str(") __row");
        statement
    }
}

#[async_trait]
pub trait SelectRows {
    async fn select_rows(&self, input: SelectRowsInput) -> Result<Vec<Value>, PgError>;
}

#[async_trait]
impl SelectRows for Adapter {
    #[tracing::instrument(skip_all, fields(table = %input.table_name))]
    async fn select_rows(&self, input: SelectRowsInput) -> Result<Vec<Value>, PgError> {
        let statement = input.statement();
        let params = params(&[&input.key]);

        let client = self.pool.get().await?;
        let rows = client.query(statement.as_str(), &param_refs(&params)).await?;
        tracing::debug!(rows = rows.len(), "Selected rows.");

        rows.iter().map(|row| row.try_get(0).map_err(PgError::from)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projected_lookup_by_id() {
        let input = SelectRowsInput::builder()
            .table_name("apollo_demo.messages")
            .key_column("id")
            .key(42_i64)
            .projection(vec!["id".to_string(), "body".to_string()])
            .build();

        assert_eq!(
            input.statement(),
            "SELECT row_to_json(__row) FROM (SELECT id, body FROM apollo_demo.messages WHERE id = $1::bigint) __row"
        );
    }

    #[test]
    fn ordered_and_limited_text_key() {
        let input = SelectRowsInput::builder()
            .table_name("apollo_demo.messages")
            .key_column("channel_id")
            .key("general")
            .order_by("id DESC")
            .limit(20)
            .build();

        assert_eq!(
            input.statement(),
            "SELECT row_to_json(__row) FROM (SELECT * FROM apollo_demo.messages WHERE channel_id = $1::text ORDER BY id DESC LIMIT 20) __row"
        );
    }

    #[test]
    fn null_key_uses_is_null() {
        let input = SelectRowsInput::builder()
            .table_name("t")
            .key_column("user_id")
            .key(SqlValue::Null)
            .build();

        assert!(input.statement().contains("WHERE user_id IS NULL"));
    }
}
