//! Postgres data layer.
//!
//! One [`Adapter`] owns the connection pool; each operation is its own trait taking a
//! builder-constructed input.

pub mod adapter;
pub mod insert_row;
pub mod listen;
pub mod select_rows;

use thiserror::Error;

pub use adapter::Adapter;

#[derive(Debug, Error)]
pub enum PgError {
    #[error("Cannot build connection pool: {0}")]
    CreatePool(#[from] deadpool_postgres::CreatePoolError),

    #[error("Cannot acquire connection: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Connection closed by the server.")]
    ConnectionClosed,
}

/// A value bound to a statement parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
    Null,
}

/// Renders placeholders for `values` in order, numbering only the bound ones.
fn placeholders<'a>(values: impl IntoIterator<Item = &'a SqlValue>) -> Vec<String> {
    let mut idx = 0;
    values
        .into_iter()
        .map(|v| {
            if *v != SqlValue::Null {
                idx += 1;
            }
            v.placeholder(idx)
        })
        .collect()
}

/// Borrows boxed parameters the way `tokio_postgres` wants them.
fn param_refs(params: &[BoxedParam]) -> Vec<&(dyn tokio_postgres::types::ToSql + Sync)> {
    params
        .iter()
        .map(|p| &**p as &(dyn tokio_postgres::types::ToSql + Sync))
        .collect()
}

impl SqlValue {
    /// Placeholder for parameter `idx` with an explicit cast, so integer columns of any width
    /// accept the `bigint` parameter.
    fn placeholder(&self, idx: usize) -> String {
        match self {
            Self::Int(_) => format!("${}::bigint", idx),
            Self::Text(_) => format!("${}::text", idx),
            Self::Null => String::from("NULL"),
        }
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Quotes an identifier for use in statements like `LISTEN` that cannot take parameters.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

type BoxedParam = Box<dyn tokio_postgres::types::ToSql + Sync + Send>;

/// Collects the bound parameters of `values`, skipping the ones rendered inline.
fn params(values: &[&SqlValue]) -> Vec<BoxedParam> {
    values
        .iter()
        .filter_map(|v| -> Option<BoxedParam> {
            match v {
                SqlValue::Int(i) => Some(Box::new(*i)),
                SqlValue::Text(s) => Some(Box::new(s.clone())),
                SqlValue::Null => None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("postgraphile:graphql:message:42", "\"postgraphile:graphql:message:42\"")]
    #[case("a\"b", "\"a\"\"b\"")]
    fn quoting(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(quote_ident(raw), expected);
    }

    #[test]
    fn null_is_not_bound() {
        let values = [SqlValue::from(1_i64), SqlValue::Null, SqlValue::from("x")];
        let refs: Vec<&SqlValue> = values.iter().collect();
        assert_eq!(params(&refs).len(), 2);
        assert_eq!(SqlValue::Null.placeholder(2), "NULL");
        assert_eq!(SqlValue::from(Some(3_i64)).placeholder(1), "$1::bigint");
    }
}
