use deadpool_postgres::{Config, Pool, Runtime};
use tokio_postgres::NoTls;

use super::PgError;

/// Handle on the database: a pool for regular statements, plus the connection URL for the
/// dedicated connections `LISTEN` needs.
#[derive(Clone)]
pub struct Adapter {
    pub(crate) pool: Pool,
    pub(crate) url: String,
}

impl Adapter {
    pub fn connect(url: impl Into<String>) -> Result<Self, PgError> {
        let url = url.into();
        let config = Config {
            url: Some(url.clone()),
            ..Config::default()
        };
        let pool = config.create_pool(Some(Runtime::Tokio1), NoTls)?;

        Ok(Adapter { pool, url })
    }

    /// Runs a multi-statement script, e.g. schema setup.
    pub async fn batch_execute(&self, script: &str) -> Result<(), PgError> {
        let client = self.pool.get().await?;
        client.batch_execute(script).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Adapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Adapter").field("pool", &self.pool.status()).finish()
    }
}
