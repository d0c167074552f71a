//! Postgres-backed repository implementations.

mod feed_entries;
mod friendships;
mod jobs;
mod util;

pub use friendships::PostgresEdgeStore;
pub use util::map_sqlx_error;

use std::num::NonZeroU32;
use std::sync::Arc;

use apalis_sql::postgres::PostgresStorage;
use sqlx::{
    Postgres, Transaction,
    postgres::{PgPool, PgPoolOptions},
};
use tracing::info;

use super::error::InfraError;

/// One connection pool serving every repository trait.
#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub async fn connect(url: &str, max_connections: NonZeroU32) -> Result<Self, InfraError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections.get())
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn begin(&self) -> Result<Transaction<'_, Postgres>, sqlx::Error> {
        self.pool.begin().await
    }

    /// Create the job queue schema, then apply the feed schema.
    ///
    /// Both share the `_sqlx_migrations` ledger, so each side ignores the
    /// versions it does not own.
    pub async fn migrate(&self) -> Result<(), InfraError> {
        PostgresStorage::<()>::setup(self.pool()).await?;

        let mut migrator = sqlx::migrate!("./migrations");
        migrator.set_ignore_missing(true);
        migrator.run(self.pool()).await?;

        info!(target = "infra::db::migrate", "Database schema is up to date");
        Ok(())
    }
}
