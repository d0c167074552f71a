//! Failures raised while wiring a process to its backing services.

use thiserror::Error;

use crate::cache::CacheError;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("shared store error: {0}")]
    Store(#[from] CacheError),
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("`{key}` is not configured")]
    Missing { key: &'static str },
}

impl InfraError {
    pub fn missing(key: &'static str) -> Self {
        Self::Missing { key }
    }

    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }
}
