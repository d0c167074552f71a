//! Shared key-value store interface.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
    #[error("cache key `{key}` holds a value of the wrong type")]
    WrongType { key: String },
    #[error("corrupt cache value at `{key}`: {reason}")]
    Corrupt { key: String, reason: String },
}

impl CacheError {
    pub fn unavailable(err: impl std::fmt::Display) -> Self {
        Self::Unavailable(err.to_string())
    }

    pub fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

/// Operations the feed core needs from the shared store.
///
/// List indices follow Redis semantics: `0` is the head, negative indices count
/// from the tail, ranges are inclusive. A list with no elements does not exist.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError>;

    async fn exists(&self, key: &str) -> Result<bool, CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CacheError>;

    /// Atomically replace the list at `key` with `values`, head first.
    async fn list_replace(&self, key: &str, values: &[String]) -> Result<(), CacheError>;

    /// Atomically prepend `value` only when the list already exists, then trim
    /// it to `max_len`. Returns whether the value was pushed.
    async fn list_push_existing_trim(
        &self,
        key: &str,
        value: &str,
        max_len: usize,
    ) -> Result<bool, CacheError>;

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, CacheError>;

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError>;
}
