//! Redis-backed [`KeyValueStore`].

use std::collections::HashMap;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::RedisError;
use tracing::info;

use crate::cache::{CacheError, KeyValueStore};

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, CacheError> {
        let client = redis::Client::open(url).map_err(CacheError::unavailable)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(CacheError::unavailable)?;
        info!(
            target = "infra::redis::connect",
            "Connected to shared key-value store"
        );
        Ok(Self { conn })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

pub fn map_redis_error(key: &str, err: RedisError) -> CacheError {
    if err.code() == Some("WRONGTYPE") {
        return CacheError::WrongType {
            key: key.to_string(),
        };
    }
    CacheError::unavailable(err)
}

fn to_isize(value: usize) -> isize {
    isize::try_from(value).unwrap_or(isize::MAX)
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        redis::cmd("GET")
            .arg(key)
            .query_async::<_, Option<String>>(&mut self.conn())
            .await
            .map_err(|err| map_redis_error(key, err))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), CacheError> {
        redis::cmd("SET")
            .arg(key)
            .arg(value)
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(|err| map_redis_error(key, err))
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        redis::cmd("EXISTS")
            .arg(key)
            .query_async::<_, bool>(&mut self.conn())
            .await
            .map_err(|err| map_redis_error(key, err))
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(|err| map_redis_error(key, err))
    }

    async fn list_range(
        &self,
        key: &str,
        start: isize,
        stop: isize,
    ) -> Result<Vec<String>, CacheError> {
        redis::cmd("LRANGE")
            .arg(key)
            .arg(start)
            .arg(stop)
            .query_async::<_, Vec<String>>(&mut self.conn())
            .await
            .map_err(|err| map_redis_error(key, err))
    }

    async fn list_replace(&self, key: &str, values: &[String]) -> Result<(), CacheError> {
        let mut pipe = redis::pipe();
        pipe.atomic().del(key).ignore();
        if !values.is_empty() {
            pipe.rpush(key, values).ignore();
        }
        pipe.query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(|err| map_redis_error(key, err))
    }

    async fn list_push_existing_trim(
        &self,
        key: &str,
        value: &str,
        max_len: usize,
    ) -> Result<bool, CacheError> {
        let (len,): (usize,) = redis::pipe()
            .atomic()
            .lpush_exists(key, value)
            .ltrim(key, 0, to_isize(max_len) - 1)
            .ignore()
            .query_async(&mut self.conn())
            .await
            .map_err(|err| map_redis_error(key, err))?;
        Ok(len > 0)
    }

    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>, CacheError> {
        redis::cmd("HGETALL")
            .arg(key)
            .query_async::<_, HashMap<String, String>>(&mut self.conn())
            .await
            .map_err(|err| map_redis_error(key, err))
    }

    async fn hash_set(&self, key: &str, field: &str, value: &str) -> Result<(), CacheError> {
        redis::cmd("HSET")
            .arg(key)
            .arg(field)
            .arg(value)
            .query_async::<_, ()>(&mut self.conn())
            .await
            .map_err(|err| map_redis_error(key, err))
    }
}
