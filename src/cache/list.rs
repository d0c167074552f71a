//! Cache-aside list of serialized records.
//!
//! A cached list is either absent (cold) or a newest-first prefix of the
//! backing-store sequence, at most `list_limit` long. Reads fill cold lists
//! from the backing store; writers only ever extend lists that already exist.

use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use tracing::{debug, warn};

use super::config::CacheConfig;
use super::keys::ListKey;
use super::kv::{CacheError, KeyValueStore};
use super::serializer::{CacheableRecord, ObjectSerializer};

const SOURCE: &str = "cache::list";

const METRIC_HIT: &str = "murmur_feed_cache_hit_total";
const METRIC_MISS: &str = "murmur_feed_cache_miss_total";
const METRIC_PUSH: &str = "murmur_feed_cache_push_total";
const METRIC_DEGRADED: &str = "murmur_feed_cache_degraded_total";

/// What happened to a pushed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Prepended to a live list.
    Pushed,
    /// The list was cold and stays cold.
    Cold,
    /// The push could not be applied, so the list was dropped.
    Invalidated,
    /// List caching is switched off.
    Disabled,
}

impl PushOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PushOutcome::Pushed => "pushed",
            PushOutcome::Cold => "cold",
            PushOutcome::Invalidated => "invalidated",
            PushOutcome::Disabled => "disabled",
        }
    }
}

#[derive(Clone)]
pub struct ListCache {
    store: Arc<dyn KeyValueStore>,
    config: CacheConfig,
}

impl ListCache {
    pub fn new(store: Arc<dyn KeyValueStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// Maximum number of records kept per list.
    pub fn limit(&self) -> usize {
        self.config.list_limit.get()
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Return the cached sequence at `key`, filling it from `fetch` on a miss.
    ///
    /// `fetch` receives the list limit and must return at most that many rows,
    /// newest first. Backing-store errors propagate untouched; cache errors
    /// never do. A key holding anything but a decodable list is a miss and is
    /// overwritten.
    ///
    /// The cached list is a prefix of the backing store except while a fill
    /// races a push into the same cold key: the push is dropped and the list
    /// lacks that entry until it is next rebuilt.
    pub async fn load<T, F, Fut, E>(&self, key: &ListKey, fetch: F) -> Result<Vec<T>, E>
    where
        T: CacheableRecord,
        F: FnOnce(usize) -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        let limit = self.limit();
        if !self.is_enabled() {
            return fetch(limit).await;
        }

        let rendered = key.to_string();
        let stop = isize::try_from(limit - 1).unwrap_or(isize::MAX);
        let blobs = match self.store.list_range(&rendered, 0, stop).await {
            Ok(blobs) => blobs,
            Err(err @ (CacheError::WrongType { .. } | CacheError::Corrupt { .. })) => {
                warn!(
                    target = SOURCE,
                    key = %rendered,
                    error = %err,
                    "Replacing unreadable cache entry"
                );
                Vec::new()
            }
            Err(err) => {
                warn!(
                    target = SOURCE,
                    key = %rendered,
                    error = %err,
                    "Cache read failed, serving from backing store"
                );
                counter!(METRIC_DEGRADED, "op" => "load").increment(1);
                return fetch(limit).await;
            }
        };

        if !blobs.is_empty() {
            match decode_all::<T>(&blobs) {
                Ok(records) => {
                    counter!(METRIC_HIT).increment(1);
                    return Ok(records);
                }
                Err(reason) => {
                    warn!(
                        target = SOURCE,
                        key = %rendered,
                        reason = %reason,
                        "Discarding undecodable cached list"
                    );
                }
            }
        }

        counter!(METRIC_MISS).increment(1);
        let rows = fetch(limit).await?;
        self.fill(&rendered, &rows).await;
        Ok(rows)
    }

    /// Prepend `record` to the list at `key` if the list is live, trimming it
    /// back to the limit. Cold lists are left cold.
    pub async fn push<T: CacheableRecord>(
        &self,
        key: &ListKey,
        record: &T,
    ) -> Result<PushOutcome, CacheError> {
        if !self.is_enabled() {
            return Ok(PushOutcome::Disabled);
        }

        let rendered = key.to_string();
        let outcome = match ObjectSerializer::serialize(record) {
            Ok(blob) => {
                match self
                    .store
                    .list_push_existing_trim(&rendered, &blob, self.limit())
                    .await
                {
                    Ok(true) => PushOutcome::Pushed,
                    Ok(false) => PushOutcome::Cold,
                    Err(err) => {
                        warn!(
                            target = SOURCE,
                            key = %rendered,
                            error = %err,
                            "Cache push failed, invalidating list"
                        );
                        counter!(METRIC_DEGRADED, "op" => "push").increment(1);
                        self.store.delete(&rendered).await.map_err(|_| err)?;
                        PushOutcome::Invalidated
                    }
                }
            }
            Err(err) => {
                warn!(
                    target = SOURCE,
                    key = %rendered,
                    error = %err,
                    "Record could not be serialized, invalidating list"
                );
                self.store.delete(&rendered).await?;
                PushOutcome::Invalidated
            }
        };

        counter!(METRIC_PUSH, "outcome" => outcome.as_str()).increment(1);
        debug!(target = SOURCE, key = %rendered, outcome = outcome.as_str(), "Cache push");
        Ok(outcome)
    }

    /// Drop the list at `key`; the next read rebuilds it.
    pub async fn invalidate(&self, key: &ListKey) -> Result<(), CacheError> {
        self.store.delete(&key.to_string()).await
    }

    async fn fill<T: CacheableRecord>(&self, rendered: &str, rows: &[T]) {
        let blobs = match rows
            .iter()
            .map(ObjectSerializer::serialize)
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(blobs) => blobs,
            Err(err) => {
                warn!(target = SOURCE, key = %rendered, error = %err, "Skipping cache fill");
                return;
            }
        };

        if let Err(err) = self.store.list_replace(rendered, &blobs).await {
            warn!(
                target = SOURCE,
                key = %rendered,
                error = %err,
                "Cache fill failed"
            );
            counter!(METRIC_DEGRADED, "op" => "fill").increment(1);
        }
    }
}

fn decode_all<T: CacheableRecord>(blobs: &[String]) -> Result<Vec<T>, String> {
    blobs
        .iter()
        .map(|blob| ObjectSerializer::deserialize::<T>(blob).map_err(|err| err.to_string()))
        .collect()
}
