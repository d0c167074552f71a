//! In-process doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use murmur::application::fanout::FanoutError;
use murmur::application::feed::FeedService;
use murmur::application::friendships::{FollowerResolver, FriendshipError};
use murmur::application::jobs::{
    FanoutBatchJobPayload, FanoutMainJobPayload, FanoutWorkerContext, run_fanout_batch,
    run_fanout_main,
};
use murmur::application::repos::{
    FeedEntriesRepo, JobsRepo, NewJobRecord, RepoError, TimeWindow,
};
use murmur::cache::{CacheConfig, CacheError, KeyValueStore, ListCache};
use murmur::domain::entities::{FeedEntryRecord, NewFeedEntry};
use murmur::domain::types::JobType;
use time::OffsetDateTime;

/// Feed rows kept in memory. Every new row is one second newer than the last.
pub struct MemoryFeedEntries {
    rows: Mutex<Vec<FeedEntryRecord>>,
    reads: AtomicUsize,
}

impl Default for MemoryFeedEntries {
    fn default() -> Self {
        Self {
            rows: Mutex::new(Vec::new()),
            reads: AtomicUsize::new(0),
        }
    }
}

impl MemoryFeedEntries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `list_entries` calls served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.rows.lock().expect("rows lock").len()
    }

    /// Every row of `owner_id`, newest first.
    pub fn feed_of(&self, owner_id: i64) -> Vec<FeedEntryRecord> {
        let mut rows: Vec<FeedEntryRecord> = self
            .rows
            .lock()
            .expect("rows lock")
            .iter()
            .filter(|row| row.owner_id == owner_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        rows
    }

    fn insert(rows: &mut Vec<FeedEntryRecord>, entry: NewFeedEntry) -> FeedEntryRecord {
        if let Some(existing) = rows
            .iter()
            .find(|row| row.owner_id == entry.owner_id && row.item_id == entry.item_id)
        {
            return existing.clone();
        }
        let id = rows.len() as i64 + 1;
        let record = FeedEntryRecord {
            id,
            owner_id: entry.owner_id,
            item_id: entry.item_id,
            created_at: at(id),
        };
        rows.push(record.clone());
        record
    }
}

#[async_trait]
impl FeedEntriesRepo for MemoryFeedEntries {
    async fn create_entry(&self, entry: NewFeedEntry) -> Result<FeedEntryRecord, RepoError> {
        let mut rows = self.rows.lock().expect("rows lock");
        Ok(Self::insert(&mut rows, entry))
    }

    async fn bulk_create_entries(
        &self,
        entries: &[NewFeedEntry],
    ) -> Result<Vec<FeedEntryRecord>, RepoError> {
        let mut rows = self.rows.lock().expect("rows lock");
        let mut created: Vec<FeedEntryRecord> = Vec::with_capacity(entries.len());
        for entry in entries {
            let record = Self::insert(&mut rows, *entry);
            if !created.iter().any(|row| row.id == record.id) {
                created.push(record);
            }
        }
        Ok(created)
    }

    async fn list_entries(
        &self,
        owner_id: i64,
        window: TimeWindow,
    ) -> Result<Vec<FeedEntryRecord>, RepoError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let rows = self
            .feed_of(owner_id)
            .into_iter()
            .filter(|row| window.admits(row.created_at));
        Ok(match window.limit() {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        })
    }
}

/// Second `n` after the epoch.
pub fn at(seconds: i64) -> OffsetDateTime {
    OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(seconds)
}

/// Fixed follower lists, optionally slow to answer.
#[derive(Default)]
pub struct StaticFollowers {
    followers: HashMap<i64, Vec<i64>>,
    delay: Option<Duration>,
}

impl StaticFollowers {
    pub fn new(followers: impl IntoIterator<Item = (i64, Vec<i64>)>) -> Self {
        Self {
            followers: followers.into_iter().collect(),
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl FollowerResolver for StaticFollowers {
    async fn follower_ids(&self, owner_id: i64) -> Result<Vec<i64>, FriendshipError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.followers.get(&owner_id).cloned().unwrap_or_default())
    }
}

/// Records enqueued jobs instead of handing them to a queue.
#[derive(Default)]
pub struct QueuedJobs {
    jobs: Mutex<Vec<NewJobRecord>>,
}

impl QueuedJobs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, job_type: JobType) -> usize {
        self.jobs
            .lock()
            .expect("jobs lock")
            .iter()
            .filter(|job| job.job_type == job_type)
            .count()
    }

    /// Remove and return the oldest queued job.
    pub fn pop(&self) -> Option<NewJobRecord> {
        let mut jobs = self.jobs.lock().expect("jobs lock");
        if jobs.is_empty() {
            None
        } else {
            Some(jobs.remove(0))
        }
    }

    pub fn batch_payloads(&self) -> Vec<FanoutBatchJobPayload> {
        self.jobs
            .lock()
            .expect("jobs lock")
            .iter()
            .filter(|job| job.job_type == JobType::FanoutBatch)
            .map(|job| serde_json::from_value(job.payload.clone()).expect("batch payload"))
            .collect()
    }
}

#[async_trait]
impl JobsRepo for QueuedJobs {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        let mut jobs = self.jobs.lock().expect("jobs lock");
        jobs.push(job);
        Ok(format!("job-{}", jobs.len()))
    }
}

/// A shared store that is always down.
pub struct DownStore;

fn down() -> CacheError {
    CacheError::unavailable("connection refused")
}

#[async_trait]
impl KeyValueStore for DownStore {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Err(down())
    }

    async fn set(&self, _key: &str, _value: &str) -> Result<(), CacheError> {
        Err(down())
    }

    async fn exists(&self, _key: &str) -> Result<bool, CacheError> {
        Err(down())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Err(down())
    }

    async fn list_range(
        &self,
        _key: &str,
        _start: isize,
        _stop: isize,
    ) -> Result<Vec<String>, CacheError> {
        Err(down())
    }

    async fn list_replace(&self, _key: &str, _values: &[String]) -> Result<(), CacheError> {
        Err(down())
    }

    async fn list_push_existing_trim(
        &self,
        _key: &str,
        _value: &str,
        _max_len: usize,
    ) -> Result<bool, CacheError> {
        Err(down())
    }

    async fn hash_get_all(&self, _key: &str) -> Result<HashMap<String, String>, CacheError> {
        Err(down())
    }

    async fn hash_set(&self, _key: &str, _field: &str, _value: &str) -> Result<(), CacheError> {
        Err(down())
    }
}

pub fn feed_service(
    entries: Arc<MemoryFeedEntries>,
    store: Arc<dyn KeyValueStore>,
    page_size: usize,
    list_limit: usize,
) -> Arc<FeedService> {
    let cache = ListCache::new(store, CacheConfig::with_list_limit(list_limit));
    Arc::new(FeedService::new(entries, cache, page_size))
}

/// Run queued fan-out jobs inline until the queue is empty.
pub async fn drain(ctx: &FanoutWorkerContext, jobs: &QueuedJobs) -> Result<(), FanoutError> {
    while let Some(job) = jobs.pop() {
        match job.job_type {
            JobType::FanoutMain => {
                let payload: FanoutMainJobPayload =
                    serde_json::from_value(job.payload).expect("main payload");
                run_fanout_main(ctx, &payload).await?;
            }
            JobType::FanoutBatch => {
                let payload: FanoutBatchJobPayload =
                    serde_json::from_value(job.payload).expect("batch payload");
                run_fanout_batch(ctx, &payload).await?;
            }
        }
    }
    Ok(())
}
