//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;

use crate::domain::entities::{FeedEntryRecord, NewFeedEntry};
use crate::domain::types::JobType;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("backing store unavailable: {0}")]
    Unavailable(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Slice of one owner's feed, newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// The newest `limit` entries.
    Newest { limit: usize },
    /// Up to `limit` entries created strictly before `cutoff`.
    OlderThan {
        cutoff: OffsetDateTime,
        limit: usize,
    },
    /// Every entry created strictly after `cutoff`.
    NewerThan { cutoff: OffsetDateTime },
}

impl TimeWindow {
    pub fn limit(&self) -> Option<usize> {
        match self {
            TimeWindow::Newest { limit } | TimeWindow::OlderThan { limit, .. } => Some(*limit),
            TimeWindow::NewerThan { .. } => None,
        }
    }

    /// Whether an entry created at `at` falls inside the window's bounds.
    pub fn admits(&self, at: OffsetDateTime) -> bool {
        match self {
            TimeWindow::Newest { .. } => true,
            TimeWindow::OlderThan { cutoff, .. } => at < *cutoff,
            TimeWindow::NewerThan { cutoff } => at > *cutoff,
        }
    }
}

#[async_trait]
pub trait FeedEntriesRepo: Send + Sync {
    /// Insert one entry, returning the existing row when `(owner, item)` is
    /// already present.
    async fn create_entry(&self, entry: NewFeedEntry) -> Result<FeedEntryRecord, RepoError>;

    /// Insert all entries in a single write. Rows that already exist are
    /// returned as stored.
    async fn bulk_create_entries(
        &self,
        entries: &[NewFeedEntry],
    ) -> Result<Vec<FeedEntryRecord>, RepoError>;

    async fn list_entries(
        &self,
        owner_id: i64,
        window: TimeWindow,
    ) -> Result<Vec<FeedEntryRecord>, RepoError>;
}

/// One storage backend of the follow graph.
#[async_trait]
pub trait FollowGraph: Send + Sync {
    async fn follower_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError>;

    async fn following_ids(&self, user_id: i64) -> Result<Vec<i64>, RepoError>;

    async fn follower_count(&self, user_id: i64) -> Result<u64, RepoError>;

    async fn following_count(&self, user_id: i64) -> Result<u64, RepoError>;

    async fn has_followed(&self, from_user_id: i64, to_user_id: i64) -> Result<bool, RepoError>;

    /// Returns `false` when the edge already existed.
    async fn follow(&self, from_user_id: i64, to_user_id: i64) -> Result<bool, RepoError>;

    /// Returns `false` when there was no edge to remove.
    async fn unfollow(&self, from_user_id: i64, to_user_id: i64) -> Result<bool, RepoError>;
}

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub run_at: OffsetDateTime,
    pub max_attempts: i32,
    pub priority: i32,
}

#[async_trait]
pub trait JobsRepo: Send + Sync {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError>;
}
