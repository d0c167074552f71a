//! Publishing entry point: the owner's own feed row is written synchronously,
//! delivery to followers runs on the job queue.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::application::feed::{FeedError, FeedService};
use crate::application::friendships::FriendshipError;
use crate::application::jobs::enqueue_fanout_main_job;
use crate::application::repos::{FeedEntriesRepo, JobsRepo, RepoError};
use crate::domain::entities::{FeedEntryRecord, NewFeedEntry};

#[derive(Debug, Error)]
pub enum FanoutError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Feed(#[from] FeedError),
    #[error(transparent)]
    Friendship(#[from] FriendshipError),
    #[error("fan-out task exceeded its time limit of {0:?}")]
    TaskTimeout(Duration),
}

#[derive(Debug, Clone)]
pub struct FanoutReceipt {
    /// The owner's own feed row.
    pub entry: FeedEntryRecord,
    /// Id of the enqueued `fanout_main` job.
    pub job_id: String,
}

#[derive(Clone)]
pub struct FanoutDispatcher {
    entries: Arc<dyn FeedEntriesRepo>,
    feed: Arc<FeedService>,
    jobs: Arc<dyn JobsRepo>,
}

impl FanoutDispatcher {
    pub fn new(
        entries: Arc<dyn FeedEntriesRepo>,
        feed: Arc<FeedService>,
        jobs: Arc<dyn JobsRepo>,
    ) -> Self {
        Self {
            entries,
            feed,
            jobs,
        }
    }

    /// Make `item_id` visible in its owner's feed right away and schedule
    /// delivery to the owner's followers.
    ///
    /// Calling this twice for the same item is harmless: the owner row is
    /// reused and follower rows are deduplicated by the store. Only the
    /// backing store and the job queue can fail a dispatch.
    pub async fn dispatch_fanout(
        &self,
        item_id: i64,
        owner_id: i64,
    ) -> Result<FanoutReceipt, FanoutError> {
        let entry = self
            .entries
            .create_entry(NewFeedEntry::new(owner_id, item_id))
            .await?;
        // The row is committed; a cache outage must not keep followers from
        // being scheduled.
        if let Err(err) = self.feed.push_new_entry(&entry).await {
            warn!(
                target = "application::fanout::dispatch_fanout",
                owner_id,
                entry_id = entry.id,
                error = %err,
                "Owner feed push failed, continuing with fan-out"
            );
        }

        let job_id = enqueue_fanout_main_job(self.jobs.as_ref(), item_id, owner_id).await?;

        info!(
            target = "application::fanout::dispatch_fanout",
            item_id,
            owner_id,
            entry_id = entry.id,
            job_id = %job_id,
            "Fan-out dispatched"
        );

        Ok(FanoutReceipt { entry, job_id })
    }
}
