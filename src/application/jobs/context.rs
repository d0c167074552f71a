use std::{future::Future, num::NonZeroUsize, sync::Arc, time::Duration};

use apalis::prelude::Error as ApalisError;

use crate::application::{
    fanout::FanoutError,
    feed::FeedService,
    friendships::FollowerResolver,
    repos::{FeedEntriesRepo, JobsRepo},
};

/// Shared context passed to fan-out workers.
#[derive(Clone)]
pub struct FanoutWorkerContext {
    pub entries: Arc<dyn FeedEntriesRepo>,
    pub followers: Arc<dyn FollowerResolver>,
    pub feed: Arc<FeedService>,
    pub jobs: Arc<dyn JobsRepo>,
    /// Followers per `fanout_batch` job.
    pub batch_size: NonZeroUsize,
    /// Wall-clock budget of a single job execution.
    pub time_limit: Duration,
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Convert any error into an [`ApalisError::Failed`].
pub fn job_failed<E>(err: E) -> ApalisError
where
    E: std::error::Error + Send + Sync + 'static,
{
    let boxed: BoxError = Box::new(err);
    ApalisError::Failed(Arc::new(boxed))
}

/// Run `work`, failing with [`FanoutError::TaskTimeout`] once `limit` elapses.
pub async fn with_time_limit<T, F>(limit: Duration, work: F) -> Result<T, FanoutError>
where
    F: Future<Output = Result<T, FanoutError>>,
{
    tokio::time::timeout(limit, work)
        .await
        .map_err(|_| FanoutError::TaskTimeout(limit))?
}
