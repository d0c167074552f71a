use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    application::repos::{JobsRepo, NewJobRecord, RepoError},
    domain::types::JobType,
};

/// Scheduling knobs for one enqueued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobOptions {
    /// Earliest execution time; `None` means now.
    pub run_at: Option<OffsetDateTime>,
    /// Executions allowed before the runner gives up.
    pub max_attempts: i32,
    pub priority: i32,
}

impl JobOptions {
    pub const fn retrying(max_attempts: i32) -> Self {
        Self {
            run_at: None,
            max_attempts,
            priority: 0,
        }
    }
}

/// Serialize `payload` into a job of `job_type` and hand it to the queue.
pub async fn enqueue_job<J, P>(
    repo: &J,
    job_type: JobType,
    payload: &P,
    options: JobOptions,
) -> Result<String, RepoError>
where
    J: JobsRepo + ?Sized,
    P: Serialize,
{
    let payload = serde_json::to_value(payload).map_err(|err| RepoError::InvalidInput {
        message: format!("{} payload is not serializable: {err}", job_type.as_str()),
    })?;

    repo.enqueue_job(NewJobRecord {
        job_type,
        payload,
        run_at: options.run_at.unwrap_or_else(OffsetDateTime::now_utc),
        max_attempts: options.max_attempts,
        priority: options.priority,
    })
    .await
}
