use async_trait::async_trait;

use crate::application::repos::{JobsRepo, NewJobRecord, RepoError};

use super::{PostgresRepositories, map_sqlx_error};

/// Status apalis workers poll for.
const PENDING: &str = "Pending";

/// `apalis.push_job` inserts the row and wakes listening workers.
const PUSH_JOB_SQL: &str = "SELECT (apalis.push_job($1, $2::json, $3, $4, $5, $6)).id";

#[async_trait]
impl JobsRepo for PostgresRepositories {
    async fn enqueue_job(&self, job: NewJobRecord) -> Result<String, RepoError> {
        let NewJobRecord {
            job_type,
            payload,
            run_at,
            max_attempts,
            priority,
        } = job;

        sqlx::query_scalar::<_, String>(PUSH_JOB_SQL)
            .bind(job_type.as_str())
            .bind(payload)
            .bind(PENDING)
            .bind(run_at)
            .bind(max_attempts)
            .bind(priority)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}
