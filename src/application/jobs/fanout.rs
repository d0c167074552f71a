use std::fmt;
use std::time::Instant;

use apalis::prelude::{Data, Error as ApalisError};
use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    application::{
        fanout::FanoutError,
        repos::{JobsRepo, RepoError},
    },
    domain::{entities::NewFeedEntry, types::JobType},
};

use super::{
    context::{FanoutWorkerContext, job_failed, with_time_limit},
    queue::{JobOptions, enqueue_job},
};

const METRIC_FANOUT_ENTRIES: &str = "murmur_fanout_entries_total";
const METRIC_FANOUT_BATCH_MS: &str = "murmur_fanout_batch_ms";

/// Both fan-out stages retry up to five times.
pub const FANOUT_JOB_OPTIONS: JobOptions = JobOptions::retrying(5);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutMainJobPayload {
    pub item_id: i64,
    pub owner_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanoutBatchJobPayload {
    pub item_id: i64,
    pub follower_ids: Vec<i64>,
}

pub async fn enqueue_fanout_main_job<J: JobsRepo + ?Sized>(
    repo: &J,
    item_id: i64,
    owner_id: i64,
) -> Result<String, RepoError> {
    let payload = FanoutMainJobPayload { item_id, owner_id };
    enqueue_job(
        repo,
        JobType::FanoutMain,
        &payload,
        FANOUT_JOB_OPTIONS,
    )
    .await
}

pub async fn enqueue_fanout_batch_job<J: JobsRepo + ?Sized>(
    repo: &J,
    item_id: i64,
    follower_ids: Vec<i64>,
) -> Result<String, RepoError> {
    let payload = FanoutBatchJobPayload {
        item_id,
        follower_ids,
    };
    enqueue_job(
        repo,
        JobType::FanoutBatch,
        &payload,
        FANOUT_JOB_OPTIONS,
    )
    .await
}

/// What a `fanout_main` run scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FanoutSummary {
    pub followers: usize,
    pub batches: usize,
}

impl fmt::Display for FanoutSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} newsfeeds will be fanned out, {} batches created",
            self.followers, self.batches
        )
    }
}

/// Resolve the owner's current followers and enqueue one batch job per chunk.
pub async fn run_fanout_main(
    ctx: &FanoutWorkerContext,
    payload: &FanoutMainJobPayload,
) -> Result<FanoutSummary, FanoutError> {
    let follower_ids: Vec<i64> = ctx
        .followers
        .follower_ids(payload.owner_id)
        .await?
        .into_iter()
        .filter(|id| *id != payload.owner_id)
        .collect();

    let mut batches = 0;
    for chunk in follower_ids.chunks(ctx.batch_size.get()) {
        enqueue_fanout_batch_job(ctx.jobs.as_ref(), payload.item_id, chunk.to_vec()).await?;
        batches += 1;
    }

    Ok(FanoutSummary {
        followers: follower_ids.len(),
        batches,
    })
}

/// Persist one batch of follower rows in a single write, then push each row
/// to its owner's cached list. Returns the number of rows written or found.
pub async fn run_fanout_batch(
    ctx: &FanoutWorkerContext,
    payload: &FanoutBatchJobPayload,
) -> Result<usize, FanoutError> {
    let started_at = Instant::now();
    let new_entries: Vec<NewFeedEntry> = payload
        .follower_ids
        .iter()
        .map(|follower_id| NewFeedEntry::new(*follower_id, payload.item_id))
        .collect();

    let rows = ctx.entries.bulk_create_entries(&new_entries).await?;
    for row in &rows {
        ctx.feed.push_new_entry(row).await?;
    }

    counter!(METRIC_FANOUT_ENTRIES).increment(rows.len() as u64);
    histogram!(METRIC_FANOUT_BATCH_MS).record(started_at.elapsed().as_secs_f64() * 1000.0);
    Ok(rows.len())
}

pub async fn process_fanout_main_job(
    payload: FanoutMainJobPayload,
    context: Data<FanoutWorkerContext>,
) -> Result<(), ApalisError> {
    let ctx = &*context;

    let summary = with_time_limit(ctx.time_limit, run_fanout_main(ctx, &payload))
        .await
        .map_err(job_failed)?;

    info!(
        target = "application::jobs::process_fanout_main_job",
        item_id = payload.item_id,
        owner_id = payload.owner_id,
        followers = summary.followers,
        batches = summary.batches,
        "{summary}"
    );

    Ok(())
}

pub async fn process_fanout_batch_job(
    payload: FanoutBatchJobPayload,
    context: Data<FanoutWorkerContext>,
) -> Result<(), ApalisError> {
    let ctx = &*context;

    let written = with_time_limit(ctx.time_limit, run_fanout_batch(ctx, &payload))
        .await
        .map_err(job_failed)?;

    info!(
        target = "application::jobs::process_fanout_batch_job",
        item_id = payload.item_id,
        followers = payload.follower_ids.len(),
        written,
        "fan-out batch stored"
    );

    Ok(())
}
