use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder};

use crate::{
    application::repos::{FeedEntriesRepo, RepoError, TimeWindow},
    domain::entities::{FeedEntryRecord, NewFeedEntry},
};

use super::{PostgresRepositories, map_sqlx_error};

const RETURNING_COLUMNS: &str = " RETURNING id, owner_id, item_id, created_at";

/// Existing `(owner_id, item_id)` rows are touched rather than skipped so
/// that `RETURNING` yields them too.
const ON_CONFLICT_RETURN_EXISTING: &str = " ON CONFLICT ON CONSTRAINT feed_entries_owner_item_key \
    DO UPDATE SET item_id = EXCLUDED.item_id";

#[async_trait]
impl FeedEntriesRepo for PostgresRepositories {
    async fn create_entry(&self, entry: NewFeedEntry) -> Result<FeedEntryRecord, RepoError> {
        let mut rows = self.bulk_create_entries(&[entry]).await?;
        rows.pop().ok_or_else(|| {
            RepoError::from_persistence(format!(
                "insert of feed entry ({}, {}) returned no row",
                entry.owner_id, entry.item_id
            ))
        })
    }

    async fn bulk_create_entries(
        &self,
        entries: &[NewFeedEntry],
    ) -> Result<Vec<FeedEntryRecord>, RepoError> {
        let mut seen = HashSet::with_capacity(entries.len());
        let unique: Vec<&NewFeedEntry> = entries
            .iter()
            .filter(|entry| seen.insert((entry.owner_id, entry.item_id)))
            .collect();
        if unique.is_empty() {
            return Ok(Vec::new());
        }

        let mut qb = QueryBuilder::<Postgres>::new("INSERT INTO feed_entries (owner_id, item_id) ");
        qb.push_values(unique, |mut row, entry| {
            row.push_bind(entry.owner_id).push_bind(entry.item_id);
        });
        qb.push(ON_CONFLICT_RETURN_EXISTING);
        qb.push(RETURNING_COLUMNS);

        qb.build_query_as::<FeedEntryRecord>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn list_entries(
        &self,
        owner_id: i64,
        window: TimeWindow,
    ) -> Result<Vec<FeedEntryRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT id, owner_id, item_id, created_at FROM feed_entries WHERE owner_id = ",
        );
        qb.push_bind(owner_id);

        match window {
            TimeWindow::Newest { .. } => {}
            TimeWindow::OlderThan { cutoff, .. } => {
                qb.push(" AND created_at < ");
                qb.push_bind(cutoff);
            }
            TimeWindow::NewerThan { cutoff } => {
                qb.push(" AND created_at > ");
                qb.push_bind(cutoff);
            }
        }

        qb.push(" ORDER BY created_at DESC, id DESC");
        if let Some(limit) = window.limit() {
            let limit = i64::try_from(limit).map_err(|_| RepoError::InvalidInput {
                message: format!("feed window limit {limit} out of range"),
            })?;
            qb.push(" LIMIT ");
            qb.push_bind(limit);
        }

        qb.build_query_as::<FeedEntryRecord>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)
    }
}
