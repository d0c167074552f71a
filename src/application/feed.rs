//! Personal feed reads and cache maintenance.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::application::pagination::{
    CursorParams, EndlessPage, EndlessPaginator, OrderedQuery, PaginationError, Timestamped,
};
use crate::application::repos::{FeedEntriesRepo, RepoError, TimeWindow};
use crate::cache::{CacheError, CacheableRecord, ListCache, ListKey, PushOutcome};
use crate::domain::entities::FeedEntryRecord;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error(transparent)]
    Repo(#[from] RepoError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl CacheableRecord for FeedEntryRecord {
    const MODEL: &'static str = "newsfeeds.feedentry";

    fn primary_key(&self) -> i64 {
        self.id
    }
}

impl Timestamped for FeedEntryRecord {
    fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }
}

/// Backing-store query over one owner's feed rows.
pub struct OwnerFeedQuery<'a> {
    entries: &'a dyn FeedEntriesRepo,
    owner_id: i64,
}

impl<'a> OwnerFeedQuery<'a> {
    pub fn new(entries: &'a dyn FeedEntriesRepo, owner_id: i64) -> Self {
        Self { entries, owner_id }
    }
}

#[async_trait]
impl OrderedQuery<FeedEntryRecord> for OwnerFeedQuery<'_> {
    async fn fetch(&self, window: TimeWindow) -> Result<Vec<FeedEntryRecord>, RepoError> {
        self.entries.list_entries(self.owner_id, window).await
    }
}

#[derive(Clone)]
pub struct FeedService {
    entries: Arc<dyn FeedEntriesRepo>,
    cache: ListCache,
    paginator: EndlessPaginator,
}

impl FeedService {
    pub fn new(entries: Arc<dyn FeedEntriesRepo>, cache: ListCache, page_size: usize) -> Self {
        let paginator = EndlessPaginator::new(page_size, cache.limit());
        Self {
            entries,
            cache,
            paginator,
        }
    }

    pub fn paginator(&self) -> &EndlessPaginator {
        &self.paginator
    }

    /// The owner's newest entries, at most the cache limit, through the cache.
    pub async fn load_cached_sequence(
        &self,
        owner_id: i64,
    ) -> Result<Vec<FeedEntryRecord>, FeedError> {
        let entries = Arc::clone(&self.entries);
        let rows = self
            .cache
            .load(&ListKey::feed(owner_id), move |limit| async move {
                entries
                    .list_entries(owner_id, TimeWindow::Newest { limit })
                    .await
            })
            .await?;
        Ok(rows)
    }

    /// Put a freshly created entry at the head of its owner's cached list.
    pub async fn push_new_entry(&self, entry: &FeedEntryRecord) -> Result<PushOutcome, FeedError> {
        let outcome = self
            .cache
            .push(&ListKey::feed(entry.owner_id), entry)
            .await?;
        debug!(
            target = "application::feed::push_new_entry",
            owner_id = entry.owner_id,
            entry_id = entry.id,
            outcome = outcome.as_str(),
            "Feed entry pushed"
        );
        Ok(outcome)
    }

    /// Drop the owner's cached list. Call after deleting or rewriting rows.
    pub async fn invalidate_feed(&self, owner_id: i64) -> Result<(), FeedError> {
        self.cache.invalidate(&ListKey::feed(owner_id)).await?;
        Ok(())
    }

    /// One page of the owner's feed.
    pub async fn list_feed(
        &self,
        owner_id: i64,
        params: CursorParams,
    ) -> Result<EndlessPage<FeedEntryRecord>, FeedError> {
        let cached = self.load_cached_sequence(owner_id).await?;
        let query = OwnerFeedQuery::new(self.entries.as_ref(), owner_id);
        let page = self
            .paginator
            .paginate(Some(cached.as_slice()), &query, params)
            .await?;
        debug!(
            target = "application::feed::list_feed",
            owner_id,
            returned = page.results.len(),
            has_next_page = page.has_next_page,
            "Feed page served"
        );
        Ok(page)
    }
}
