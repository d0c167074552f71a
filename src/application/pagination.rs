//! Endless (time-cursor) pagination over feeds.
//!
//! Pages are newest first. A client either pages backwards with `older_than`
//! or polls for fresh items with `newer_than`; both cursors are exclusive
//! timestamps. The same rules apply to an in-memory newest-first list and to
//! an ordered backing-store query, and [`EndlessPaginator::paginate`] decides
//! when a bounded cached list is trustworthy on its own.

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;

use crate::application::repos::{RepoError, TimeWindow};

const METRIC_FALLBACK: &str = "murmur_feed_pagination_fallback_total";

/// Records that carry a creation timestamp.
pub trait Timestamped {
    fn created_at(&self) -> OffsetDateTime;
}

/// An ordered backing-store query yielding newest-first rows for a window.
#[async_trait]
pub trait OrderedQuery<T>: Send + Sync {
    async fn fetch(&self, window: TimeWindow) -> Result<Vec<T>, RepoError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct FeedCursorPayload {
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

/// Portable token form of a feed timestamp cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedCursor {
    created_at: OffsetDateTime,
}

impl FeedCursor {
    pub fn new(created_at: OffsetDateTime) -> Self {
        Self { created_at }
    }

    pub fn created_at(&self) -> OffsetDateTime {
        self.created_at
    }

    pub fn encode(&self) -> String {
        let payload = FeedCursorPayload {
            created_at: self.created_at,
        };
        let serialized =
            serde_json::to_vec(&payload).expect("serializing feed cursor payload should succeed");
        URL_SAFE_NO_PAD.encode(serialized)
    }

    pub fn decode(cursor: &str) -> Result<Self, PaginationError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(cursor)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        let payload: FeedCursorPayload = serde_json::from_slice(&bytes)
            .map_err(|err| PaginationError::InvalidCursor(err.to_string()))?;
        Ok(Self {
            created_at: payload.created_at,
        })
    }
}

#[derive(Debug, Error)]
pub enum PaginationError {
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),
}

/// Request cursors. When both are set, `newer_than` wins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorParams {
    pub newer_than: Option<OffsetDateTime>,
    pub older_than: Option<OffsetDateTime>,
}

impl CursorParams {
    pub fn newest() -> Self {
        Self::default()
    }

    pub fn newer_than(at: OffsetDateTime) -> Self {
        Self {
            newer_than: Some(at),
            older_than: None,
        }
    }

    pub fn older_than(at: OffsetDateTime) -> Self {
        Self {
            newer_than: None,
            older_than: Some(at),
        }
    }

    /// Build params from encoded [`FeedCursor`] tokens.
    pub fn from_tokens(
        newer_than: Option<&str>,
        older_than: Option<&str>,
    ) -> Result<Self, PaginationError> {
        let decode = |token: Option<&str>| {
            token
                .map(|token| FeedCursor::decode(token).map(|cursor| cursor.created_at()))
                .transpose()
        };
        Ok(Self {
            newer_than: decode(newer_than)?,
            older_than: decode(older_than)?,
        })
    }

    fn direction(&self) -> Direction {
        match (self.newer_than, self.older_than) {
            (Some(cutoff), _) => Direction::Newer(cutoff),
            (None, Some(cutoff)) => Direction::Older(cutoff),
            (None, None) => Direction::Newest,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Newest,
    Newer(OffsetDateTime),
    Older(OffsetDateTime),
}

/// One page of results. There is deliberately no total count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndlessPage<T> {
    pub has_next_page: bool,
    pub results: Vec<T>,
}

impl<T> EndlessPage<T> {
    pub fn empty() -> Self {
        Self {
            has_next_page: false,
            results: Vec::new(),
        }
    }
}

impl<T: Timestamped> EndlessPage<T> {
    /// Cursor for the following page, if there is one.
    pub fn next_cursor(&self) -> Option<FeedCursor> {
        if !self.has_next_page {
            return None;
        }
        self.results
            .last()
            .map(|last| FeedCursor::new(last.created_at()))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EndlessPaginator {
    page_size: usize,
    cache_limit: usize,
}

impl EndlessPaginator {
    /// `page_size` and `cache_limit` are clamped to at least one.
    pub fn new(page_size: usize, cache_limit: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            cache_limit: cache_limit.max(1),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn cache_limit(&self) -> usize {
        self.cache_limit
    }

    /// Paginate against the backing store, probing one extra row to learn
    /// whether an older page exists.
    pub async fn paginate_query<T, Q>(
        &self,
        query: &Q,
        params: CursorParams,
    ) -> Result<EndlessPage<T>, RepoError>
    where
        Q: OrderedQuery<T> + ?Sized,
    {
        let probe = self.page_size + 1;
        let window = match params.direction() {
            Direction::Newer(cutoff) => {
                let results = query.fetch(TimeWindow::NewerThan { cutoff }).await?;
                return Ok(EndlessPage {
                    has_next_page: false,
                    results,
                });
            }
            Direction::Newest => TimeWindow::Newest { limit: probe },
            Direction::Older(cutoff) => TimeWindow::OlderThan {
                cutoff,
                limit: probe,
            },
        };

        let mut results = query.fetch(window).await?;
        let has_next_page = results.len() > self.page_size;
        results.truncate(self.page_size);
        Ok(EndlessPage {
            has_next_page,
            results,
        })
    }

    /// Paginate a newest-first in-memory list.
    pub fn paginate_ordered_list<T>(&self, list: &[T], params: CursorParams) -> EndlessPage<T>
    where
        T: Timestamped + Clone,
    {
        let start = match params.direction() {
            Direction::Newer(cutoff) => {
                let results = list
                    .iter()
                    .take_while(|item| item.created_at() > cutoff)
                    .cloned()
                    .collect();
                return EndlessPage {
                    has_next_page: false,
                    results,
                };
            }
            Direction::Newest => 0,
            Direction::Older(cutoff) => {
                match list.iter().position(|item| item.created_at() < cutoff) {
                    Some(index) => index,
                    None => return EndlessPage::empty(),
                }
            }
        };

        let end = list.len().min(start + self.page_size);
        EndlessPage {
            has_next_page: list.len() - start > self.page_size,
            results: list[start..end].to_vec(),
        }
    }

    /// Paginate a bounded cached list. Returns `None` when the list is full
    /// and the page ran off its end, because older rows may exist only in
    /// the backing store.
    pub fn paginate_cached_list<T>(&self, list: &[T], params: CursorParams) -> Option<EndlessPage<T>>
    where
        T: Timestamped + Clone,
    {
        let page = self.paginate_ordered_list(list, params);
        if !page.has_next_page && list.len() >= self.cache_limit {
            return None;
        }
        Some(page)
    }

    /// Serve a page from `cached` when it is conclusive, otherwise from `query`.
    pub async fn paginate<T, Q>(
        &self,
        cached: Option<&[T]>,
        query: &Q,
        params: CursorParams,
    ) -> Result<EndlessPage<T>, RepoError>
    where
        T: Timestamped + Clone,
        Q: OrderedQuery<T> + ?Sized,
    {
        if let Some(list) = cached {
            if let Some(page) = self.paginate_cached_list(list, params) {
                return Ok(page);
            }
            counter!(METRIC_FALLBACK).increment(1);
            debug!(
                target = "application::pagination::paginate",
                cached_len = list.len(),
                cache_limit = self.cache_limit,
                "Cached list inconclusive, querying backing store"
            );
        }
        self.paginate_query(query, params).await
    }
}
