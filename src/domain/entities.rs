//! Domain entities mirrored from persistent storage.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// One row of a user's personal feed: `item_id` made visible to `owner_id`.
///
/// Rows are immutable. They are created once per `(owner_id, item_id)` pair by
/// fan-out and only ever removed in bulk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct FeedEntryRecord {
    pub id: i64,
    pub owner_id: i64,
    pub item_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Insert payload for a feed row; the store assigns `id` and `created_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewFeedEntry {
    pub owner_id: i64,
    pub item_id: i64,
}

impl NewFeedEntry {
    pub fn new(owner_id: i64, item_id: i64) -> Self {
        Self { owner_id, item_id }
    }
}
