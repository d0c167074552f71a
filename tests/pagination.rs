mod support;

use std::sync::Arc;

use murmur::application::feed::FeedService;
use murmur::application::pagination::{CursorParams, FeedCursor};
use murmur::application::repos::FeedEntriesRepo;
use murmur::cache::MemoryStore;
use murmur::domain::entities::{FeedEntryRecord, NewFeedEntry};

use support::{MemoryFeedEntries, at, feed_service};

const OWNER: i64 = 9;

async fn feed_with(count: i64, page_size: usize, list_limit: usize) -> Arc<FeedService> {
    let entries = Arc::new(MemoryFeedEntries::new());
    for item in 1..=count {
        entries
            .create_entry(NewFeedEntry::new(OWNER, item))
            .await
            .expect("seed entry");
    }
    feed_service(entries, Arc::new(MemoryStore::new()), page_size, list_limit)
}

fn ids(rows: &[FeedEntryRecord]) -> Vec<i64> {
    rows.iter().map(|row| row.item_id).collect()
}

/// Follow `older_than` cursors from the newest page until the feed runs out.
async fn walk(feed: &FeedService) -> Vec<i64> {
    let mut seen = Vec::new();
    let mut params = CursorParams::newest();
    for _ in 0..64 {
        let page = feed.list_feed(OWNER, params).await.expect("page");
        seen.extend(ids(&page.results));
        match page.next_cursor() {
            Some(cursor) => {
                let token = cursor.encode();
                params = CursorParams::from_tokens(None, Some(&token)).expect("cursor decodes");
            }
            None => return seen,
        }
    }
    panic!("pagination did not terminate");
}

#[tokio::test]
async fn walking_older_pages_visits_every_entry_once() {
    for (count, page_size, list_limit) in [(7, 2, 5), (5, 2, 5), (5, 5, 5), (12, 3, 4), (3, 2, 5)] {
        let feed = feed_with(count, page_size, list_limit).await;
        let expected: Vec<i64> = (1..=count).rev().collect();
        assert_eq!(
            walk(&feed).await,
            expected,
            "count={count} page_size={page_size} list_limit={list_limit}"
        );
    }
}

#[tokio::test]
async fn page_past_the_cached_window_comes_from_the_store() {
    let feed = feed_with(7, 3, 5).await;

    let page = feed
        .list_feed(OWNER, CursorParams::older_than(at(5)))
        .await
        .expect("page");

    assert_eq!(ids(&page.results), vec![4, 3, 2]);
    assert!(page.has_next_page);
}

#[tokio::test]
async fn newer_than_polls_fresh_entries() {
    let feed = feed_with(6, 2, 10).await;

    let page = feed
        .list_feed(OWNER, CursorParams::newer_than(at(3)))
        .await
        .expect("page");

    assert_eq!(ids(&page.results), vec![6, 5, 4]);
    assert!(!page.has_next_page);
    assert!(page.next_cursor().is_none());
}

#[tokio::test]
async fn newer_than_on_a_full_cache_still_sees_everything() {
    let feed = feed_with(8, 2, 3).await;

    let page = feed
        .list_feed(OWNER, CursorParams::newer_than(at(2)))
        .await
        .expect("page");

    assert_eq!(ids(&page.results), vec![8, 7, 6, 5, 4, 3]);
}

#[tokio::test]
async fn empty_feed_has_no_next_page() {
    let feed = feed_with(0, 2, 5).await;
    let page = feed
        .list_feed(OWNER, CursorParams::newest())
        .await
        .expect("page");
    assert!(page.results.is_empty());
    assert!(!page.has_next_page);
}

#[test]
fn malformed_cursor_tokens_are_rejected() {
    assert!(CursorParams::from_tokens(Some("%%%"), None).is_err());
    assert!(CursorParams::from_tokens(None, Some("bm90IGpzb24")).is_err());

    let token = FeedCursor::new(at(42)).encode();
    let params = CursorParams::from_tokens(None, Some(&token)).expect("valid token");
    assert_eq!(params, CursorParams::older_than(at(42)));
}
