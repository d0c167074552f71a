//! Seven items published through fan-out, read back across the cache seam.

mod support;

use std::sync::Arc;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use murmur::application::fanout::FanoutDispatcher;
use murmur::application::pagination::CursorParams;
use murmur::cache::MemoryStore;
use murmur::domain::entities::FeedEntryRecord;

use support::{MemoryFeedEntries, QueuedJobs, feed_service};

const OWNER: i64 = 5;

fn ids(rows: &[FeedEntryRecord]) -> Vec<i64> {
    rows.iter().map(|row| row.item_id).collect()
}

fn fallbacks(snapshotter: &Snapshotter) -> u64 {
    snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .filter(|(key, _, _, _)| key.key().name() == "murmur_feed_pagination_fallback_total")
        .map(|(_, _, _, value)| match value {
            DebugValue::Counter(count) => count,
            _ => 0,
        })
        .sum()
}

fn older_than(page_cursor: Option<murmur::application::pagination::FeedCursor>) -> CursorParams {
    let token = page_cursor.expect("another page").encode();
    CursorParams::from_tokens(None, Some(&token)).expect("cursor decodes")
}

#[tokio::test]
async fn published_items_page_across_the_cached_window() {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder
        .install()
        .expect("debug metrics recorder should install in this test process");

    let entries = Arc::new(MemoryFeedEntries::new());
    let jobs = Arc::new(QueuedJobs::new());
    let feed = feed_service(entries.clone(), Arc::new(MemoryStore::new()), 3, 5);
    let dispatcher = FanoutDispatcher::new(entries.clone(), feed.clone(), jobs);

    for item in 1..=7 {
        dispatcher
            .dispatch_fanout(item, OWNER)
            .await
            .expect("dispatch");
    }

    let cached = feed.load_cached_sequence(OWNER).await.expect("load");
    assert_eq!(ids(&cached), vec![7, 6, 5, 4, 3]);

    let first = feed
        .list_feed(OWNER, CursorParams::newest())
        .await
        .expect("first page");
    assert_eq!(ids(&first.results), vec![7, 6, 5]);
    assert!(first.has_next_page);
    assert_eq!(fallbacks(&snapshotter), 0);

    let reads_before_seam = entries.reads();
    let seam = feed
        .list_feed(OWNER, older_than(first.next_cursor()))
        .await
        .expect("seam page");
    assert_eq!(ids(&seam.results), vec![4, 3, 2]);
    assert!(seam.has_next_page);
    assert!(entries.reads() > reads_before_seam, "seam page reads the store");
    assert!(fallbacks(&snapshotter) >= 1);

    let last = feed
        .list_feed(OWNER, older_than(seam.next_cursor()))
        .await
        .expect("last page");
    assert_eq!(ids(&last.results), vec![1]);
    assert!(!last.has_next_page);
}
