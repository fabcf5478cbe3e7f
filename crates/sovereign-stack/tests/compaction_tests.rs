//! Compaction buffer: FIFO of exactly three, strictly increasing numbering

use sovereign_core::RootContext;
use sovereign_stack::compaction::CompactionMemory;
use sovereign_stack::store::FileLocks;
use std::sync::Arc;

fn memory(root: &std::path::Path) -> CompactionMemory {
    CompactionMemory::new(RootContext::new(root), Arc::new(FileLocks::new()))
}

#[tokio::test]
async fn fourth_store_evicts_the_oldest() {
    let dir = tempfile::tempdir().unwrap();
    let mem = memory(dir.path());

    for label in ["S1", "S2", "S3", "S4"] {
        mem.store(label, "sess", vec![], vec![], vec![]).await.unwrap();
    }

    let summaries = mem.summaries().unwrap();
    let texts: Vec<&str> = summaries.iter().map(|s| s.summary_text.as_str()).collect();
    assert_eq!(texts, vec!["S2", "S3", "S4"]);

    let stats = mem.get_stats().unwrap();
    assert_eq!(stats.capacity, "3/3");
    assert_eq!(stats.total_compactions, 4);
}

#[tokio::test]
async fn compaction_numbers_increase_across_evictions() {
    let dir = tempfile::tempdir().unwrap();
    let mem = memory(dir.path());

    let mut last = 0;
    for i in 0..7 {
        let stored = mem
            .store(&format!("S{}", i), "sess", vec![], vec![], vec![])
            .await
            .unwrap();
        assert!(stored.compaction_number > last);
        last = stored.compaction_number;
    }
    assert_eq!(last, 7);
}

#[tokio::test]
async fn buffer_occupancy_is_min_of_stores_and_three() {
    let dir = tempfile::tempdir().unwrap();
    let mem = memory(dir.path());

    assert_eq!(mem.summaries().unwrap().len(), 0);
    mem.store("one", "sess", vec![], vec![], vec![]).await.unwrap();
    assert_eq!(mem.summaries().unwrap().len(), 1);
    mem.store("two", "sess", vec![], vec![], vec![]).await.unwrap();
    mem.store("three", "sess", vec![], vec![], vec![]).await.unwrap();
    mem.store("four", "sess", vec![], vec![], vec![]).await.unwrap();
    assert_eq!(mem.summaries().unwrap().len(), 3);
}

#[tokio::test]
async fn context_renders_in_chronological_order() {
    let dir = tempfile::tempdir().unwrap();
    let mem = memory(dir.path());

    for label in ["S1", "S2", "S3", "S4"] {
        mem.store(label, "sess", vec![], vec![], vec![]).await.unwrap();
    }

    let context = mem.get_context().unwrap();
    assert!(!context.contains("S1"), "evicted entry leaked into context");

    // oldest first: S2, then S3, then S4
    let s2 = context.find("S2").unwrap();
    let s3 = context.find("S3").unwrap();
    let s4 = context.find("S4").unwrap();
    assert!(s2 < s3 && s3 < s4, "context out of chronological order");

    // numbering survives eviction
    assert!(context.contains("Compaction #2"));
    assert!(context.contains("Compaction #4"));
}

#[tokio::test]
async fn stored_summary_is_the_latest_in_context() {
    let dir = tempfile::tempdir().unwrap();
    let mem = memory(dir.path());

    mem.store(
        "migrated the index",
        "sess-9",
        vec!["index uses the new layout".into()],
        vec!["backfill remaining shards".into()],
        vec![],
    )
    .await
    .unwrap();

    let context = mem.get_context().unwrap();
    assert!(context.contains("Compaction #1"));
    assert!(context.contains("migrated the index"));
    assert!(context.contains("index uses the new layout"));
    assert!(context.contains("backfill remaining shards"));
}

#[tokio::test]
async fn buffer_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mem = memory(dir.path());
        mem.store("persisted", "sess", vec![], vec![], vec![]).await.unwrap();
    }
    let reopened = memory(dir.path());
    let summaries = reopened.summaries().unwrap();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].summary_text, "persisted");

    // numbering continues, it does not restart
    let next = reopened
        .store("later", "sess", vec![], vec![], vec![])
        .await
        .unwrap();
    assert_eq!(next.compaction_number, 2);
}

#[tokio::test]
async fn empty_buffer_has_a_friendly_context() {
    let dir = tempfile::tempdir().unwrap();
    let mem = memory(dir.path());
    assert_eq!(mem.get_context().unwrap(), "No compaction history available.");
    let stats = mem.get_stats().unwrap();
    assert_eq!(stats.capacity, "0/3");
    assert_eq!(stats.total_compactions, 0);
}
