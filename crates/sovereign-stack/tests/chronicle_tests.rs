//! Chronicle: layer invariants, retrieval, thread resolution, inheritance

use sovereign_core::{InheritancePolicy, RootContext};
use sovereign_stack::chronicle::{Chronicle, Layer};
use std::collections::HashSet;

fn chronicle() -> (tempfile::TempDir, Chronicle) {
    let dir = tempfile::tempdir().unwrap();
    let ctx = RootContext::new(dir.path());
    (dir, Chronicle::new(ctx))
}

#[test]
fn hypothesis_requires_confidence() {
    let (_dir, c) = chronicle();
    let err = c
        .record_insight("d", "maybe", 0.8, Layer::Hypothesis, None, "s1")
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_input");

    let id = c
        .record_insight("d", "maybe", 0.8, Layer::Hypothesis, Some(0.9), "s1")
        .unwrap();
    assert!(!id.is_empty());
}

#[test]
fn ground_truth_must_not_carry_confidence() {
    let (_dir, c) = chronicle();
    let err = c
        .record_insight("d", "fact", 0.8, Layer::GroundTruth, Some(0.9), "s1")
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_input");

    c.record_insight("d", "fact", 0.8, Layer::GroundTruth, None, "s1")
        .unwrap();
    let recalled = c.recall_insights(Some("d"), Some(Layer::GroundTruth), 10).unwrap();
    assert_eq!(recalled.len(), 1);
    assert!(recalled[0].confidence.is_none());
}

#[test]
fn confidence_out_of_range_is_rejected() {
    let (_dir, c) = chronicle();
    let err = c
        .record_insight("d", "x", 0.5, Layer::Hypothesis, Some(1.5), "s1")
        .unwrap_err();
    assert_eq!(err.kind(), "invalid_input");
}

#[test]
fn recall_is_most_recent_first_with_filters() {
    let (_dir, c) = chronicle();
    for i in 0..5 {
        c.record_insight("arch", &format!("insight {}", i), 0.5, Layer::GroundTruth, None, "s1")
            .unwrap();
    }
    c.record_insight("other", "elsewhere", 0.5, Layer::GroundTruth, None, "s1")
        .unwrap();
    c.record_insight("arch", "a guess", 0.5, Layer::Hypothesis, Some(0.4), "s1")
        .unwrap();

    let all_arch = c.recall_insights(Some("arch"), None, 10).unwrap();
    assert_eq!(all_arch.len(), 6);
    // newest first
    assert_eq!(all_arch[0].content, "a guess");

    let gt_only = c.recall_insights(Some("arch"), Some(Layer::GroundTruth), 10).unwrap();
    assert_eq!(gt_only.len(), 5);
    assert_eq!(gt_only[0].content, "insight 4");

    let limited = c.recall_insights(None, None, 3).unwrap();
    assert_eq!(limited.len(), 3);
}

#[test]
fn insights_are_append_only_on_disk() {
    let (dir, c) = chronicle();
    let id = c
        .record_insight("d", "original", 0.5, Layer::GroundTruth, None, "s1")
        .unwrap();
    let path = dir
        .path()
        .join("chronicle/insights/d/ground_truth")
        .join(format!("{}.json", id));
    assert!(path.exists());

    // a second record creates a second file, never rewrites the first
    let before = std::fs::read_to_string(&path).unwrap();
    c.record_insight("d", "another", 0.5, Layer::GroundTruth, None, "s1")
        .unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn thread_resolution_marks_and_emits_ground_truth() {
    let (_dir, c) = chronicle();
    c.record_open_thread("does X scale?", "saw contention at 10k", "d", "s1")
        .unwrap();

    let (thread_id, insight_id) = c
        .resolve_thread("d", "scale", "yes, tested", "s2")
        .unwrap();
    assert!(!thread_id.is_empty());

    // (a) thread is resolved in place
    let open = c.get_open_threads(Some("d"), 10).unwrap();
    assert!(open.is_empty());

    // (b) companion ground-truth insight references question and resolution
    let insights = c.recall_insights(Some("d"), Some(Layer::GroundTruth), 10).unwrap();
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].id, insight_id);
    assert!(insights[0].content.contains("does X scale?"));
    assert!(insights[0].content.contains("yes, tested"));
}

#[test]
fn empty_resolution_still_emits_the_companion_insight() {
    let (_dir, c) = chronicle();
    c.record_open_thread("why flaky?", "", "ops", "s1").unwrap();
    let (_, insight_id) = c.resolve_thread("ops", "flaky", "", "s1").unwrap();
    let insights = c.recall_insights(Some("ops"), Some(Layer::GroundTruth), 10).unwrap();
    assert_eq!(insights[0].id, insight_id);
    assert!(insights[0].content.contains("why flaky?"));
}

#[test]
fn resolving_a_missing_thread_is_not_found() {
    let (_dir, c) = chronicle();
    let err = c.resolve_thread("d", "nothing here", "answer", "s1").unwrap_err();
    assert_eq!(err.kind(), "not_found");
}

#[test]
fn check_mistakes_scores_by_token_overlap() {
    let (_dir, c) = chronicle();
    c.record_learning(
        "deploy failed on friday",
        "never deploy on friday",
        "deployment release",
        "s1",
    )
    .unwrap();
    c.record_learning("typo in config", "lint configs", "configuration", "s1")
        .unwrap();

    let hits = c.check_mistakes("planning a release deployment", 5).unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].what_learned, "never deploy on friday");

    let none = c.check_mistakes("completely unrelated topic", 5).unwrap();
    assert!(none.is_empty());
}

#[test]
fn inheritance_package_partition_is_disjoint_and_flagged() {
    let (_dir, c) = chronicle();
    c.record_insight("d", "fact one", 0.9, Layer::GroundTruth, None, "a").unwrap();
    c.record_insight("d", "fact two", 0.9, Layer::GroundTruth, None, "a").unwrap();
    c.record_insight("d", "a hunch", 0.6, Layer::Hypothesis, Some(0.55), "a").unwrap();
    c.record_open_thread("what about Y?", "ctx", "d", "a").unwrap();

    let package = c
        .get_inheritable_context(&InheritancePolicy { limit: 20 })
        .unwrap();
    assert_eq!(package.ground_truth.len(), 2);
    assert_eq!(package.hypotheses.len(), 1);
    assert_eq!(package.open_threads.len(), 1);

    assert_eq!(package.hypotheses[0].note, "offered, not canon");
    assert_eq!(package.hypotheses[0].insight.confidence, Some(0.55));

    let mut ids: HashSet<&str> = HashSet::new();
    for i in &package.ground_truth {
        assert!(ids.insert(&i.id));
    }
    for h in &package.hypotheses {
        assert!(ids.insert(&h.insight.id));
    }
    for t in &package.open_threads {
        assert!(ids.insert(&t.thread.id));
    }
}

#[test]
fn unsafe_domain_is_rejected() {
    let (_dir, c) = chronicle();
    let err = c
        .record_insight("../..", "x", 0.5, Layer::GroundTruth, None, "s1")
        .unwrap_err();
    assert_eq!(err.kind(), "unsafe_path");
}
