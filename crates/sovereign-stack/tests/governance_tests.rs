//! Governance: detection grading, the circuit, and the audit hash chain

use sovereign_core::{DeliberationConfig, RootContext, ThresholdConfig};
use sovereign_stack::governance::audit::{AuditLog, GENESIS_HASH};
use sovereign_stack::governance::deliberate::Vote;
use sovereign_stack::governance::detector::{Detector, Metric, Severity};
use sovereign_stack::governance::Governance;
use sovereign_stack::store::FileLocks;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

fn make_files(dir: &Path, count: usize) {
    std::fs::create_dir_all(dir).unwrap();
    for i in 0..count {
        std::fs::write(dir.join(format!("record_{}.json", i)), b"{}").unwrap();
    }
}

fn small_config() -> ThresholdConfig {
    ThresholdConfig {
        file_count: 10,
        depth: 3,
        entropy: 0.95,
        growth_rate: 0,
        ..ThresholdConfig::default()
    }
}

// ===========================================================================
// Detector
// ===========================================================================

#[tokio::test]
async fn overfull_directory_trips_file_count() {
    let dir = tempfile::tempdir().unwrap();
    make_files(dir.path(), 15);

    let detector = Detector::new(small_config());
    let report = detector.scan(dir.path(), true).await;
    assert!(!report.incomplete);

    let event = report
        .events
        .iter()
        .find(|e| e.metric == Metric::FileCount)
        .expect("file_count event");
    assert_eq!(event.observed, 15.0);
    assert_eq!(event.limit, 10.0);
    assert_eq!(event.severity, Severity::Emergency); // 1.5x the cap
}

#[tokio::test]
async fn severity_ladder_grades_by_ratio() {
    let dir = tempfile::tempdir().unwrap();
    make_files(dir.path(), 11); // 1.1x → critical

    let detector = Detector::new(small_config());
    let report = detector.scan(dir.path(), true).await;
    let event = report
        .events
        .iter()
        .find(|e| e.metric == Metric::FileCount)
        .unwrap();
    assert_eq!(event.severity, Severity::Critical);
}

#[tokio::test]
async fn deep_nesting_trips_depth() {
    let dir = tempfile::tempdir().unwrap();
    let mut path = dir.path().to_path_buf();
    for i in 0..6 {
        path = path.join(format!("level{}", i));
    }
    std::fs::create_dir_all(&path).unwrap();

    let detector = Detector::new(small_config());
    let report = detector.scan(dir.path(), true).await;
    assert!(report.events.iter().any(|e| e.metric == Metric::Depth));
}

#[tokio::test]
async fn self_reference_cycle_is_detected() {
    let dir = tempfile::tempdir().unwrap();
    // a/ contains a file "b", b/ contains a file "a": a -> b -> a
    std::fs::create_dir_all(dir.path().join("a")).unwrap();
    std::fs::create_dir_all(dir.path().join("b")).unwrap();
    std::fs::write(dir.path().join("a/b.json"), b"{}").unwrap();
    std::fs::write(dir.path().join("b/a.json"), b"{}").unwrap();

    let detector = Detector::new(small_config());
    let report = detector.scan(dir.path(), true).await;
    let event = report
        .events
        .iter()
        .find(|e| e.metric == Metric::SelfReference)
        .expect("self_reference event");
    assert_eq!(event.severity, Severity::Critical);
}

#[tokio::test]
async fn expired_deadline_returns_partial_results() {
    let dir = tempfile::tempdir().unwrap();
    make_files(dir.path(), 5);

    let detector = Detector::new(small_config());
    let report = detector
        .scan_with_deadline(dir.path(), true, Instant::now())
        .await;
    assert!(report.incomplete);
}

// ===========================================================================
// Audit chain
// ===========================================================================

fn audit_log(root: &Path) -> AuditLog {
    AuditLog::new(RootContext::new(root), Arc::new(FileLocks::new()))
}

#[tokio::test]
async fn entries_chain_from_genesis() {
    let dir = tempfile::tempdir().unwrap();
    let log = audit_log(dir.path());

    let e0 = log
        .append("circuit", "intervention_approved", "x", Some("proceed"), Some("fine"))
        .await
        .unwrap();
    let e1 = log
        .append("circuit", "intervention_paused", "y", Some("pause"), None)
        .await
        .unwrap();

    assert_eq!(e0.prev_hash, GENESIS_HASH);
    assert_eq!(e1.prev_hash, e0.hash);
    assert_eq!(e0.hash.len(), 64);
    assert!(e0.hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    assert_eq!(log.verify().await.unwrap(), 2);
}

#[tokio::test]
async fn corruption_is_caught_by_the_next_append() {
    let dir = tempfile::tempdir().unwrap();
    let log = audit_log(dir.path());
    log.append("circuit", "intervention_approved", "x", Some("proceed"), Some("original"))
        .await
        .unwrap();
    log.append("circuit", "intervention_approved", "y", Some("proceed"), None)
        .await
        .unwrap();

    // tamper with the first entry's rationale on disk
    let path = dir.path().join("governance/audit.jsonl");
    let tampered = std::fs::read_to_string(&path)
        .unwrap()
        .replace("original", "rewritten");
    std::fs::write(&path, tampered).unwrap();

    // the next append recomputes the chain itself; no verify call needed
    let err = log
        .append("circuit", "intervention_approved", "z", None, None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), "chain_broken");
    assert!(log.is_quarantined());

    // quarantine persists across calls until acknowledged
    let blocked = log
        .append("circuit", "intervention_approved", "z", None, None)
        .await
        .unwrap_err();
    assert_eq!(blocked.kind(), "chain_broken");

    log.acknowledge().await.unwrap();
    assert!(!log.is_quarantined());

    // the acknowledged break stays as evidence; new entries chain past it
    log.append("circuit", "intervention_approved", "z", None, None)
        .await
        .unwrap();
    assert_eq!(log.verify().await.unwrap(), 3);
}

#[tokio::test]
async fn verify_quarantines_a_tampered_chain() {
    let dir = tempfile::tempdir().unwrap();
    let log = audit_log(dir.path());
    log.append("circuit", "intervention_approved", "x", None, Some("original"))
        .await
        .unwrap();

    let path = dir.path().join("governance/audit.jsonl");
    let tampered = std::fs::read_to_string(&path)
        .unwrap()
        .replace("original", "rewritten");
    std::fs::write(&path, tampered).unwrap();

    let err = log.verify().await.unwrap_err();
    assert_eq!(err.kind(), "chain_broken");
    assert!(log.is_quarantined());
}

#[tokio::test]
async fn acknowledge_without_quarantine_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let log = audit_log(dir.path());
    assert_eq!(log.acknowledge().await.unwrap_err().kind(), "not_found");
}

// ===========================================================================
// Circuit
// ===========================================================================

fn governance(root: &Path) -> Governance {
    Governance::new(
        RootContext::new(root),
        small_config(),
        DeliberationConfig::default(),
        Arc::new(FileLocks::new()),
    )
}

#[tokio::test]
async fn govern_runs_the_full_circuit_and_audits() {
    let root = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    make_files(target.path(), 4);

    let gov = governance(root.path());
    let decision = gov
        .govern(target.path(), Vote::Proceed, Some("cleanup approved"))
        .await
        .unwrap();

    assert_eq!(decision.deliberation.decision, Vote::Proceed);
    assert_eq!(decision.audit_entry.action, "intervention_approved");
    assert_eq!(decision.audit_entry.prev_hash, GENESIS_HASH);
    assert!(!decision.simulation.ranked.is_empty());

    // a second decision chains onto the first
    let second = gov
        .govern(target.path(), Vote::Pause, None)
        .await
        .unwrap();
    assert_eq!(second.audit_entry.prev_hash, decision.audit_entry.hash);
    assert_eq!(second.audit_entry.action, "intervention_paused");
}

#[tokio::test]
async fn ranking_prefers_reversible_scenarios() {
    let root = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    make_files(target.path(), 25); // dirty tree: restructuring scenarios move things

    let gov = governance(root.path());
    let decision = gov.govern(target.path(), Vote::Reject, None).await.unwrap();

    let ranked = &decision.simulation.ranked;
    for pair in ranked.windows(2) {
        assert!(pair[0].reversibility >= pair[1].reversibility);
    }
    // doing nothing is perfectly reversible, so it leads the ranking
    assert!((ranked[0].reversibility - 1.0).abs() < f64::EPSILON);
}

#[tokio::test]
async fn tampering_fails_the_next_govern_until_acknowledged() {
    let root = tempfile::tempdir().unwrap();
    let target = tempfile::tempdir().unwrap();
    make_files(target.path(), 2);

    let gov = governance(root.path());
    gov.govern(target.path(), Vote::Proceed, Some("seed"))
        .await
        .unwrap();

    // corrupt the recorded rationale; the very next govern must fail
    let path = root.path().join("governance/audit.jsonl");
    let tampered = std::fs::read_to_string(&path).unwrap().replace("seed", "tampered");
    std::fs::write(&path, tampered).unwrap();

    let err = gov.govern(target.path(), Vote::Proceed, None).await.unwrap_err();
    assert_eq!(err.kind(), "chain_broken");

    gov.audit().acknowledge().await.unwrap();
    gov.govern(target.path(), Vote::Proceed, None).await.unwrap();
}
