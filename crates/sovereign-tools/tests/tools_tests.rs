//! Tool catalog against a real stack: registration, argument validation,
//! structured error kinds through the tool surface

use serde_json::json;
use sovereign_core::RootContext;
use sovereign_stack::Stack;
use sovereign_tools::{create_default_registry, ToolRegistry};
use std::sync::Arc;

async fn test_registry() -> (tempfile::TempDir, Arc<Stack>, ToolRegistry) {
    let dir = tempfile::tempdir().unwrap();
    let stack = Stack::open(RootContext::new(dir.path())).await.unwrap();
    let registry = create_default_registry(stack.clone());
    (dir, stack, registry)
}

// ===========================================================================
// Registry
// ===========================================================================

#[tokio::test]
async fn default_registry_has_the_full_catalog() {
    let (_dir, _stack, reg) = test_registry().await;
    let names = reg.list();
    for expected in [
        "route",
        "derive",
        "scan_thresholds",
        "govern",
        "verify_audit",
        "record_insight",
        "recall_insights",
        "record_learning",
        "check_mistakes",
        "record_open_thread",
        "resolve_thread",
        "get_open_threads",
        "get_inheritable_context",
        "spiral_status",
        "spiral_reflect",
        "spiral_inherit",
        "store_compaction_summary",
        "get_compaction_context",
        "get_compaction_stats",
    ] {
        assert!(names.contains(&expected), "missing {}", expected);
    }
    assert_eq!(names.len(), 19);
}

#[tokio::test]
async fn every_tool_has_a_schema_and_description() {
    let (_dir, _stack, reg) = test_registry().await;
    for def in reg.descriptors() {
        assert!(!def.name.is_empty());
        assert!(!def.description.is_empty());
        assert!(def.input_schema.is_object(), "{} schema", def.name);
    }
}

#[tokio::test]
async fn missing_tool_reports_not_found() {
    let (_dir, _stack, reg) = test_registry().await;
    let result = reg.execute("nonexistent", json!({})).await;
    assert!(result.is_error());
    assert_eq!(result.fault_detail().unwrap().kind, "not_found");
}

#[tokio::test]
async fn read_only_tools_are_marked() {
    let (_dir, _stack, reg) = test_registry().await;
    let read_only = reg.list_read_only();
    assert!(read_only.contains(&"recall_insights"));
    assert!(read_only.contains(&"scan_thresholds"));
    assert!(!read_only.contains(&"govern"));
    assert!(!read_only.contains(&"record_insight"));
}

// ===========================================================================
// Routing tools
// ===========================================================================

#[tokio::test]
async fn route_tool_returns_the_destination() {
    let (dir, _stack, reg) = test_registry().await;
    let result = reg
        .execute(
            "route",
            json!({
                "packet": { "outcome": "success", "tool_family": "search", "step": 5 },
                "dry_run": false
            }),
        )
        .await;
    assert!(!result.is_error(), "{}", result.to_content_string());
    let content = result.to_content_string();
    assert!(content.contains("outcome=success/tool_family=search/0-9/5.json"));
    assert!(dir
        .path()
        .join("memory/outcome=success/tool_family=search/0-9/5.json")
        .exists());
}

#[tokio::test]
async fn route_tool_missing_packet_is_invalid_input() {
    let (_dir, _stack, reg) = test_registry().await;
    let result = reg.execute("route", json!({})).await;
    assert_eq!(result.fault_detail().unwrap().kind, "invalid_input");
}

#[tokio::test]
async fn route_tool_accepts_a_custom_schema() {
    let (_dir, _stack, reg) = test_registry().await;
    let result = reg
        .execute(
            "route",
            json!({
                "packet": { "kind": "trace", "step": 12 },
                "schema": "kind={kind}/decile(step)/{step}.json"
            }),
        )
        .await;
    assert!(result.to_content_string().contains("kind=trace/10-19/12.json"));
}

#[tokio::test]
async fn derive_tool_reports_the_template() {
    let (_dir, _stack, reg) = test_registry().await;
    let result = reg
        .execute(
            "derive",
            json!({ "paths": ["outcome=a/0-9/3.json", "outcome=b/10-19/12.json"] }),
        )
        .await;
    assert!(!result.is_error());
    let content = result.to_content_string();
    assert!(content.contains("outcome={outcome}"));
    assert!(content.contains("decile(step)"));
}

// ===========================================================================
// Chronicle tools
// ===========================================================================

#[tokio::test]
async fn hypothesis_without_confidence_fails_through_the_tool() {
    let (_dir, _stack, reg) = test_registry().await;
    let result = reg
        .execute(
            "record_insight",
            json!({ "domain": "d", "content": "…", "intensity": 0.8, "layer": "hypothesis" }),
        )
        .await;
    assert_eq!(result.fault_detail().unwrap().kind, "invalid_input");

    let result = reg
        .execute(
            "record_insight",
            json!({
                "domain": "d", "content": "…", "intensity": 0.8,
                "layer": "hypothesis", "confidence": 0.9
            }),
        )
        .await;
    assert!(!result.is_error());
    assert!(result.to_content_string().contains("id"));
}

#[tokio::test]
async fn record_then_recall_round_trips() {
    let (_dir, _stack, reg) = test_registry().await;
    reg.execute(
        "record_insight",
        json!({ "domain": "arch", "content": "the gateway owns the port", "layer": "ground_truth" }),
    )
    .await;

    let result = reg
        .execute("recall_insights", json!({ "domain": "arch" }))
        .await;
    assert!(result.to_content_string().contains("the gateway owns the port"));
}

#[tokio::test]
async fn thread_lifecycle_through_tools() {
    let (_dir, _stack, reg) = test_registry().await;
    reg.execute(
        "record_open_thread",
        json!({ "question": "does X scale?", "domain": "d" }),
    )
    .await;

    let open = reg.execute("get_open_threads", json!({ "domain": "d" })).await;
    assert!(open.to_content_string().contains("does X scale?"));

    let resolved = reg
        .execute(
            "resolve_thread",
            json!({ "domain": "d", "question_fragment": "scale", "resolution": "yes, tested" }),
        )
        .await;
    assert!(!resolved.is_error());

    let open_after = reg.execute("get_open_threads", json!({ "domain": "d" })).await;
    assert!(open_after.to_content_string().contains("\"count\": 0"));
}

#[tokio::test]
async fn inheritable_context_partitions_by_layer() {
    let (_dir, _stack, reg) = test_registry().await;
    reg.execute(
        "record_insight",
        json!({ "domain": "d", "content": "a fact", "layer": "ground_truth" }),
    )
    .await;
    reg.execute(
        "record_insight",
        json!({ "domain": "d", "content": "a guess", "layer": "hypothesis", "confidence": 0.3 }),
    )
    .await;

    let result = reg.execute("get_inheritable_context", json!({})).await;
    let content = result.to_content_string();
    assert!(content.contains("ground_truth"));
    assert!(content.contains("a fact"));
    assert!(content.contains("offered, not canon"));
}

// ===========================================================================
// Spiral tools
// ===========================================================================

#[tokio::test]
async fn spiral_reflect_then_status() {
    let (_dir, _stack, reg) = test_registry().await;
    let r1 = reg
        .execute("spiral_reflect", json!({ "observation": "first look" }))
        .await;
    assert!(!r1.is_error());

    let status = reg.execute("spiral_status", json!({})).await;
    let content = status.to_content_string();
    assert!(content.contains("\"reflection_depth\": 1"));
}

#[tokio::test]
async fn spiral_inherit_switches_the_active_session() {
    let (_dir, stack, reg) = test_registry().await;
    let before = stack.current_session_id().await;

    let result = reg.execute("spiral_inherit", json!({})).await;
    assert!(!result.is_error(), "{}", result.to_content_string());

    let after = stack.current_session_id().await;
    assert_ne!(before, after);
    assert!(result.to_content_string().contains(&before));
}

#[tokio::test]
async fn spiral_reflect_requires_an_observation() {
    let (_dir, _stack, reg) = test_registry().await;
    let result = reg.execute("spiral_reflect", json!({})).await;
    assert_eq!(result.fault_detail().unwrap().kind, "invalid_input");
}

// ===========================================================================
// Compaction tools
// ===========================================================================

#[tokio::test]
async fn compaction_store_then_context_and_stats() {
    let (_dir, _stack, reg) = test_registry().await;
    for label in ["S1", "S2", "S3", "S4"] {
        let r = reg
            .execute("store_compaction_summary", json!({ "summary_text": label }))
            .await;
        assert!(!r.is_error());
    }

    let context = reg.execute("get_compaction_context", json!({})).await;
    let text = context.to_content_string();
    assert!(!text.contains("S1"));
    assert!(text.contains("S2") && text.contains("S4"));

    let stats = reg.execute("get_compaction_stats", json!({})).await;
    let text = stats.to_content_string();
    assert!(text.contains("\"capacity\": \"3/3\""));
    assert!(text.contains("\"total_compactions\": 4"));
}

// ===========================================================================
// Governance tools
// ===========================================================================

#[tokio::test]
async fn scan_and_govern_through_tools() {
    let (_dir, _stack, reg) = test_registry().await;
    let target = tempfile::tempdir().unwrap();
    for i in 0..3 {
        std::fs::write(target.path().join(format!("f{}.json", i)), b"{}").unwrap();
    }

    let scan = reg
        .execute(
            "scan_thresholds",
            json!({ "path": target.path().to_string_lossy(), "recursive": true }),
        )
        .await;
    assert!(!scan.is_error());
    assert!(scan.to_content_string().contains("\"incomplete\": false"));

    let govern = reg
        .execute(
            "govern",
            json!({
                "target": target.path().to_string_lossy(),
                "vote": "proceed",
                "rationale": "small and tidy"
            }),
        )
        .await;
    assert!(!govern.is_error(), "{}", govern.to_content_string());
    assert!(govern.to_content_string().contains("intervention_approved"));
}

#[tokio::test]
async fn verify_audit_reports_chain_state() {
    let (_dir, _stack, reg) = test_registry().await;
    let result = reg.execute("verify_audit", json!({})).await;
    assert!(!result.is_error());
    assert!(result.to_content_string().contains("chain_intact"));
}
