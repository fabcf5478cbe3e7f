//! Governance tools — threshold scans, the full circuit, audit verification

use crate::registry::{Tool, ToolResult};
use crate::tools::{opt_str, required_str};
use serde_json::{json, Value};
use sovereign_core::Result;
use sovereign_stack::governance::deliberate::Vote;
use sovereign_stack::Stack;
use std::path::PathBuf;
use std::sync::Arc;

pub struct ScanThresholdsTool {
    stack: Arc<Stack>,
}

impl ScanThresholdsTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    async fn run(&self, args: &Value) -> Result<Value> {
        let path = PathBuf::from(required_str(args, "path")?);
        let recursive = args["recursive"].as_bool().unwrap_or(true);
        let report = self
            .stack
            .governance()
            .scan_thresholds(&path, recursive)
            .await;
        Ok(serde_json::to_value(report)?)
    }
}

#[async_trait::async_trait]
impl Tool for ScanThresholdsTool {
    fn name(&self) -> &str {
        "scan_thresholds"
    }

    fn description(&self) -> &str {
        "Scan a subtree for threshold violations: file count, depth, \
         filename entropy, self-reference cycles, growth rate. Read-only; \
         returns partial results flagged incomplete on timeout."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "Path to scan" },
                "recursive": { "type": "boolean", "default": true }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        ToolResult::from_result(self.run(&args).await)
    }
}

pub struct GovernTool {
    stack: Arc<Stack>,
}

impl GovernTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    async fn run(&self, args: &Value) -> Result<Value> {
        let target = PathBuf::from(required_str(args, "target")?);
        let vote = Vote::parse(opt_str(args, "vote").unwrap_or("proceed"))?;
        let rationale = opt_str(args, "rationale");
        let decision = self.stack.governance().govern(&target, vote, rationale).await?;
        Ok(serde_json::to_value(decision)?)
    }
}

#[async_trait::async_trait]
impl Tool for GovernTool {
    fn name(&self) -> &str {
        "govern"
    }

    fn description(&self) -> &str {
        "Run the full governance circuit on a target: detect, simulate, \
         deliberate, and write the chained audit entry. Returns the \
         decision; intervention itself is left to the caller."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "target": { "type": "string", "description": "Path to govern" },
                "vote": {
                    "type": "string",
                    "enum": ["proceed", "pause", "reject"],
                    "default": "proceed"
                },
                "rationale": { "type": "string" }
            },
            "required": ["target"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        ToolResult::from_result(self.run(&args).await)
    }
}

pub struct VerifyAuditTool {
    stack: Arc<Stack>,
}

impl VerifyAuditTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    async fn run(&self, args: &Value) -> Result<Value> {
        let audit = self.stack.governance().audit();
        if args["acknowledge"].as_bool().unwrap_or(false) {
            audit.acknowledge().await?;
            return Ok(json!({ "acknowledged": true }));
        }
        let verified = audit.verify().await?;
        Ok(json!({ "verified_entries": verified, "chain_intact": true }))
    }
}

#[async_trait::async_trait]
impl Tool for VerifyAuditTool {
    fn name(&self) -> &str {
        "verify_audit"
    }

    fn description(&self) -> &str {
        "Recompute the audit hash chain. A mismatch quarantines governance \
         until re-run with acknowledge=true."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "acknowledge": {
                    "type": "boolean",
                    "default": false,
                    "description": "Clear an existing quarantine instead of verifying"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        ToolResult::from_result(self.run(&args).await)
    }
}
