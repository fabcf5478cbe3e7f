//! Compaction tools — store summaries, read the recap, report stats

use crate::registry::{Tool, ToolResult};
use crate::tools::{required_str, str_list};
use serde_json::{json, Value};
use sovereign_core::Result;
use sovereign_stack::Stack;
use std::sync::Arc;

pub struct StoreCompactionSummaryTool {
    stack: Arc<Stack>,
}

impl StoreCompactionSummaryTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    async fn run(&self, args: &Value) -> Result<Value> {
        let summary_text = required_str(args, "summary_text")?;
        let session_id = match args["session_id"].as_str() {
            Some(s) => s.to_string(),
            None => self.stack.current_session_id().await,
        };
        let stored = self
            .stack
            .compaction()
            .store(
                summary_text,
                &session_id,
                str_list(args, "key_points"),
                str_list(args, "active_tasks"),
                str_list(args, "recent_breakthroughs"),
            )
            .await?;
        let stats = self.stack.compaction().get_stats()?;
        Ok(json!({
            "stored": true,
            "compaction_number": stored.compaction_number,
            "capacity": stats.capacity,
        }))
    }
}

#[async_trait::async_trait]
impl Tool for StoreCompactionSummaryTool {
    fn name(&self) -> &str {
        "store_compaction_summary"
    }

    fn description(&self) -> &str {
        "Store a session summary in the rolling buffer (capacity 3, oldest \
         evicted first)."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "summary_text": { "type": "string" },
                "session_id": { "type": "string" },
                "key_points": { "type": "array", "items": { "type": "string" } },
                "active_tasks": { "type": "array", "items": { "type": "string" } },
                "recent_breakthroughs": { "type": "array", "items": { "type": "string" } }
            },
            "required": ["summary_text"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        ToolResult::from_result(self.run(&args).await)
    }
}

pub struct GetCompactionContextTool {
    stack: Arc<Stack>,
}

impl GetCompactionContextTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }
}

#[async_trait::async_trait]
impl Tool for GetCompactionContextTool {
    fn name(&self) -> &str {
        "get_compaction_context"
    }

    fn description(&self) -> &str {
        "Formatted recap of the buffered compaction summaries, newest first."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value) -> ToolResult {
        match self.stack.compaction().get_context() {
            Ok(text) => ToolResult::text(text),
            Err(e) => ToolResult::fault(&e),
        }
    }
}

pub struct GetCompactionStatsTool {
    stack: Arc<Stack>,
}

impl GetCompactionStatsTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }
}

#[async_trait::async_trait]
impl Tool for GetCompactionStatsTool {
    fn name(&self) -> &str {
        "get_compaction_stats"
    }

    fn description(&self) -> &str {
        "Buffer occupancy and the running compaction count."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value) -> ToolResult {
        ToolResult::from_result(
            self.stack
                .compaction()
                .get_stats()
                .and_then(|s| Ok(serde_json::to_value(s)?)),
        )
    }
}
