//! Chronicle tools — insights, learnings, open threads, inheritance

use crate::registry::{Tool, ToolResult};
use crate::tools::{limit_arg, opt_f64, opt_str, required_str};
use serde_json::{json, Value};
use sovereign_core::{InheritancePolicy, Result};
use sovereign_stack::chronicle::Layer;
use sovereign_stack::Stack;
use std::sync::Arc;

pub struct RecordInsightTool {
    stack: Arc<Stack>,
}

impl RecordInsightTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    async fn run(&self, args: &Value) -> Result<Value> {
        let domain = required_str(args, "domain")?;
        let content = required_str(args, "content")?;
        let intensity = opt_f64(args, "intensity")?.unwrap_or(0.5);
        let layer = Layer::parse(required_str(args, "layer")?)?;
        let confidence = opt_f64(args, "confidence")?;
        let session_id = self.stack.current_session_id().await;

        let id = self.stack.chronicle().record_insight(
            domain, content, intensity, layer, confidence, &session_id,
        )?;
        Ok(json!({ "id": id, "layer": layer.as_str() }))
    }
}

#[async_trait::async_trait]
impl Tool for RecordInsightTool {
    fn name(&self) -> &str {
        "record_insight"
    }

    fn description(&self) -> &str {
        "Record an insight to the chronicle. A hypothesis must carry a \
         confidence in [0,1]; ground truth must not."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "domain": { "type": "string", "description": "Knowledge domain" },
                "content": { "type": "string", "description": "Insight content" },
                "intensity": { "type": "number", "default": 0.5 },
                "layer": {
                    "type": "string",
                    "enum": ["ground_truth", "hypothesis", "open_thread"]
                },
                "confidence": {
                    "type": "number",
                    "description": "Required when layer=hypothesis, forbidden otherwise"
                }
            },
            "required": ["domain", "content", "layer"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        ToolResult::from_result(self.run(&args).await)
    }
}

pub struct RecallInsightsTool {
    stack: Arc<Stack>,
}

impl RecallInsightsTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    fn run(&self, args: &Value) -> Result<Value> {
        let domain = opt_str(args, "domain");
        let layer = match opt_str(args, "layer") {
            Some(l) => Some(Layer::parse(l)?),
            None => None,
        };
        let limit = limit_arg(args, "limit", 10);
        let insights = self.stack.chronicle().recall_insights(domain, layer, limit)?;
        Ok(json!({ "count": insights.len(), "insights": insights }))
    }
}

#[async_trait::async_trait]
impl Tool for RecallInsightsTool {
    fn name(&self) -> &str {
        "recall_insights"
    }

    fn description(&self) -> &str {
        "Recall insights from the chronicle, newest first. Omit domain or \
         layer to search across all of them."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "domain": { "type": "string" },
                "layer": {
                    "type": "string",
                    "enum": ["ground_truth", "hypothesis", "open_thread"]
                },
                "limit": { "type": "integer", "default": 10 }
            }
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        ToolResult::from_result(self.run(&args))
    }
}

pub struct RecordLearningTool {
    stack: Arc<Stack>,
}

impl RecordLearningTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    async fn run(&self, args: &Value) -> Result<Value> {
        let what_happened = required_str(args, "what_happened")?;
        let what_learned = required_str(args, "what_learned")?;
        let applies_to = opt_str(args, "applies_to").unwrap_or("general");
        let session_id = self.stack.current_session_id().await;
        let id = self
            .stack
            .chronicle()
            .record_learning(what_happened, what_learned, applies_to, &session_id)?;
        Ok(json!({ "id": id }))
    }
}

#[async_trait::async_trait]
impl Tool for RecordLearningTool {
    fn name(&self) -> &str {
        "record_learning"
    }

    fn description(&self) -> &str {
        "Record a learning from experience: what happened, what was learned, \
         and where it applies."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "what_happened": { "type": "string" },
                "what_learned": { "type": "string" },
                "applies_to": { "type": "string", "default": "general" }
            },
            "required": ["what_happened", "what_learned"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        ToolResult::from_result(self.run(&args).await)
    }
}

pub struct CheckMistakesTool {
    stack: Arc<Stack>,
}

impl CheckMistakesTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    fn run(&self, args: &Value) -> Result<Value> {
        let context = required_str(args, "context")?;
        let limit = limit_arg(args, "limit", 5);
        let learnings = self.stack.chronicle().check_mistakes(context, limit)?;
        Ok(json!({ "count": learnings.len(), "learnings": learnings }))
    }
}

#[async_trait::async_trait]
impl Tool for CheckMistakesTool {
    fn name(&self) -> &str {
        "check_mistakes"
    }

    fn description(&self) -> &str {
        "Check for past learnings relevant to the current context, scored by \
         token overlap."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "context": { "type": "string", "description": "Current context to match" },
                "limit": { "type": "integer", "default": 5 }
            },
            "required": ["context"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        ToolResult::from_result(self.run(&args))
    }
}

pub struct RecordOpenThreadTool {
    stack: Arc<Stack>,
}

impl RecordOpenThreadTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    async fn run(&self, args: &Value) -> Result<Value> {
        let question = required_str(args, "question")?;
        let context = opt_str(args, "context").unwrap_or("");
        let domain = opt_str(args, "domain").unwrap_or("general");
        let session_id = self.stack.current_session_id().await;
        let id = self
            .stack
            .chronicle()
            .record_open_thread(question, context, domain, &session_id)?;
        Ok(json!({ "id": id }))
    }
}

#[async_trait::async_trait]
impl Tool for RecordOpenThreadTool {
    fn name(&self) -> &str {
        "record_open_thread"
    }

    fn description(&self) -> &str {
        "Record an unresolved question for a later session to explore. Pass \
         the question, not the conclusion."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "question": { "type": "string" },
                "context": { "type": "string", "default": "" },
                "domain": { "type": "string", "default": "general" }
            },
            "required": ["question"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        ToolResult::from_result(self.run(&args).await)
    }
}

pub struct ResolveThreadTool {
    stack: Arc<Stack>,
}

impl ResolveThreadTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    async fn run(&self, args: &Value) -> Result<Value> {
        let domain = required_str(args, "domain")?;
        let fragment = required_str(args, "question_fragment")?;
        let resolution = opt_str(args, "resolution").unwrap_or("");
        let session_id = self.stack.current_session_id().await;
        let (thread_id, insight_id) =
            self.stack
                .chronicle()
                .resolve_thread(domain, fragment, resolution, &session_id)?;
        Ok(json!({
            "thread_id": thread_id,
            "insight_id": insight_id,
            "resolved": true,
        }))
    }
}

#[async_trait::async_trait]
impl Tool for ResolveThreadTool {
    fn name(&self) -> &str {
        "resolve_thread"
    }

    fn description(&self) -> &str {
        "Resolve an open thread. The thread is rewritten in place and the \
         resolution becomes a ground-truth insight."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "domain": { "type": "string" },
                "question_fragment": {
                    "type": "string",
                    "description": "Partial match against the original question"
                },
                "resolution": { "type": "string", "default": "" }
            },
            "required": ["domain", "question_fragment"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        ToolResult::from_result(self.run(&args).await)
    }
}

pub struct GetOpenThreadsTool {
    stack: Arc<Stack>,
}

impl GetOpenThreadsTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    fn run(&self, args: &Value) -> Result<Value> {
        let domain = opt_str(args, "domain");
        let limit = limit_arg(args, "limit", 10);
        let threads = self.stack.chronicle().get_open_threads(domain, limit)?;
        Ok(json!({ "count": threads.len(), "threads": threads }))
    }
}

#[async_trait::async_trait]
impl Tool for GetOpenThreadsTool {
    fn name(&self) -> &str {
        "get_open_threads"
    }

    fn description(&self) -> &str {
        "List unresolved open threads, newest first."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "domain": { "type": "string" },
                "limit": { "type": "integer", "default": 10 }
            }
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        ToolResult::from_result(self.run(&args))
    }
}

pub struct GetInheritableContextTool {
    stack: Arc<Stack>,
}

impl GetInheritableContextTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    fn run(&self, args: &Value) -> Result<Value> {
        let policy = InheritancePolicy {
            limit: limit_arg(args, "limit", self.stack.inheritance_policy().limit),
        };
        let package = self.stack.chronicle().get_inheritable_context(&policy)?;
        Ok(serde_json::to_value(package)?)
    }
}

#[async_trait::async_trait]
impl Tool for GetInheritableContextTool {
    fn name(&self) -> &str {
        "get_inheritable_context"
    }

    fn description(&self) -> &str {
        "Assemble the porous inheritance package: ground truth verbatim, \
         hypotheses as flagged offers, open threads as invitations."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "limit": { "type": "integer", "default": 20 }
            }
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        ToolResult::from_result(self.run(&args))
    }
}
