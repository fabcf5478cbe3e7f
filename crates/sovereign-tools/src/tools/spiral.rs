//! Spiral tools — status, reflection, porous inheritance

use crate::registry::{Tool, ToolResult};
use crate::tools::{opt_str, required_str};
use serde_json::{json, Value};
use sovereign_core::Result;
use sovereign_stack::Stack;
use std::sync::Arc;

pub struct SpiralStatusTool {
    stack: Arc<Stack>,
}

impl SpiralStatusTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    async fn run(&self) -> Result<Value> {
        let state = self.stack.current_session_state().await?;
        Ok(state.summary())
    }
}

#[async_trait::async_trait]
impl Tool for SpiralStatusTool {
    fn name(&self) -> &str {
        "spiral_status"
    }

    fn description(&self) -> &str {
        "Snapshot of the current session: phase, reflection depth, and \
         recent transitions."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value) -> ToolResult {
        ToolResult::from_result(self.run().await)
    }
}

pub struct SpiralReflectTool {
    stack: Arc<Stack>,
}

impl SpiralReflectTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    async fn run(&self, args: &Value) -> Result<Value> {
        let observation = required_str(args, "observation")?.to_string();
        let session_id = self.stack.current_session_id().await;
        let state = self
            .stack
            .spiral()
            .update(&session_id, |s| s.reflect(&observation))
            .await?;
        Ok(state.summary())
    }
}

#[async_trait::async_trait]
impl Tool for SpiralReflectTool {
    fn name(&self) -> &str {
        "spiral_reflect"
    }

    fn description(&self) -> &str {
        "Record an observation: reflection deepens and the phase may \
         advance. From Coherence Check a reflection returns to \
         Meta-Reflection."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "observation": { "type": "string", "description": "What was observed" }
            },
            "required": ["observation"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        ToolResult::from_result(self.run(&args).await)
    }
}

pub struct SpiralInheritTool {
    stack: Arc<Stack>,
}

impl SpiralInheritTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    async fn run(&self, args: &Value) -> Result<Value> {
        let source = self
            .stack
            .spiral()
            .resolve_source(opt_str(args, "session_id"))?;
        let state = self
            .stack
            .spiral()
            .create(Some(source.session_id.clone()))
            .await?;
        self.stack
            .set_current_session(state.session_id.clone())
            .await;
        tracing::info!(
            from = %source.session_id,
            to = %state.session_id,
            "spiral session inherited"
        );
        Ok(state.summary())
    }
}

#[async_trait::async_trait]
impl Tool for SpiralInheritTool {
    fn name(&self) -> &str {
        "spiral_inherit"
    }

    fn description(&self) -> &str {
        "Start a new session inheriting porously from a prior one (most \
         recent if omitted). Phase resets to 1 and reflection depth does \
         not transmit; fetch carried facts with get_inheritable_context."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "session_id": {
                    "type": "string",
                    "description": "Prior session to inherit from (default: most recent)"
                }
            }
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        ToolResult::from_result(self.run(&args).await)
    }
}
