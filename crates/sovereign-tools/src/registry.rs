//! Tool registry and trait definitions
//!
//! Each tool is a self-contained unit implementing the Tool trait over the
//! shared stack. Tools are registered in create_default_registry() in
//! lib.rs; transports never see anything else.

use serde_json::Value;
use sovereign_core::{Error, ToolDescriptor, ToolFault};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Debug)]
pub enum ToolResult {
    Text(String),
    Json(Value),
    Fault(ToolFault),
}

impl ToolResult {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn json(v: Value) -> Self {
        Self::Json(v)
    }

    pub fn fault(e: &Error) -> Self {
        Self::Fault(e.to_fault())
    }

    /// Collapse a fallible handler body into a result.
    pub fn from_result(r: sovereign_core::Result<Value>) -> Self {
        match r {
            Ok(v) => Self::Json(v),
            Err(e) => Self::fault(&e),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Fault(_))
    }

    pub fn to_content_string(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Json(v) => serde_json::to_string_pretty(v).unwrap_or_default(),
            Self::Fault(f) => format!("{}: {}", f.kind, f.message),
        }
    }

    pub fn fault_detail(&self) -> Option<&ToolFault> {
        match self {
            Self::Fault(f) => Some(f),
            _ => None,
        }
    }
}

/// The Tool trait — implement this to expose a new capability.
///
/// To add a tool: implement the trait in a file under tools/, register it
/// in create_default_registry().
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name (e.g. "route", "record_insight").
    fn name(&self) -> &str;

    /// Human-readable description sent to the client.
    fn description(&self) -> &str;

    /// JSON Schema for input parameters.
    fn input_schema(&self) -> Value;

    /// Whether this tool only reads state (no side effects).
    fn is_read_only(&self) -> bool {
        false
    }

    /// Execute the tool with the given arguments.
    async fn execute(&self, args: Value) -> ToolResult;

    /// Execute with cancellation support: race execute() against the token.
    async fn execute_cancellable(&self, args: Value, cancel: CancellationToken) -> ToolResult {
        tokio::select! {
            result = self.execute(args) => result,
            _ = cancel.cancelled() => ToolResult::text("[cancelled]"),
        }
    }

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: self.input_schema(),
        }
    }
}

pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: impl Tool + 'static) {
        let name = tool.name().to_string();
        self.tools.insert(name, Arc::new(tool));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub async fn execute(&self, name: &str, args: Value) -> ToolResult {
        match self.tools.get(name) {
            Some(tool) => tool.execute(args).await,
            None => ToolResult::Fault(ToolFault {
                kind: "not_found".to_string(),
                message: format!("tool not found: {}", name),
            }),
        }
    }

    pub async fn execute_cancellable(
        &self,
        name: &str,
        args: Value,
        cancel: CancellationToken,
    ) -> ToolResult {
        match self.tools.get(name) {
            Some(tool) => tool.execute_cancellable(args, cancel).await,
            None => ToolResult::Fault(ToolFault {
                kind: "not_found".to_string(),
                message: format!("tool not found: {}", name),
            }),
        }
    }

    /// Descriptors for the full catalog, name-sorted for a stable listing.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut defs: Vec<ToolDescriptor> =
            self.tools.values().map(|t| t.descriptor()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn list(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort();
        names
    }

    pub fn list_read_only(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .tools
            .iter()
            .filter(|(_, t)| t.is_read_only())
            .map(|(k, _)| k.as_str())
            .collect();
        names.sort();
        names
    }
}
