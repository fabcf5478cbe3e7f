//! Sovereign Tools — the MCP tool catalog over the stack
//!
//! Each tool is a self-contained unit in src/tools/.
//! To add a tool: implement the Tool trait, register it in
//! create_default_registry below. Transports only ever see the registry.

pub mod registry;
pub mod tools;

pub use registry::{Tool, ToolRegistry, ToolResult};

use sovereign_stack::Stack;
use std::sync::Arc;

/// Create the default tool registry binding the full catalog to `stack`.
pub fn create_default_registry(stack: Arc<Stack>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();

    // --- routing ---
    registry.register(tools::routing::RouteTool::new(stack.clone()));
    registry.register(tools::routing::DeriveTool::new(stack.clone()));

    // --- governance ---
    registry.register(tools::governance::ScanThresholdsTool::new(stack.clone()));
    registry.register(tools::governance::GovernTool::new(stack.clone()));
    registry.register(tools::governance::VerifyAuditTool::new(stack.clone()));

    // --- chronicle ---
    registry.register(tools::chronicle::RecordInsightTool::new(stack.clone()));
    registry.register(tools::chronicle::RecallInsightsTool::new(stack.clone()));
    registry.register(tools::chronicle::RecordLearningTool::new(stack.clone()));
    registry.register(tools::chronicle::CheckMistakesTool::new(stack.clone()));
    registry.register(tools::chronicle::RecordOpenThreadTool::new(stack.clone()));
    registry.register(tools::chronicle::ResolveThreadTool::new(stack.clone()));
    registry.register(tools::chronicle::GetOpenThreadsTool::new(stack.clone()));
    registry.register(tools::chronicle::GetInheritableContextTool::new(stack.clone()));

    // --- spiral ---
    registry.register(tools::spiral::SpiralStatusTool::new(stack.clone()));
    registry.register(tools::spiral::SpiralReflectTool::new(stack.clone()));
    registry.register(tools::spiral::SpiralInheritTool::new(stack.clone()));

    // --- compaction ---
    registry.register(tools::compaction::StoreCompactionSummaryTool::new(
        stack.clone(),
    ));
    registry.register(tools::compaction::GetCompactionContextTool::new(
        stack.clone(),
    ));
    registry.register(tools::compaction::GetCompactionStatsTool::new(stack));

    registry
}
