//! Resource registry — welcome, manifest, and spiral state as UTF-8 text

use sovereign_core::{Error, ResourceDescriptor, Result};
use sovereign_stack::Stack;
use std::sync::Arc;

pub const WELCOME_URI: &str = "sovereign://welcome";
pub const MANIFEST_URI: &str = "sovereign://manifest";
pub const SPIRAL_STATE_URI: &str = "sovereign://spiral/state";

pub struct ResourceRegistry {
    stack: Arc<Stack>,
}

impl ResourceRegistry {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    pub fn list(&self) -> Vec<ResourceDescriptor> {
        vec![
            ResourceDescriptor {
                uri: WELCOME_URI.to_string(),
                name: "Welcome & Recent Wisdom".to_string(),
                description: "Recent insights digest and orientation".to_string(),
                mime_type: "text/plain".to_string(),
            },
            ResourceDescriptor {
                uri: MANIFEST_URI.to_string(),
                name: "Architecture Manifest".to_string(),
                description: "System architecture and component health".to_string(),
                mime_type: "text/plain".to_string(),
            },
            ResourceDescriptor {
                uri: SPIRAL_STATE_URI.to_string(),
                name: "Spiral State".to_string(),
                description: "Current session snapshot".to_string(),
                mime_type: "application/json".to_string(),
            },
        ]
    }

    pub async fn read(&self, uri: &str) -> Result<String> {
        // the scheme prefix is optional: "welcome" == "sovereign://welcome"
        let bare = uri.strip_prefix("sovereign://").unwrap_or(uri);
        match bare {
            "welcome" => self.welcome().await,
            "manifest" => self.manifest().await,
            "spiral/state" => self.spiral_state().await,
            _ => Err(Error::not_found(format!("unknown resource: {}", uri))),
        }
    }

    async fn welcome(&self) -> Result<String> {
        let digest = self.stack.chronicle().wisdom_digest(12)?;
        Ok(format!(
            "SOVEREIGN STACK\n\
             \n\
             A local persistence and governance server. Structured memory\n\
             accumulates across sessions; bulk actions pass through a\n\
             detection, simulation, and deliberation circuit first.\n\
             \n\
             === RECENT WISDOM ===\n\
             \n\
             {}\n\
             \n\
             ---\n\
             Path is model. Storage is inference. Glob is query.\n",
            serde_json::to_string_pretty(&digest)?
        ))
    }

    async fn manifest(&self) -> Result<String> {
        let state = self.stack.current_session_state().await?;
        let audit_ok = !self.stack.governance().audit().is_quarantined();
        let stats = self.stack.compaction().get_stats()?;
        Ok(format!(
            "SOVEREIGN STACK MANIFEST\n\
             \n\
             Architecture:\n\
             - Coherence: schema-driven filesystem routing\n\
             - Chronicle: layered experiential memory (ground truth / hypothesis / open thread)\n\
             - Governance: detect -> simulate -> deliberate -> audit\n\
             - Spiral: nine-phase per-session state machine\n\
             - Compaction: rolling buffer of {} session summaries\n\
             \n\
             Root: {}\n\
             \n\
             Current state:\n\
             - Spiral phase: {} ({})\n\
             - Reflection depth: {}\n\
             - Tool calls witnessed: {}\n\
             - Audit chain: {}\n\
             - Compaction buffer: {}\n",
            sovereign_stack::compaction::CAPACITY,
            self.stack.ctx().root().display(),
            state.phase.number(),
            state.phase.name(),
            state.reflection_depth,
            state.tool_call_count,
            if audit_ok { "intact" } else { "QUARANTINED" },
            stats.capacity,
        ))
    }

    async fn spiral_state(&self) -> Result<String> {
        let state = self.stack.current_session_state().await?;
        Ok(serde_json::to_string_pretty(&state.summary())?)
    }
}
