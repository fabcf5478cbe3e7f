//! Sovereign Stack — local persistence and governance subsystems
//!
//! Five coupled subsystems over one storage root:
//! - coherence: schema-driven semantic routing
//! - chronicle: layered experiential memory with porous inheritance
//! - governance: detect → simulate → deliberate → audit
//! - spiral: nine-phase per-session state machine
//! - compaction: bounded FIFO of session summaries

pub mod chronicle;
pub mod coherence;
pub mod compaction;
pub mod governance;
pub mod spiral;
pub mod store;

use sovereign_core::{
    DeliberationConfig, InheritancePolicy, Result, RootContext, ThresholdConfig,
};
use std::sync::Arc;
use tokio::sync::RwLock;

use chronicle::Chronicle;
use coherence::Coherence;
use compaction::CompactionMemory;
use governance::Governance;
use spiral::{SpiralStore, SpiralState};
use store::FileLocks;

/// Everything a tool handler needs, wired over one root. The only shared
/// mutable state across requests is the current spiral session pointer;
/// everything else lives on disk behind the keyed locks.
pub struct Stack {
    ctx: RootContext,
    coherence: Coherence,
    chronicle: Chronicle,
    spiral: SpiralStore,
    compaction: CompactionMemory,
    governance: Governance,
    inheritance: InheritancePolicy,
    current_session: RwLock<String>,
}

impl Stack {
    /// Open (or initialize) the stack beneath `ctx.root()` and start a
    /// fresh spiral session.
    pub async fn open(ctx: RootContext) -> Result<Arc<Self>> {
        for dir in [
            ctx.memory_dir(),
            ctx.chronicle_dir(),
            ctx.spiral_dir(),
            ctx.compaction_dir(),
            ctx.governance_dir(),
        ] {
            std::fs::create_dir_all(&dir)?;
        }

        let locks = Arc::new(FileLocks::new());
        let spiral = SpiralStore::new(ctx.clone(), locks.clone());
        let session = spiral.create(None).await?;
        tracing::info!(session = %session.session_id, root = %ctx.root().display(), "stack opened");

        Ok(Arc::new(Self {
            coherence: Coherence::new(ctx.clone()),
            chronicle: Chronicle::new(ctx.clone()),
            compaction: CompactionMemory::new(ctx.clone(), locks.clone()),
            governance: Governance::new(
                ctx.clone(),
                ThresholdConfig::default(),
                DeliberationConfig::default(),
                locks,
            ),
            inheritance: InheritancePolicy::default(),
            current_session: RwLock::new(session.session_id),
            spiral,
            ctx,
        }))
    }

    pub fn ctx(&self) -> &RootContext {
        &self.ctx
    }

    pub fn coherence(&self) -> &Coherence {
        &self.coherence
    }

    pub fn chronicle(&self) -> &Chronicle {
        &self.chronicle
    }

    pub fn spiral(&self) -> &SpiralStore {
        &self.spiral
    }

    pub fn compaction(&self) -> &CompactionMemory {
        &self.compaction
    }

    pub fn governance(&self) -> &Governance {
        &self.governance
    }

    pub fn inheritance_policy(&self) -> &InheritancePolicy {
        &self.inheritance
    }

    /// The active spiral session id. One active session per process;
    /// `spiral_inherit` replaces it.
    pub async fn current_session_id(&self) -> String {
        self.current_session.read().await.clone()
    }

    pub async fn set_current_session(&self, session_id: String) {
        *self.current_session.write().await = session_id;
    }

    pub async fn current_session_state(&self) -> Result<SpiralState> {
        let id = self.current_session_id().await;
        self.spiral.load(&id)
    }

    /// Witness a tool call on the active session. Best effort: a failed
    /// bump must not fail the tool call itself.
    pub async fn witness_tool_call(&self, tool_name: &str) {
        let id = self.current_session_id().await;
        let result = self
            .spiral
            .update(&id, |state| {
                state.tool_call_count += 1;
            })
            .await;
        if let Err(e) = result {
            tracing::debug!(tool = tool_name, "witness skipped: {}", e);
        }
    }
}
