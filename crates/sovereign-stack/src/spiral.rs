//! Spiral State Machine — nine-phase per-session cognitive flow
//!
//! Phases advance monotonically with two exceptions: a deliberate reset to
//! phase 1 on inherit, and a return from 9 (Coherence Check) to 7
//! (Meta-Reflection) when a new reflection is recorded post-coherence.
//! Sessions are persisted after every mutation via atomic rewrite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sovereign_core::{Error, Result, RootContext, SessionKey};
use std::path::PathBuf;
use std::sync::Arc;

use crate::store::{self, FileLocks};

/// The nine spiral phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Phase {
    Initialization = 1,
    FirstOrderObservation = 2,
    RecursiveIntegration = 3,
    CounterPerspectives = 4,
    ActionSynthesis = 5,
    Execution = 6,
    MetaReflection = 7,
    Integration = 8,
    CoherenceCheck = 9,
}

impl Phase {
    pub fn number(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            Phase::Initialization => "Initialization",
            Phase::FirstOrderObservation => "First-Order Observation",
            Phase::RecursiveIntegration => "Recursive Integration",
            Phase::CounterPerspectives => "Counter-Perspectives",
            Phase::ActionSynthesis => "Action Synthesis",
            Phase::Execution => "Execution",
            Phase::MetaReflection => "Meta-Reflection",
            Phase::Integration => "Integration",
            Phase::CoherenceCheck => "Coherence Check",
        }
    }

    /// One step forward, saturating at Coherence Check.
    pub fn advance(self) -> Phase {
        Phase::try_from(self.number().saturating_add(1).min(9)).unwrap_or(Phase::CoherenceCheck)
    }
}

impl TryFrom<u8> for Phase {
    type Error = String;

    fn try_from(n: u8) -> std::result::Result<Self, Self::Error> {
        Ok(match n {
            1 => Phase::Initialization,
            2 => Phase::FirstOrderObservation,
            3 => Phase::RecursiveIntegration,
            4 => Phase::CounterPerspectives,
            5 => Phase::ActionSynthesis,
            6 => Phase::Execution,
            7 => Phase::MetaReflection,
            8 => Phase::Integration,
            9 => Phase::CoherenceCheck,
            other => return Err(format!("phase out of range: {}", other)),
        })
    }
}

impl From<Phase> for u8 {
    fn from(p: Phase) -> u8 {
        p.number()
    }
}

/// One recorded transition (or in-place reflection).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transition {
    pub timestamp: DateTime<Utc>,
    pub from_phase: Phase,
    pub to_phase: Phase,
    pub observation: String,
    pub reflection_depth: u32,
}

/// Persisted per-session cognitive state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpiralState {
    pub session_id: String,
    pub phase: Phase,
    pub reflection_depth: u32,
    pub transitions: Vec<Transition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inherited_from: Option<String>,
    pub tool_call_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SpiralState {
    pub fn new(session_id: String, inherited_from: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            phase: Phase::Initialization,
            reflection_depth: 0,
            transitions: Vec::new(),
            inherited_from,
            tool_call_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Record an observation: depth increases, and the phase may move.
    /// From Coherence Check a reflection drops back to Meta-Reflection;
    /// otherwise every second reflection advances one phase, saturating.
    pub fn reflect(&mut self, observation: &str) {
        let from = self.phase;
        self.reflection_depth += 1;
        if self.phase == Phase::CoherenceCheck {
            self.phase = Phase::MetaReflection;
        } else if self.reflection_depth % 2 == 0 {
            self.phase = self.phase.advance();
        }
        self.transitions.push(Transition {
            timestamp: Utc::now(),
            from_phase: from,
            to_phase: self.phase,
            observation: observation.to_string(),
            reflection_depth: self.reflection_depth,
        });
        self.updated_at = Utc::now();
    }

    /// Human-readable snapshot for the status tool and the state resource.
    pub fn summary(&self) -> serde_json::Value {
        let recent: Vec<String> = self
            .transitions
            .iter()
            .rev()
            .take(3)
            .rev()
            .map(|t| format!("{} -> {}", t.from_phase.name(), t.to_phase.name()))
            .collect();
        serde_json::json!({
            "session_id": self.session_id,
            "phase": self.phase.number(),
            "phase_name": self.phase.name(),
            "reflection_depth": self.reflection_depth,
            "tool_call_count": self.tool_call_count,
            "inherited_from": self.inherited_from,
            "transition_count": self.transitions.len(),
            "recent_transitions": recent,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }
}

/// Persistence layer for spiral sessions. Each session file is a singleton
/// guarded by the keyed lock for the duration of a read-modify-write.
pub struct SpiralStore {
    ctx: RootContext,
    locks: Arc<FileLocks>,
}

impl SpiralStore {
    pub fn new(ctx: RootContext, locks: Arc<FileLocks>) -> Self {
        Self { ctx, locks }
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        self.ctx.spiral_dir().join(format!("{}.json", session_id))
    }

    pub fn load(&self, session_id: &str) -> Result<SpiralState> {
        store::read_json(&self.session_path(session_id))
    }

    pub async fn save(&self, state: &SpiralState) -> Result<()> {
        let path = self.session_path(&state.session_id);
        let _guard = self.locks.acquire(&path).await;
        store::write_json_atomic(&path, state)
    }

    /// Start a fresh session, persist it, and return its state.
    pub async fn create(&self, inherited_from: Option<String>) -> Result<SpiralState> {
        let state = SpiralState::new(SessionKey::mint().as_str().to_string(), inherited_from);
        self.save(&state).await?;
        Ok(state)
    }

    /// Apply `mutate` to a session under its lock and persist the result.
    pub async fn update<F>(&self, session_id: &str, mutate: F) -> Result<SpiralState>
    where
        F: FnOnce(&mut SpiralState),
    {
        let path = self.session_path(session_id);
        let _guard = self.locks.acquire(&path).await;
        let mut state: SpiralState = store::read_json(&path)?;
        mutate(&mut state);
        state.updated_at = Utc::now();
        store::write_json_atomic(&path, &state)?;
        Ok(state)
    }

    /// The most recently updated session on disk, if any.
    pub fn latest_session(&self) -> Option<SpiralState> {
        store::list_json_files(&self.ctx.spiral_dir())
            .into_iter()
            .filter_map(|f| store::read_json::<SpiralState>(&f).ok())
            .max_by_key(|s| s.updated_at)
    }

    /// Resolve the inheritance source: the named session, or the most
    /// recent one when omitted.
    pub fn resolve_source(&self, session_id: Option<&str>) -> Result<SpiralState> {
        match session_id {
            Some(id) => self.load(id),
            None => self
                .latest_session()
                .ok_or_else(|| Error::not_found("no prior spiral session to inherit from")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phases_saturate_at_nine() {
        assert_eq!(Phase::Integration.advance(), Phase::CoherenceCheck);
        assert_eq!(Phase::CoherenceCheck.advance(), Phase::CoherenceCheck);
    }

    #[test]
    fn reflect_advances_every_second_observation() {
        let mut state = SpiralState::new("s".into(), None);
        state.reflect("first");
        assert_eq!(state.phase, Phase::Initialization);
        state.reflect("second");
        assert_eq!(state.phase, Phase::FirstOrderObservation);
        assert_eq!(state.transitions.len(), 2);
    }

    #[test]
    fn coherence_check_drops_to_meta_reflection() {
        let mut state = SpiralState::new("s".into(), None);
        state.phase = Phase::CoherenceCheck;
        state.reflect("post-coherence thought");
        assert_eq!(state.phase, Phase::MetaReflection);
    }

    #[test]
    fn phase_never_decreases_otherwise() {
        let mut state = SpiralState::new("s".into(), None);
        let mut prev = state.phase;
        for i in 0..40 {
            state.reflect(&format!("obs {}", i));
            if prev != Phase::CoherenceCheck {
                assert!(state.phase >= prev);
            }
            prev = state.phase;
        }
    }
}
