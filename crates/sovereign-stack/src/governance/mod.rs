//! Governance Circuit — detect → simulate → deliberate → audit
//!
//! The circuit composes the detector, simulator, deliberator, and audit
//! log. The approved outcome is a data value for external callers; no
//! intervention code lives here.

pub mod audit;
pub mod deliberate;
pub mod detector;
pub mod simulator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sovereign_core::{
    DeliberationConfig, Error, Result, RootContext, ThresholdConfig,
};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::store::FileLocks;
use audit::{AuditEntry, AuditLog};
use deliberate::{DeliberationResult, StakeholderVote, Vote};
use detector::{Detector, ScanReport};
use simulator::{SimulationReport, Simulator};

/// The complete decision returned by `govern`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceDecision {
    pub target: String,
    pub detection: ScanReport,
    pub simulation: SimulationReport,
    pub deliberation: DeliberationResult,
    pub audit_entry: AuditEntry,
    pub timestamp: DateTime<Utc>,
}

pub struct Governance {
    ctx: RootContext,
    detector: Detector,
    simulator: Simulator,
    deliberation: DeliberationConfig,
    audit: AuditLog,
}

impl Governance {
    pub fn new(
        ctx: RootContext,
        thresholds: ThresholdConfig,
        deliberation: DeliberationConfig,
        locks: Arc<FileLocks>,
    ) -> Self {
        let audit = AuditLog::new(ctx.clone(), locks);
        Self {
            ctx,
            detector: Detector::new(thresholds.clone()),
            simulator: Simulator::new(thresholds),
            deliberation,
            audit,
        }
    }

    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub fn detector(&self) -> &Detector {
        &self.detector
    }

    /// Read-only threshold scan. Partial results are flagged, not fatal.
    pub async fn scan_thresholds(&self, path: &Path, recursive: bool) -> ScanReport {
        self.detector.scan(path, recursive).await
    }

    /// Run the full circuit for a proposed bulk action on `target`.
    /// Fatal conditions each carry a distinct kind: detector timeout →
    /// `Timeout`, simulator failure → its own kind, and a tampered or
    /// unacknowledged chain → `ChainBroken` (the audit append recomputes
    /// the chain before writing).
    pub async fn govern(
        &self,
        target: &Path,
        vote: Vote,
        rationale: Option<&str>,
    ) -> Result<GovernanceDecision> {
        self.audit.ensure_chain_usable()?;

        let timeout_secs = self.detector.config().scan_timeout_secs;
        let deadline = Instant::now() + Duration::from_secs(timeout_secs);

        // detect
        let detection = self
            .detector
            .scan_with_deadline(target, true, deadline)
            .await;
        if detection.incomplete {
            return Err(Error::Timeout(timeout_secs));
        }

        // simulate
        let simulation = self
            .simulator
            .evaluate(target, &detection.events, deadline)
            .map_err(|e| match e {
                Error::Timeout(_) => Error::Timeout(timeout_secs),
                other => other,
            })?;

        // deliberate
        let votes = vec![StakeholderVote {
            stakeholder_id: "operator".to_string(),
            vote,
            rationale: rationale.map(String::from),
            cited_reversibility: None,
        }];
        let deliberation = deliberate::deliberate(&simulation, votes, &self.deliberation)?;

        // audit
        let action = match deliberation.decision {
            Vote::Proceed => "intervention_approved",
            Vote::Pause => "intervention_paused",
            Vote::Reject => "intervention_rejected",
        };
        let audit_entry = self
            .audit
            .append(
                "governance_circuit",
                action,
                &self.ctx.redact(target),
                Some(deliberation.decision.as_str()),
                Some(&deliberation.rationale),
            )
            .await?;

        tracing::info!(
            target = %self.ctx.redact(target),
            decision = deliberation.decision.as_str(),
            events = detection.events.len(),
            "governance circuit complete"
        );

        Ok(GovernanceDecision {
            target: self.ctx.redact(target),
            detection,
            simulation,
            deliberation,
            audit_entry,
            timestamp: Utc::now(),
        })
    }
}
