//! Deliberator — multi-stakeholder vote aggregation with dissent preservation
//!
//! Plurality wins, with two overrides:
//! (a) a reject citing reversibility below the configured floor forces a
//!     pause — a low-reversibility objection must not be steamrolled;
//! (b) any critical projected violation on the leading scenario requires a
//!     unanimous proceed.
//! Dissenting rationales are preserved verbatim, never summarized away.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sovereign_core::{DeliberationConfig, Error, Result};

use super::detector::Severity;
use super::simulator::SimulationReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vote {
    Proceed,
    Pause,
    Reject,
}

impl Vote {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "proceed" => Ok(Vote::Proceed),
            "pause" => Ok(Vote::Pause),
            "reject" => Ok(Vote::Reject),
            other => Err(Error::invalid_input(format!("unknown vote: {:?}", other))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Vote::Proceed => "proceed",
            Vote::Pause => "pause",
            Vote::Reject => "reject",
        }
    }

    /// Tie-break order: the more cautious outcome wins a tied plurality.
    fn caution(&self) -> u8 {
        match self {
            Vote::Pause => 2,
            Vote::Reject => 1,
            Vote::Proceed => 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeholderVote {
    pub stakeholder_id: String,
    pub vote: Vote,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    /// Reversibility figure the stakeholder cites for their position.
    /// Defaults to the leading scenario's reversibility when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cited_reversibility: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DissentRecord {
    pub stakeholder_id: String,
    pub preferred: Vote,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliberationResult {
    pub decision: Vote,
    pub rationale: String,
    pub votes: Vec<StakeholderVote>,
    pub dissenting_views: Vec<DissentRecord>,
    pub overrides_applied: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate stakeholder votes against the simulation ranking.
pub fn deliberate(
    simulation: &SimulationReport,
    votes: Vec<StakeholderVote>,
    config: &DeliberationConfig,
) -> Result<DeliberationResult> {
    if votes.is_empty() {
        return Err(Error::invalid_input("cannot deliberate without votes"));
    }

    let leading_reversibility = simulation.best().map(|o| o.reversibility).unwrap_or(0.5);

    let mut counts: Vec<(Vote, usize)> = [Vote::Proceed, Vote::Pause, Vote::Reject]
        .into_iter()
        .map(|v| (v, votes.iter().filter(|sv| sv.vote == v).count()))
        .collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(b.0.caution().cmp(&a.0.caution())));
    let mut decision = counts[0].0;

    let mut overrides_applied = Vec::new();

    // (a) a low-reversibility reject forces a pause
    let blocking_reject = votes.iter().any(|sv| {
        sv.vote == Vote::Reject
            && sv.cited_reversibility.unwrap_or(leading_reversibility)
                < config.reversibility_floor
    });
    if blocking_reject && decision != Vote::Reject {
        decision = Vote::Pause;
        overrides_applied.push(format!(
            "reject citing reversibility below {:.2} forces pause",
            config.reversibility_floor
        ));
    }

    // (b) critical projected violations demand unanimity to proceed
    if decision == Vote::Proceed {
        let has_critical = simulation
            .best()
            .map(|o| {
                o.projected_violations
                    .iter()
                    .any(|e| e.severity >= Severity::Critical)
            })
            .unwrap_or(false);
        let unanimous = votes.iter().all(|sv| sv.vote == Vote::Proceed);
        if has_critical && !unanimous {
            decision = Vote::Pause;
            overrides_applied
                .push("critical projected violation without unanimous proceed".to_string());
        }
    }

    let dissenting_views: Vec<DissentRecord> = votes
        .iter()
        .filter(|sv| sv.vote != decision)
        .map(|sv| DissentRecord {
            stakeholder_id: sv.stakeholder_id.clone(),
            preferred: sv.vote,
            rationale: sv.rationale.clone(),
        })
        .collect();

    let rationale = {
        let agreeing: Vec<&str> = votes
            .iter()
            .filter(|sv| sv.vote == decision)
            .filter_map(|sv| sv.rationale.as_deref())
            .collect();
        if agreeing.is_empty() {
            if overrides_applied.is_empty() {
                "no rationale given".to_string()
            } else {
                overrides_applied.join("; ")
            }
        } else {
            agreeing.join(" | ")
        }
    };

    Ok(DeliberationResult {
        decision,
        rationale,
        votes,
        dissenting_views,
        overrides_applied,
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::governance::simulator::{Scenario, ScenarioOutcome, SimulationReport};
    use sovereign_core::DeliberationConfig;

    fn sim(reversibility: f64, critical: bool) -> SimulationReport {
        use crate::governance::detector::{Metric, Severity, ThresholdEvent};
        let violations = if critical {
            vec![ThresholdEvent {
                metric: Metric::FileCount,
                path: "x".into(),
                observed: 200.0,
                limit: 100.0,
                severity: Severity::Critical,
                detail: None,
            }]
        } else {
            vec![]
        };
        SimulationReport {
            target: "x".into(),
            ranked: vec![ScenarioOutcome {
                scenario: Scenario::Incremental,
                name: "Incremental Changes".into(),
                reversibility,
                confidence: 0.7,
                projected_violations: violations,
                side_effects: vec![],
            }],
            node_count: 1,
            truncated: false,
        }
    }

    fn vote(id: &str, v: Vote) -> StakeholderVote {
        StakeholderVote {
            stakeholder_id: id.into(),
            vote: v,
            rationale: Some(format!("{} says {}", id, v.as_str())),
            cited_reversibility: None,
        }
    }

    #[test]
    fn plurality_wins() {
        let result = deliberate(
            &sim(0.9, false),
            vec![
                vote("a", Vote::Proceed),
                vote("b", Vote::Proceed),
                vote("c", Vote::Reject),
            ],
            &DeliberationConfig::default(),
        )
        .unwrap();
        assert_eq!(result.decision, Vote::Proceed);
        assert_eq!(result.dissenting_views.len(), 1);
        assert_eq!(result.dissenting_views[0].preferred, Vote::Reject);
    }

    #[test]
    fn low_reversibility_reject_forces_pause() {
        let mut reject = vote("c", Vote::Reject);
        reject.cited_reversibility = Some(0.1);
        let result = deliberate(
            &sim(0.9, false),
            vec![vote("a", Vote::Proceed), vote("b", Vote::Proceed), reject],
            &DeliberationConfig::default(),
        )
        .unwrap();
        assert_eq!(result.decision, Vote::Pause);
        assert!(!result.overrides_applied.is_empty());
    }

    #[test]
    fn critical_violation_needs_unanimous_proceed() {
        let result = deliberate(
            &sim(0.9, true),
            vec![
                vote("a", Vote::Proceed),
                vote("b", Vote::Proceed),
                vote("c", Vote::Pause),
            ],
            &DeliberationConfig::default(),
        )
        .unwrap();
        assert_eq!(result.decision, Vote::Pause);

        let unanimous = deliberate(
            &sim(0.9, true),
            vec![vote("a", Vote::Proceed), vote("b", Vote::Proceed)],
            &DeliberationConfig::default(),
        )
        .unwrap();
        assert_eq!(unanimous.decision, Vote::Proceed);
    }

    #[test]
    fn dissent_rationale_is_verbatim() {
        let mut reject = vote("c", Vote::Reject);
        reject.rationale = Some("this exact sentence must survive".into());
        let result = deliberate(
            &sim(0.9, false),
            vec![vote("a", Vote::Proceed), vote("b", Vote::Proceed), reject],
            &DeliberationConfig::default(),
        )
        .unwrap();
        assert_eq!(
            result.dissenting_views[0].rationale.as_deref(),
            Some("this exact sentence must survive")
        );
    }

    #[test]
    fn no_votes_is_invalid() {
        let err = deliberate(&sim(0.9, false), vec![], &DeliberationConfig::default()).unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }
}
