//! Simulator — deterministic graph-based scenario evaluation
//!
//! The current subtree is modeled as a parent/child graph; each candidate
//! scenario is applied to a copy and scored. Reversibility is one minus
//! the normalized edit distance between the initial and final graphs.
//! Evaluation is fully deterministic: the same subtree and scenario set
//! always produce the same ranking.

use serde::{Deserialize, Serialize};
use sovereign_core::{Error, Result, ThresholdConfig};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::time::Instant;
use walkdir::WalkDir;

use super::detector::{Metric, Severity, ThresholdEvent};

/// Node budget for the graph model. Large subtrees are truncated; scoring
/// over the truncated model is still deterministic.
const MAX_NODES: usize = 2_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scenario {
    Reorganize,
    Defer,
    Incremental,
    Proceed,
    Reject,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::Reorganize,
        Scenario::Defer,
        Scenario::Incremental,
        Scenario::Proceed,
        Scenario::Reject,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Reorganize => "Full Reorganization",
            Scenario::Defer => "Defer Action",
            Scenario::Incremental => "Incremental Changes",
            Scenario::Proceed => "Proceed With Intervention",
            Scenario::Reject => "Reject Intervention",
        }
    }

    /// Self-reported certainty of the projection. Doing nothing is easy to
    /// predict; bulk intervention is not.
    fn confidence(&self) -> f64 {
        match self {
            Scenario::Defer => 0.9,
            Scenario::Reject => 0.9,
            Scenario::Incremental => 0.7,
            Scenario::Reorganize => 0.6,
            Scenario::Proceed => 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioOutcome {
    pub scenario: Scenario,
    pub name: String,
    pub reversibility: f64,
    pub confidence: f64,
    pub projected_violations: Vec<ThresholdEvent>,
    pub side_effects: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub target: String,
    /// Outcomes in ranked order: reversibility desc, fewer projected
    /// violations, then confidence desc.
    pub ranked: Vec<ScenarioOutcome>,
    pub node_count: usize,
    pub truncated: bool,
}

impl SimulationReport {
    pub fn best(&self) -> Option<&ScenarioOutcome> {
        self.ranked.first()
    }
}

/// Directory tree as a graph. Nodes are relative paths; edges point
/// parent → child.
#[derive(Debug, Clone, Default, PartialEq)]
struct TreeGraph {
    nodes: BTreeSet<String>,
    edges: BTreeSet<(String, String)>,
    /// Child counts per directory node, for projected metrics.
    children: BTreeMap<String, usize>,
}

impl TreeGraph {
    fn add_edge(&mut self, parent: &str, child: &str) {
        self.nodes.insert(parent.to_string());
        self.nodes.insert(child.to_string());
        if self.edges.insert((parent.to_string(), child.to_string())) {
            *self.children.entry(parent.to_string()).or_insert(0) += 1;
        }
    }

    fn remove_child(&mut self, parent: &str, child: &str) {
        if self.edges.remove(&(parent.to_string(), child.to_string())) {
            if let Some(n) = self.children.get_mut(parent) {
                *n = n.saturating_sub(1);
            }
        }
        self.nodes.remove(child);
    }

    /// 1 − normalized edit distance to `other`.
    fn reversibility_from(&self, initial: &TreeGraph) -> f64 {
        let node_changes = initial.nodes.symmetric_difference(&self.nodes).count();
        let edge_changes = initial.edges.symmetric_difference(&self.edges).count();
        let total = node_changes + edge_changes;
        let max = initial.nodes.len() + self.nodes.len() + initial.edges.len() + self.edges.len();
        if max == 0 {
            return 1.0;
        }
        (1.0 - total as f64 / max as f64).clamp(0.0, 1.0)
    }
}

pub struct Simulator {
    thresholds: ThresholdConfig,
}

impl Simulator {
    pub fn new(thresholds: ThresholdConfig) -> Self {
        Self { thresholds }
    }

    /// Evaluate all candidate scenarios for an intervention on `target`,
    /// given the detector's current events. Honors `deadline`.
    pub fn evaluate(
        &self,
        target: &Path,
        current_events: &[ThresholdEvent],
        deadline: Instant,
    ) -> Result<SimulationReport> {
        let (initial, truncated) = self.build_graph(target, deadline)?;

        let mut outcomes = Vec::with_capacity(Scenario::ALL.len());
        for scenario in Scenario::ALL {
            if Instant::now() >= deadline {
                return Err(Error::Timeout(0));
            }
            outcomes.push(self.run_scenario(scenario, &initial, current_events));
        }

        outcomes.sort_by(|a, b| {
            b.reversibility
                .partial_cmp(&a.reversibility)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.projected_violations.len().cmp(&b.projected_violations.len()))
                .then(
                    b.confidence
                        .partial_cmp(&a.confidence)
                        .unwrap_or(std::cmp::Ordering::Equal),
                )
        });

        Ok(SimulationReport {
            target: target.to_string_lossy().to_string(),
            ranked: outcomes,
            node_count: initial.nodes.len(),
            truncated,
        })
    }

    fn build_graph(&self, target: &Path, deadline: Instant) -> Result<(TreeGraph, bool)> {
        let mut graph = TreeGraph::default();
        let mut truncated = false;
        graph.nodes.insert(".".to_string());

        for entry in WalkDir::new(target).into_iter().filter_map(|e| e.ok()) {
            if Instant::now() >= deadline {
                return Err(Error::Timeout(0));
            }
            if graph.nodes.len() >= MAX_NODES {
                truncated = true;
                break;
            }
            let rel = entry
                .path()
                .strip_prefix(target)
                .unwrap_or(entry.path())
                .to_string_lossy()
                .to_string();
            if rel.is_empty() {
                continue;
            }
            let parent = Path::new(&rel)
                .parent()
                .map(|p| p.to_string_lossy().to_string())
                .filter(|p| !p.is_empty())
                .unwrap_or_else(|| ".".to_string());
            graph.add_edge(&parent, &rel);
        }
        Ok((graph, truncated))
    }

    fn run_scenario(
        &self,
        scenario: Scenario,
        initial: &TreeGraph,
        current_events: &[ThresholdEvent],
    ) -> ScenarioOutcome {
        let mut state = initial.clone();
        let mut side_effects = Vec::new();
        let cap = self.thresholds.file_count.max(1);

        match scenario {
            Scenario::Defer | Scenario::Reject => {
                // no structural change; existing violations persist
            }
            Scenario::Incremental => {
                // stage half the overflow of each overfull directory into
                // one new bucket per directory
                let overfull = self.overfull_dirs(&state, cap);
                for dir in overfull {
                    let children = self.dir_children(&state, &dir);
                    let overflow = children.len().saturating_sub(cap);
                    let staged = overflow / 2;
                    if staged == 0 {
                        continue;
                    }
                    let bucket = format!("{}/staged", dir);
                    for child in children.into_iter().take(staged) {
                        state.remove_child(&dir, &child);
                        state.add_edge(&bucket, &child);
                    }
                    state.add_edge(&dir, &bucket);
                }
                side_effects.push("partial_modification".to_string());
            }
            Scenario::Reorganize => {
                // split every overfull directory into capped buckets
                let overfull = self.overfull_dirs(&state, cap);
                for dir in overfull {
                    let children = self.dir_children(&state, &dir);
                    for (i, child) in children.iter().enumerate() {
                        let bucket = format!("{}/bucket_{}", dir, i / cap);
                        state.remove_child(&dir, child);
                        state.add_edge(&bucket, child);
                        state.add_edge(&dir, &bucket);
                    }
                }
                side_effects.push("structure_changed".to_string());
                side_effects.push("potential_path_loss".to_string());
            }
            Scenario::Proceed => {
                // carry out the intervention: prune the flagged directories
                // (event paths are absolute; graph nodes are target-relative,
                // so match on the trailing component)
                let mut pruned_any = false;
                for event in current_events {
                    let flagged: Vec<String> = state
                        .children
                        .keys()
                        .filter(|dir| {
                            event.path.ends_with(dir.as_str()) || dir.as_str() == "."
                        })
                        .cloned()
                        .collect();
                    for dir in flagged {
                        for child in self.dir_children(&state, &dir) {
                            state.remove_child(&dir, &child);
                            pruned_any = true;
                        }
                    }
                }
                if !pruned_any {
                    // nothing flagged: prune the densest directory so the
                    // projection still models a bulk action
                    if let Some((dir, _)) =
                        state.children.iter().max_by_key(|(_, &c)| c).map(|(d, c)| (d.clone(), *c))
                    {
                        for child in self.dir_children(&state, &dir) {
                            state.remove_child(&dir, &child);
                        }
                    }
                }
                side_effects.push("data_loss_risk".to_string());
                side_effects.push("requires_backup_verification".to_string());
            }
        }

        let reversibility = match scenario {
            // declining to act is trivially undoable
            Scenario::Defer | Scenario::Reject => 1.0,
            _ => state.reversibility_from(initial),
        };

        let projected_violations =
            self.project_violations(scenario, &state, current_events, cap);

        ScenarioOutcome {
            scenario,
            name: scenario.name().to_string(),
            reversibility,
            confidence: scenario.confidence(),
            projected_violations,
            side_effects,
        }
    }

    fn overfull_dirs(&self, graph: &TreeGraph, cap: usize) -> Vec<String> {
        graph
            .children
            .iter()
            .filter(|(_, &count)| count > cap)
            .map(|(dir, _)| dir.clone())
            .collect()
    }

    fn dir_children(&self, graph: &TreeGraph, dir: &str) -> Vec<String> {
        graph
            .edges
            .iter()
            .filter(|(parent, _)| parent == dir)
            .map(|(_, child)| child.clone())
            .collect()
    }

    /// Predict which threshold events would remain after the scenario.
    fn project_violations(
        &self,
        scenario: Scenario,
        state: &TreeGraph,
        current_events: &[ThresholdEvent],
        cap: usize,
    ) -> Vec<ThresholdEvent> {
        match scenario {
            // inaction keeps every current violation on the books
            Scenario::Defer | Scenario::Reject => current_events.to_vec(),
            _ => {
                let mut projected = Vec::new();
                for (dir, &count) in &state.children {
                    if count > cap {
                        projected.push(ThresholdEvent {
                            metric: Metric::FileCount,
                            path: dir.clone(),
                            observed: count as f64,
                            limit: cap as f64,
                            severity: if count as f64 / cap as f64 >= 1.5 {
                                Severity::Emergency
                            } else {
                                Severity::Critical
                            },
                            detail: Some(format!("projected after {}", scenario.name())),
                        });
                    }
                }
                // non-structural violations are untouched by restructuring
                projected.extend(
                    current_events
                        .iter()
                        .filter(|e| !matches!(e.metric, Metric::FileCount | Metric::Depth))
                        .cloned(),
                );
                projected
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_graph(files: usize) -> TreeGraph {
        let mut g = TreeGraph::default();
        for i in 0..files {
            g.add_edge(".", &format!("f{}", i));
        }
        g
    }

    #[test]
    fn unchanged_graph_is_fully_reversible() {
        let g = flat_graph(10);
        assert!((g.reversibility_from(&g) - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn heavier_edits_are_less_reversible() {
        let initial = flat_graph(20);
        let mut light = initial.clone();
        light.remove_child(".", "f0");
        let mut heavy = initial.clone();
        for i in 0..15 {
            heavy.remove_child(".", &format!("f{}", i));
        }
        assert!(light.reversibility_from(&initial) > heavy.reversibility_from(&initial));
    }
}
