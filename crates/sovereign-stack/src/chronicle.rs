//! Experiential Chronicle — layered, append-only memory
//!
//! Three layers with distinct inheritance semantics:
//! - `ground_truth` — verifiable facts; travel fully across sessions
//! - `hypothesis`   — one session's interpretation; offered, not canon
//! - `open_thread`  — unresolved questions; invitations for the next session
//!
//! Insights are write-once. Resolving an open thread is the only operation
//! that touches two files: the thread record is rewritten in place and a
//! companion ground-truth insight is emitted citing the resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sovereign_core::{record_id, Error, InheritancePolicy, Result, RootContext};
use std::collections::HashSet;
use std::path::PathBuf;

use crate::coherence::sanitize;
use crate::store;

/// Chronicle layer — a closed set; retrieval pattern-matches over it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    GroundTruth,
    Hypothesis,
    OpenThread,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::GroundTruth => "ground_truth",
            Layer::Hypothesis => "hypothesis",
            Layer::OpenThread => "open_thread",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "ground_truth" => Ok(Layer::GroundTruth),
            "hypothesis" => Ok(Layer::Hypothesis),
            "open_thread" => Ok(Layer::OpenThread),
            other => Err(Error::invalid_input(format!("unknown layer: {:?}", other))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub domain: String,
    pub content: String,
    pub intensity: f64,
    pub layer: Layer,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Learning {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub what_happened: String,
    pub what_learned: String,
    pub applies_to: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenThread {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub question: String,
    pub context: String,
    pub domain: String,
    pub resolved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transformation {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub from_state: String,
    pub to_state: String,
    pub trigger: String,
    pub session_id: String,
}

/// A hypothesis as it travels across sessions: flagged, never canon.
#[derive(Debug, Clone, Serialize)]
pub struct OfferedHypothesis {
    #[serde(flatten)]
    pub insight: Insight,
    pub note: &'static str,
}

/// An unresolved question as it travels: an invitation, not a conclusion.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadInvitation {
    #[serde(flatten)]
    pub thread: OpenThread,
    pub note: &'static str,
}

/// The porous inheritance package. The three lists are pairwise disjoint;
/// merging layers is a contract violation.
#[derive(Debug, Clone, Serialize)]
pub struct InheritancePackage {
    pub ground_truth: Vec<Insight>,
    pub hypotheses: Vec<OfferedHypothesis>,
    pub open_threads: Vec<ThreadInvitation>,
    pub assembled_at: DateTime<Utc>,
}

pub struct Chronicle {
    ctx: RootContext,
}

impl Chronicle {
    pub fn new(ctx: RootContext) -> Self {
        Self { ctx }
    }

    fn insights_dir(&self) -> PathBuf {
        self.ctx.chronicle_dir().join("insights")
    }

    fn learnings_dir(&self) -> PathBuf {
        self.ctx.chronicle_dir().join("learnings")
    }

    fn threads_dir(&self) -> PathBuf {
        self.ctx.chronicle_dir().join("open_threads")
    }

    fn transformations_dir(&self) -> PathBuf {
        self.ctx.chronicle_dir().join("transformations")
    }

    // -----------------------------------------------------------------------
    // Insights
    // -----------------------------------------------------------------------

    /// Record an insight. A hypothesis must carry a confidence in [0,1];
    /// any other layer must not.
    pub fn record_insight(
        &self,
        domain: &str,
        content: &str,
        intensity: f64,
        layer: Layer,
        confidence: Option<f64>,
        session_id: &str,
    ) -> Result<String> {
        if !(0.0..=1.0).contains(&intensity) {
            return Err(Error::invalid_input("intensity must be in [0,1]"));
        }
        match (layer, confidence) {
            (Layer::Hypothesis, Some(c)) if (0.0..=1.0).contains(&c) => {}
            (Layer::Hypothesis, Some(_)) => {
                return Err(Error::invalid_input("confidence must be in [0,1]"));
            }
            (Layer::Hypothesis, None) => {
                return Err(Error::invalid_input(
                    "a hypothesis must carry a confidence",
                ));
            }
            (_, Some(_)) => {
                return Err(Error::invalid_input(format!(
                    "confidence is only valid on hypotheses, not {}",
                    layer.as_str()
                )));
            }
            (_, None) => {}
        }

        let domain = safe_domain(domain)?;
        let insight = Insight {
            id: record_id(),
            timestamp: Utc::now(),
            domain: domain.clone(),
            content: content.to_string(),
            intensity,
            layer,
            confidence,
            session_id: session_id.to_string(),
        };
        let path = self
            .insights_dir()
            .join(&domain)
            .join(layer.as_str())
            .join(format!("{}.json", insight.id));
        store::write_json_atomic(&path, &insight)?;
        Ok(insight.id)
    }

    /// Recall insights, newest first. `domain=None` searches all domains;
    /// `layer=None` all layers.
    pub fn recall_insights(
        &self,
        domain: Option<&str>,
        layer: Option<Layer>,
        limit: usize,
    ) -> Result<Vec<Insight>> {
        let domains: Vec<PathBuf> = match domain {
            Some(d) => vec![self.insights_dir().join(safe_domain(d)?)],
            None => subdirs(&self.insights_dir()),
        };
        let layers: Vec<&str> = match layer {
            Some(l) => vec![l.as_str()],
            None => vec!["ground_truth", "hypothesis", "open_thread"],
        };

        let mut insights = Vec::new();
        for domain_dir in &domains {
            for layer_name in &layers {
                for file in store::list_json_files(&domain_dir.join(layer_name)) {
                    // records with an ambiguous shape are excluded, not guessed at
                    if let Ok(insight) = store::read_json::<Insight>(&file) {
                        insights.push(insight);
                    }
                }
            }
        }
        insights.sort_by(|a, b| (b.timestamp, &b.id).cmp(&(a.timestamp, &a.id)));
        insights.truncate(limit);
        Ok(insights)
    }

    // -----------------------------------------------------------------------
    // Learnings
    // -----------------------------------------------------------------------

    pub fn record_learning(
        &self,
        what_happened: &str,
        what_learned: &str,
        applies_to: &str,
        session_id: &str,
    ) -> Result<String> {
        let learning = Learning {
            id: record_id(),
            timestamp: Utc::now(),
            what_happened: what_happened.to_string(),
            what_learned: what_learned.to_string(),
            applies_to: applies_to.to_string(),
            session_id: session_id.to_string(),
        };
        let path = self.learnings_dir().join(format!("{}.json", learning.id));
        store::write_json_atomic(&path, &learning)?;
        Ok(learning.id)
    }

    /// Score past learnings by token overlap with `context`; return the
    /// best matches, highest overlap first.
    pub fn check_mistakes(&self, context: &str, limit: usize) -> Result<Vec<Learning>> {
        let query: HashSet<String> = tokenize(context);
        let mut scored: Vec<(usize, Learning)> = Vec::new();
        for file in store::list_json_files(&self.learnings_dir()) {
            if let Ok(learning) = store::read_json::<Learning>(&file) {
                let mut haystack = tokenize(&learning.applies_to);
                haystack.extend(tokenize(&learning.what_happened));
                let overlap = haystack.intersection(&query).count();
                if overlap > 0 {
                    scored.push((overlap, learning));
                }
            }
        }
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.timestamp.cmp(&a.1.timestamp)));
        Ok(scored.into_iter().take(limit).map(|(_, l)| l).collect())
    }

    // -----------------------------------------------------------------------
    // Open threads
    // -----------------------------------------------------------------------

    pub fn record_open_thread(
        &self,
        question: &str,
        context: &str,
        domain: &str,
        session_id: &str,
    ) -> Result<String> {
        let domain = safe_domain(domain)?;
        let thread = OpenThread {
            id: record_id(),
            timestamp: Utc::now(),
            question: question.to_string(),
            context: context.to_string(),
            domain: domain.clone(),
            resolved: false,
            resolution: None,
            session_id: session_id.to_string(),
        };
        let path = self
            .threads_dir()
            .join(&domain)
            .join(format!("{}.json", thread.id));
        store::write_json_atomic(&path, &thread)?;
        Ok(thread.id)
    }

    /// Resolve the most recent unresolved thread in `domain` whose question
    /// contains `question_fragment`. The thread is rewritten in place and
    /// the resolution is recorded as a ground-truth insight — always, even
    /// when the resolution text is empty.
    ///
    /// Returns `(thread_id, insight_id)`.
    pub fn resolve_thread(
        &self,
        domain: &str,
        question_fragment: &str,
        resolution: &str,
        session_id: &str,
    ) -> Result<(String, String)> {
        let domain = safe_domain(domain)?;
        let fragment = question_fragment.to_lowercase();
        let dir = self.threads_dir().join(&domain);

        let mut found: Option<(PathBuf, OpenThread)> = None;
        for file in store::list_json_files(&dir) {
            if let Ok(thread) = store::read_json::<OpenThread>(&file) {
                if !thread.resolved && thread.question.to_lowercase().contains(&fragment) {
                    found = Some((file, thread));
                    break;
                }
            }
        }
        let (path, mut thread) = found.ok_or_else(|| {
            Error::not_found(format!(
                "no unresolved thread in {:?} matching {:?}",
                domain, question_fragment
            ))
        })?;

        thread.resolved = true;
        thread.resolution = Some(resolution.to_string());
        store::write_json_atomic(&path, &thread)?;

        let content = if resolution.is_empty() {
            format!("Resolved without findings: {}", thread.question)
        } else {
            format!("Resolved: {} — {}", thread.question, resolution)
        };
        let insight_id =
            self.record_insight(&domain, &content, 0.8, Layer::GroundTruth, None, session_id)?;
        Ok((thread.id, insight_id))
    }

    /// Unresolved threads, newest first.
    pub fn get_open_threads(&self, domain: Option<&str>, limit: usize) -> Result<Vec<OpenThread>> {
        let domains: Vec<PathBuf> = match domain {
            Some(d) => vec![self.threads_dir().join(safe_domain(d)?)],
            None => subdirs(&self.threads_dir()),
        };
        let mut threads = Vec::new();
        for dir in &domains {
            for file in store::list_json_files(dir) {
                if let Ok(thread) = store::read_json::<OpenThread>(&file) {
                    if !thread.resolved {
                        threads.push(thread);
                    }
                }
            }
        }
        threads.sort_by(|a, b| (b.timestamp, &b.id).cmp(&(a.timestamp, &a.id)));
        threads.truncate(limit);
        Ok(threads)
    }

    // -----------------------------------------------------------------------
    // Transformations
    // -----------------------------------------------------------------------

    pub fn record_transformation(
        &self,
        from_state: &str,
        to_state: &str,
        trigger: &str,
        session_id: &str,
    ) -> Result<String> {
        let transformation = Transformation {
            id: record_id(),
            timestamp: Utc::now(),
            from_state: from_state.to_string(),
            to_state: to_state.to_string(),
            trigger: trigger.to_string(),
            session_id: session_id.to_string(),
        };
        let path = self
            .transformations_dir()
            .join(format!("{}.json", transformation.id));
        store::write_json_atomic(&path, &transformation)?;
        Ok(transformation.id)
    }

    pub fn recent_transformations(&self, limit: usize) -> Vec<Transformation> {
        store::list_json_files(&self.transformations_dir())
            .into_iter()
            .filter_map(|f| store::read_json::<Transformation>(&f).ok())
            .take(limit)
            .collect()
    }

    pub fn recent_learnings(&self, limit: usize) -> Vec<Learning> {
        store::list_json_files(&self.learnings_dir())
            .into_iter()
            .filter_map(|f| store::read_json::<Learning>(&f).ok())
            .take(limit)
            .collect()
    }

    // -----------------------------------------------------------------------
    // Porous inheritance
    // -----------------------------------------------------------------------

    /// Assemble the package the next session inherits. Ground truth travels
    /// verbatim, hypotheses are offered with their confidence, open threads
    /// are invitations. Reflection depth and phase never transmit.
    pub fn get_inheritable_context(
        &self,
        policy: &InheritancePolicy,
    ) -> Result<InheritancePackage> {
        let ground_truth =
            self.recall_insights(None, Some(Layer::GroundTruth), policy.limit)?;
        let hypotheses = self
            .recall_insights(None, Some(Layer::Hypothesis), policy.limit)?
            .into_iter()
            .map(|insight| OfferedHypothesis {
                insight,
                note: "offered, not canon",
            })
            .collect();
        let open_threads = self
            .get_open_threads(None, policy.limit)?
            .into_iter()
            .map(|thread| ThreadInvitation {
                thread,
                note: "unresolved - discover your own answer",
            })
            .collect();
        Ok(InheritancePackage {
            ground_truth,
            hypotheses,
            open_threads,
            assembled_at: Utc::now(),
        })
    }

    /// Recent wisdom across all record families, for the welcome digest.
    pub fn wisdom_digest(&self, limit: usize) -> Result<serde_json::Value> {
        let per_family = limit.div_euclid(3).max(1);
        Ok(serde_json::json!({
            "recent_insights": self.recall_insights(None, None, per_family)?,
            "recent_learnings": self.recent_learnings(per_family),
            "recent_transformations": self.recent_transformations(per_family),
        }))
    }
}

fn safe_domain(domain: &str) -> Result<String> {
    let cleaned = sanitize(domain);
    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        return Err(Error::unsafe_path(format!(
            "domain sanitized to {:?}",
            cleaned
        )));
    }
    Ok(cleaned)
}

fn subdirs(dir: &std::path::Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir) {
        Ok(entries) => {
            let mut dirs: Vec<PathBuf> = entries
                .filter_map(|e| e.ok())
                .map(|e| e.path())
                .filter(|p| p.is_dir())
                .collect();
            dirs.sort();
            dirs
        }
        Err(_) => Vec::new(),
    }
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(|t| t.to_string())
        .collect()
}
