//! Compaction Memory — bounded FIFO ring of session summaries
//!
//! Capacity is exactly three. The buffer is one JSON document rewritten
//! atomically under the keyed lock; `compaction_number` is strictly
//! increasing across the life of the buffer, surviving evictions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sovereign_core::{Result, RootContext};
use std::path::PathBuf;
use std::sync::Arc;

use crate::store::{self, FileLocks};

pub const CAPACITY: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionSummary {
    pub timestamp: DateTime<Utc>,
    pub summary_text: String,
    pub session_id: String,
    pub compaction_number: u64,
    pub key_points: Vec<String>,
    pub active_tasks: Vec<String>,
    pub recent_breakthroughs: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct BufferDoc {
    summaries: Vec<CompactionSummary>,
    #[serde(default)]
    last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionStats {
    pub capacity: String,
    pub total_compactions: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_timestamp: Option<DateTime<Utc>>,
}

pub struct CompactionMemory {
    ctx: RootContext,
    locks: Arc<FileLocks>,
}

impl CompactionMemory {
    pub fn new(ctx: RootContext, locks: Arc<FileLocks>) -> Self {
        Self { ctx, locks }
    }

    fn buffer_path(&self) -> PathBuf {
        self.ctx.compaction_dir().join("buffer.json")
    }

    fn load(&self) -> Result<BufferDoc> {
        match store::read_json::<BufferDoc>(&self.buffer_path()) {
            Ok(doc) => Ok(doc),
            Err(e) if e.kind() == "not_found" => Ok(BufferDoc::default()),
            Err(e) => Err(e),
        }
    }

    /// Append a summary, evicting the oldest entry when the ring is full.
    pub async fn store(
        &self,
        summary_text: &str,
        session_id: &str,
        key_points: Vec<String>,
        active_tasks: Vec<String>,
        recent_breakthroughs: Vec<String>,
    ) -> Result<CompactionSummary> {
        let path = self.buffer_path();
        let _guard = self.locks.acquire(&path).await;

        let mut doc = self.load()?;
        let compaction_number = doc
            .summaries
            .last()
            .map(|s| s.compaction_number + 1)
            .unwrap_or(1);

        let summary = CompactionSummary {
            timestamp: Utc::now(),
            summary_text: summary_text.to_string(),
            session_id: session_id.to_string(),
            compaction_number,
            key_points,
            active_tasks,
            recent_breakthroughs,
        };

        if doc.summaries.len() >= CAPACITY {
            doc.summaries.remove(0);
        }
        doc.summaries.push(summary.clone());
        doc.last_updated = Some(Utc::now());
        store::write_json_atomic(&path, &doc)?;
        Ok(summary)
    }

    /// All buffered summaries, oldest first.
    pub fn summaries(&self) -> Result<Vec<CompactionSummary>> {
        Ok(self.load()?.summaries)
    }

    /// Formatted recap for the external agent to read after a compaction.
    /// Entries are rendered in chronological order, oldest first.
    pub fn get_context(&self) -> Result<String> {
        let summaries = self.summaries()?;
        if summaries.is_empty() {
            return Ok("No compaction history available.".to_string());
        }

        let mut lines = vec![
            "# Compaction Memory - Recent Context".to_string(),
            String::new(),
            format!("Buffer holds {} recent compaction(s)", summaries.len()),
        ];
        for summary in &summaries {
            lines.push(String::new());
            lines.push(format!("## Compaction #{}", summary.compaction_number));
            lines.push(format!("Time: {}", summary.timestamp.to_rfc3339()));
            lines.push(format!("Session: {}", summary.session_id));
            push_section(&mut lines, "Key Points", &summary.key_points);
            push_section(&mut lines, "Active Tasks", &summary.active_tasks);
            push_section(&mut lines, "Recent Breakthroughs", &summary.recent_breakthroughs);
            lines.push(String::new());
            lines.push("Summary:".to_string());
            lines.push(summary.summary_text.clone());
        }
        Ok(lines.join("\n"))
    }

    pub fn get_stats(&self) -> Result<CompactionStats> {
        let summaries = self.summaries()?;
        Ok(CompactionStats {
            capacity: format!("{}/{}", summaries.len(), CAPACITY),
            total_compactions: summaries.last().map(|s| s.compaction_number).unwrap_or(0),
            oldest_timestamp: summaries.first().map(|s| s.timestamp),
            newest_timestamp: summaries.last().map(|s| s.timestamp),
        })
    }
}

fn push_section(lines: &mut Vec<String>, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    lines.push(String::new());
    lines.push(format!("{}:", title));
    for item in items {
        lines.push(format!("- {}", item));
    }
}
