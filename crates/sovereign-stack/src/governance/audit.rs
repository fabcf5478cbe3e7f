//! Audit Log — hash-chained, append-only governance record
//!
//! One JSONL line per governance decision. Each entry's hash is
//! `sha256(prev_hash || canonical_json(entry_without_hash))` in lowercase
//! hex; the genesis entry chains from sixty-four zeros. The canonical
//! encoding is the entry body serialized with its declared field order,
//! compact separators, UTF-8 — reproducible across implementations.
//!
//! A verification mismatch quarantines the log: every further governance
//! action fails with `ChainBroken` until the operator acknowledges.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sovereign_core::{Error, Result, RootContext};
use std::path::PathBuf;
use std::sync::Arc;

use crate::store::{self, FileLocks};

pub const GENESIS_HASH: &str =
    "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub ts: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vote: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    pub prev_hash: String,
    pub hash: String,
}

/// The entry minus its own hash — exactly what gets digested. Field order
/// here IS the canonical encoding; do not reorder.
#[derive(Serialize)]
struct EntryBody<'a> {
    ts: &'a DateTime<Utc>,
    actor: &'a str,
    action: &'a str,
    target: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    vote: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rationale: Option<&'a str>,
    prev_hash: &'a str,
}

fn chain_hash(prev_hash: &str, canonical: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(canonical);
    hex::encode(hasher.finalize())
}

fn compute_hash(entry: &AuditEntry) -> Result<String> {
    let body = EntryBody {
        ts: &entry.ts,
        actor: &entry.actor,
        action: &entry.action,
        target: &entry.target,
        vote: entry.vote.as_deref(),
        rationale: entry.rationale.as_deref(),
        prev_hash: &entry.prev_hash,
    };
    let canonical = serde_json::to_vec(&body)?;
    Ok(chain_hash(&entry.prev_hash, &canonical))
}

#[derive(Debug, Serialize, Deserialize)]
struct QuarantineMarker {
    detected_at: DateTime<Utc>,
    index: usize,
    detail: String,
}

/// Written on operator acknowledgement. The broken prefix stays in the log
/// as evidence; verification resumes from here.
#[derive(Debug, Serialize, Deserialize)]
struct ChainCheckpoint {
    acknowledged_at: DateTime<Utc>,
    entries: usize,
    last_hash: String,
}

pub struct AuditLog {
    ctx: RootContext,
    locks: Arc<FileLocks>,
}

impl AuditLog {
    pub fn new(ctx: RootContext, locks: Arc<FileLocks>) -> Self {
        Self { ctx, locks }
    }

    fn log_path(&self) -> PathBuf {
        self.ctx.governance_dir().join("audit.jsonl")
    }

    fn quarantine_path(&self) -> PathBuf {
        self.ctx.governance_dir().join("chain_quarantine.json")
    }

    fn checkpoint_path(&self) -> PathBuf {
        self.ctx.governance_dir().join("chain_checkpoint.json")
    }

    /// Where verification starts: entry index and the expected prev_hash.
    fn load_checkpoint(&self) -> (usize, String) {
        match store::read_json::<ChainCheckpoint>(&self.checkpoint_path()) {
            Ok(cp) => (cp.entries, cp.last_hash),
            Err(_) => (0, GENESIS_HASH.to_string()),
        }
    }

    pub fn is_quarantined(&self) -> bool {
        self.quarantine_path().exists()
    }

    /// Fail fast when a previously detected break has not been
    /// acknowledged.
    pub fn ensure_chain_usable(&self) -> Result<()> {
        if let Ok(marker) = store::read_json::<QuarantineMarker>(&self.quarantine_path()) {
            return Err(Error::ChainBroken {
                index: marker.index,
                detail: format!("unacknowledged: {}", marker.detail),
            });
        }
        Ok(())
    }

    /// Append one chained entry. The existing chain is recomputed first, so
    /// a tampered prior entry fails the very next governance action with
    /// `ChainBroken` — no separate verify call is needed. Concurrent
    /// writers serialize on the file lock.
    pub async fn append(
        &self,
        actor: &str,
        action: &str,
        target: &str,
        vote: Option<&str>,
        rationale: Option<&str>,
    ) -> Result<AuditEntry> {
        let path = self.log_path();
        let _guard = self.locks.acquire(&path).await;
        self.ensure_chain_usable()?;

        let entries = store::read_jsonl::<AuditEntry>(&path)?;
        self.verify_entries(&entries)?;

        let prev_hash = entries
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let mut entry = AuditEntry {
            ts: Utc::now(),
            actor: actor.to_string(),
            action: action.to_string(),
            target: target.to_string(),
            vote: vote.map(String::from),
            rationale: rationale.map(String::from),
            prev_hash,
            hash: String::new(),
        };
        entry.hash = compute_hash(&entry)?;
        store::append_jsonl(&path, &entry)?;
        Ok(entry)
    }

    /// Recompute every hash in the chain. On the first mismatch the log is
    /// quarantined and `ChainBroken` is returned with the offending index.
    pub async fn verify(&self) -> Result<usize> {
        let path = self.log_path();
        let _guard = self.locks.acquire(&path).await;
        let entries = store::read_jsonl::<AuditEntry>(&path)?;
        self.verify_entries(&entries)
    }

    /// Chain recompute shared by `verify` and `append`. Starts from the
    /// acknowledged checkpoint, if any; an acknowledged break stays in the
    /// log as evidence and is not re-flagged. Caller holds the file lock.
    fn verify_entries(&self, entries: &[AuditEntry]) -> Result<usize> {
        let (start, mut expected_prev) = self.load_checkpoint();
        if entries.len() < start {
            return Err(self.quarantine(start, "log shorter than acknowledged checkpoint"));
        }
        for (index, entry) in entries.iter().enumerate().skip(start) {
            if entry.prev_hash != expected_prev {
                return Err(self.quarantine(index, "prev_hash does not chain"));
            }
            let recomputed = compute_hash(entry)?;
            if recomputed != entry.hash {
                return Err(self.quarantine(index, "entry hash mismatch"));
            }
            expected_prev = entry.hash.clone();
        }
        Ok(entries.len())
    }

    fn quarantine(&self, index: usize, detail: &str) -> Error {
        tracing::error!(index, detail, "audit chain verification failed");
        let marker = QuarantineMarker {
            detected_at: Utc::now(),
            index,
            detail: detail.to_string(),
        };
        if let Err(e) = store::write_json_atomic(&self.quarantine_path(), &marker) {
            tracing::error!("failed to write quarantine marker: {}", e);
        }
        Error::ChainBroken {
            index,
            detail: detail.to_string(),
        }
    }

    /// Operator acknowledgement: records a checkpoint at the current end of
    /// the log and clears the quarantine. The broken prefix is left
    /// untouched as evidence; later appends chain from the checkpoint.
    pub async fn acknowledge(&self) -> Result<()> {
        let path = self.log_path();
        let _guard = self.locks.acquire(&path).await;
        if !self.is_quarantined() {
            return Err(Error::not_found("no quarantine to acknowledge"));
        }
        let entries = store::read_jsonl::<AuditEntry>(&path)?;
        let checkpoint = ChainCheckpoint {
            acknowledged_at: Utc::now(),
            entries: entries.len(),
            last_hash: entries
                .last()
                .map(|e| e.hash.clone())
                .unwrap_or_else(|| GENESIS_HASH.to_string()),
        };
        store::write_json_atomic(&self.checkpoint_path(), &checkpoint)?;
        std::fs::remove_file(self.quarantine_path())?;
        tracing::warn!(
            entries = checkpoint.entries,
            "audit chain quarantine acknowledged by operator"
        );
        Ok(())
    }

    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        store::read_jsonl(&self.log_path())
    }
}
