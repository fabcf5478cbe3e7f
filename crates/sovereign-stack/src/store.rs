//! Storage primitives — atomic JSON writes, JSONL append, keyed file locks
//!
//! Three write disciplines, matching record ownership:
//! - create-new-file records (chronicle) need no locking; ids never collide
//! - routed destinations may be overwritten; last-writer-wins under the lock
//! - singleton files (compaction buffer, audit log, spiral sessions) take a
//!   keyed lock for the whole read-modify-write

use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sovereign_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Keyed advisory locks over singleton files. One mutex per canonical path,
/// held for the duration of a single read-modify-write.
#[derive(Default)]
pub struct FileLocks {
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl FileLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, path: &Path) -> Arc<Mutex<()>> {
        self.locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Acquire the lock for `path`, waiting if another writer holds it.
    pub async fn acquire(&self, path: &Path) -> OwnedMutexGuard<()> {
        self.entry(path).lock_owned().await
    }

    /// Acquire without waiting. A held lock reports `Conflict` so the
    /// caller can retry.
    pub fn try_acquire(&self, path: &Path) -> Result<OwnedMutexGuard<()>> {
        self.entry(path)
            .try_lock_owned()
            .map_err(|_| Error::conflict(format!("lock busy: {}", file_label(path))))
    }
}

/// Write `value` as pretty JSON atomically: temp file in the same
/// directory, then rename over the target. Partial writes are never
/// observable.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp = temp_sibling(path);
    let body = serde_json::to_vec_pretty(value)?;
    std::fs::write(&tmp, body)?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        Error::internal(e)
    })?;
    Ok(())
}

/// Read and validate a JSON record. Missing file → `NotFound` with only the
/// file name in the message.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::not_found(file_label(path)));
        }
        Err(e) => return Err(Error::internal(e)),
    };
    Ok(serde_json::from_slice(&bytes)?)
}

/// Append one JSON object as a line to a JSONL file.
pub fn append_jsonl<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    use std::io::Write;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    let line = serde_json::to_string(value)?;
    writeln!(f, "{}", line)?;
    f.sync_data()?;
    Ok(())
}

/// Read every line of a JSONL file as `T`. Missing file → empty.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::internal(e)),
    };
    let mut out = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        out.push(serde_json::from_str(line)?);
    }
    Ok(out)
}

/// List `*.json` files in a directory, newest id first (ids sort
/// chronologically). Missing directory → empty.
pub fn list_json_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .collect(),
        Err(_) => Vec::new(),
    };
    files.sort();
    files.reverse();
    files
}

fn temp_sibling(path: &Path) -> PathBuf {
    let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "record".into());
    path.with_file_name(format!(".{}.{}.tmp", name, suffix))
}

/// File name only — safe for caller-visible messages.
pub fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "record".into())
}
