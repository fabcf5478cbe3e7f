//! Threshold Detector — read-only subtree metrics
//!
//! Five metrics: per-directory file count, nesting depth, filename-token
//! entropy, self-reference cycles (name-as-pointer), and growth rate from
//! an mtime histogram. Scans yield at directory boundaries, honor a
//! wall-clock deadline, and return partial results flagged incomplete.

use serde::{Deserialize, Serialize};
use sovereign_core::ThresholdConfig;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    FileCount,
    Depth,
    Entropy,
    SelfReference,
    GrowthRate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
    Emergency,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThresholdEvent {
    pub metric: Metric,
    pub path: String,
    pub observed: f64,
    pub limit: f64,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub events: Vec<ThresholdEvent>,
    pub incomplete: bool,
    pub scanned_dirs: usize,
    pub scanned_files: usize,
}

pub struct Detector {
    config: ThresholdConfig,
}

impl Detector {
    pub fn new(config: ThresholdConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    /// Scan `root` against all configured thresholds. The scan never
    /// mutates anything; on deadline expiry it returns what it has, with
    /// `incomplete = true`.
    pub async fn scan(&self, root: &Path, recursive: bool) -> ScanReport {
        let deadline = Instant::now() + Duration::from_secs(self.config.scan_timeout_secs);
        self.scan_with_deadline(root, recursive, deadline).await
    }

    pub async fn scan_with_deadline(
        &self,
        root: &Path,
        recursive: bool,
        deadline: Instant,
    ) -> ScanReport {
        let mut report = ScanReport {
            events: Vec::new(),
            incomplete: false,
            scanned_dirs: 0,
            scanned_files: 0,
        };
        if !root.is_dir() {
            return report;
        }

        let mut queue: Vec<(PathBuf, usize)> = vec![(root.to_path_buf(), 0)];
        let mut max_depth = 0usize;
        let mut dir_names: HashMap<String, PathBuf> = HashMap::new();
        let mut pointers: Vec<(PathBuf, String)> = Vec::new();
        let mut mtimes: Vec<SystemTime> = Vec::new();

        while let Some((dir, depth)) = queue.pop() {
            if Instant::now() >= deadline {
                report.incomplete = true;
                break;
            }
            // cooperative yield so cancellation is observed promptly
            tokio::task::yield_now().await;

            let entries = match std::fs::read_dir(&dir) {
                Ok(e) => e,
                Err(_) => continue,
            };
            report.scanned_dirs += 1;
            max_depth = max_depth.max(depth);

            if let Some(name) = dir.file_name() {
                dir_names.insert(name.to_string_lossy().to_string(), dir.clone());
            }

            let mut file_names: Vec<String> = Vec::new();
            for entry in entries.filter_map(|e| e.ok()) {
                let path = entry.path();
                if path.is_dir() {
                    if recursive {
                        queue.push((path, depth + 1));
                    }
                } else {
                    report.scanned_files += 1;
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    if let Some(stem) = path.file_stem() {
                        pointers.push((dir.clone(), stem.to_string_lossy().to_string()));
                    }
                    if let Ok(meta) = entry.metadata() {
                        if let Ok(mtime) = meta.modified() {
                            mtimes.push(mtime);
                        }
                    }
                    file_names.push(name);
                }
            }

            // file_count: per-directory cap
            if self.config.file_count > 0 {
                self.grade(
                    &mut report.events,
                    Metric::FileCount,
                    &dir,
                    file_names.len() as f64,
                    self.config.file_count as f64,
                    None,
                );
            }

            // entropy: chaotic naming within one directory
            if self.config.entropy > 0.0 && file_names.len() > 1 {
                let entropy = filename_entropy(&file_names);
                self.grade(
                    &mut report.events,
                    Metric::Entropy,
                    &dir,
                    entropy,
                    self.config.entropy,
                    Some(format!("{} files", file_names.len())),
                );
            }
        }

        // depth: deepest nesting observed from the scan root
        if self.config.depth > 0 {
            self.grade(
                &mut report.events,
                Metric::Depth,
                root,
                max_depth as f64,
                self.config.depth as f64,
                None,
            );
        }

        // self_reference: any cycle in the name-as-pointer graph
        if let Some(cycle) = find_pointer_cycle(&dir_names, &pointers) {
            report.events.push(ThresholdEvent {
                metric: Metric::SelfReference,
                path: cycle.join(" -> "),
                observed: cycle.len() as f64,
                limit: 0.0,
                severity: Severity::Critical,
                detail: Some("name-as-pointer cycle".to_string()),
            });
        }

        // growth_rate: densest mtime window
        if self.config.growth_rate > 0 && !mtimes.is_empty() {
            let peak = peak_window_count(&mtimes, self.config.growth_window_secs);
            self.grade(
                &mut report.events,
                Metric::GrowthRate,
                root,
                peak as f64,
                self.config.growth_rate as f64,
                Some(format!("window {}s", self.config.growth_window_secs)),
            );
        }

        report
    }

    fn grade(
        &self,
        events: &mut Vec<ThresholdEvent>,
        metric: Metric,
        path: &Path,
        observed: f64,
        limit: f64,
        detail: Option<String>,
    ) {
        let ratio = if limit > 0.0 { observed / limit } else { 0.0 };
        let severity = if ratio >= 1.5 {
            Severity::Emergency
        } else if ratio >= 1.0 {
            Severity::Critical
        } else if ratio >= self.config.warning_ratio {
            Severity::Warning
        } else if ratio >= self.config.warning_ratio * 0.8 {
            Severity::Info
        } else {
            return;
        };
        events.push(ThresholdEvent {
            metric,
            path: path.to_string_lossy().to_string(),
            observed,
            limit,
            severity,
            detail,
        });
    }
}

/// Normalized Shannon entropy over filename tokens in one directory.
/// 1.0 means every token is unique (chaotic naming), 0.0 means one token.
fn filename_entropy(names: &[String]) -> f64 {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut total = 0usize;
    for name in names {
        for token in name
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            *counts.entry(token.to_lowercase()).or_insert(0) += 1;
            total += 1;
        }
    }
    if counts.len() <= 1 || total == 0 {
        return 0.0;
    }
    let entropy: f64 = counts
        .values()
        .map(|&c| {
            let p = c as f64 / total as f64;
            -p * p.log2()
        })
        .sum();
    let max_entropy = (counts.len() as f64).log2();
    if max_entropy > 0.0 {
        entropy / max_entropy
    } else {
        0.0
    }
}

/// Follow name-as-pointer references: a file whose stem names a scanned
/// directory points from its own directory to that one. Returns the first
/// cycle found, as directory names.
fn find_pointer_cycle(
    dir_names: &HashMap<String, PathBuf>,
    pointers: &[(PathBuf, String)],
) -> Option<Vec<String>> {
    let mut edges: HashMap<&Path, Vec<&Path>> = HashMap::new();
    for (from_dir, stem) in pointers {
        if let Some(to_dir) = dir_names.get(stem) {
            if to_dir.as_path() != from_dir.as_path() {
                edges
                    .entry(from_dir.as_path())
                    .or_default()
                    .push(to_dir.as_path());
            }
        }
    }

    fn visit<'a>(
        node: &'a Path,
        edges: &HashMap<&'a Path, Vec<&'a Path>>,
        gray: &mut Vec<&'a Path>,
        black: &mut HashSet<&'a Path>,
    ) -> Option<Vec<String>> {
        if black.contains(node) {
            return None;
        }
        if let Some(pos) = gray.iter().position(|p| *p == node) {
            let cycle: Vec<String> = gray[pos..]
                .iter()
                .chain(std::iter::once(&node))
                .map(|p| {
                    p.file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default()
                })
                .collect();
            return Some(cycle);
        }
        gray.push(node);
        for next in edges.get(node).into_iter().flatten() {
            if let Some(cycle) = visit(next, edges, gray, black) {
                return Some(cycle);
            }
        }
        gray.pop();
        black.insert(node);
        None
    }

    let mut black: HashSet<&Path> = HashSet::new();
    let starts: Vec<&Path> = edges.keys().copied().collect();
    for start in starts {
        let mut gray: Vec<&Path> = Vec::new();
        if let Some(cycle) = visit(start, &edges, &mut gray, &mut black) {
            return Some(cycle);
        }
    }
    None
}

/// Max files created within any single window of `window_secs`.
fn peak_window_count(mtimes: &[SystemTime], window_secs: u64) -> usize {
    let mut secs: Vec<u64> = mtimes
        .iter()
        .filter_map(|t| t.duration_since(SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .collect();
    secs.sort_unstable();
    let window = window_secs.max(1);
    let mut peak = 0usize;
    let mut lo = 0usize;
    for hi in 0..secs.len() {
        while secs[hi] - secs[lo] >= window {
            lo += 1;
        }
        peak = peak.max(hi - lo + 1);
    }
    peak
}
