//! Configuration — storage root, gateway binding, governance policies
//!
//! No module-level singletons: a `RootContext` is constructed once and
//! passed through component constructors. Tests substitute a temp root.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Resolved storage root. Every component persists beneath it.
#[derive(Clone, Debug)]
pub struct RootContext {
    root: PathBuf,
}

impl RootContext {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve from the environment: `SOVEREIGN_ROOT`, else `~/.sovereign`.
    pub fn from_env() -> Self {
        let root = std::env::var("SOVEREIGN_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home_dir().join(".sovereign"));
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.root.join("memory")
    }

    pub fn chronicle_dir(&self) -> PathBuf {
        self.root.join("chronicle")
    }

    pub fn spiral_dir(&self) -> PathBuf {
        self.root.join("spiral")
    }

    pub fn compaction_dir(&self) -> PathBuf {
        self.root.join("compaction_memory")
    }

    pub fn governance_dir(&self) -> PathBuf {
        self.root.join("governance")
    }

    /// Strip the root prefix for caller-visible messages.
    pub fn redact(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .to_string()
    }
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Gateway configuration for the SSE transport.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub bind: BindMode,
}

fn default_port() -> u16 {
    8743
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: BindMode::default(),
        }
    }
}

/// Bind mode for the gateway
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindMode {
    #[default]
    Loopback,
    Lan,
}

impl BindMode {
    pub fn to_addr(&self) -> &str {
        match self {
            BindMode::Loopback => "127.0.0.1",
            BindMode::Lan => "0.0.0.0",
        }
    }
}

/// Caps for the threshold detector. Zero disables a metric.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ThresholdConfig {
    #[serde(default = "ThresholdConfig::default_file_count")]
    pub file_count: usize,
    #[serde(default = "ThresholdConfig::default_depth")]
    pub depth: usize,
    #[serde(default = "ThresholdConfig::default_entropy")]
    pub entropy: f64,
    #[serde(default = "ThresholdConfig::default_growth_rate")]
    pub growth_rate: usize,
    #[serde(default = "ThresholdConfig::default_growth_window_secs")]
    pub growth_window_secs: u64,
    #[serde(default = "ThresholdConfig::default_warning_ratio")]
    pub warning_ratio: f64,
    #[serde(default = "ThresholdConfig::default_scan_timeout_secs")]
    pub scan_timeout_secs: u64,
}

impl ThresholdConfig {
    fn default_file_count() -> usize {
        100
    }
    fn default_depth() -> usize {
        10
    }
    fn default_entropy() -> f64 {
        0.85
    }
    fn default_growth_rate() -> usize {
        50
    }
    fn default_growth_window_secs() -> u64 {
        60
    }
    fn default_warning_ratio() -> f64 {
        0.8
    }
    fn default_scan_timeout_secs() -> u64 {
        20
    }
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            file_count: Self::default_file_count(),
            depth: Self::default_depth(),
            entropy: Self::default_entropy(),
            growth_rate: Self::default_growth_rate(),
            growth_window_secs: Self::default_growth_window_secs(),
            warning_ratio: Self::default_warning_ratio(),
            scan_timeout_secs: Self::default_scan_timeout_secs(),
        }
    }
}

/// Deliberation policy knobs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliberationConfig {
    /// A reject citing reversibility below this floor forces a pause.
    #[serde(default = "DeliberationConfig::default_reversibility_floor")]
    pub reversibility_floor: f64,
}

impl DeliberationConfig {
    fn default_reversibility_floor() -> f64 {
        0.3
    }
}

impl Default for DeliberationConfig {
    fn default() -> Self {
        Self {
            reversibility_floor: Self::default_reversibility_floor(),
        }
    }
}

/// How much of the prior session bleeds into the next one.
/// Ground truth travels fully, hypotheses are offered but not canon,
/// reflection depth and phase do not transmit.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InheritancePolicy {
    #[serde(default = "InheritancePolicy::default_limit")]
    pub limit: usize,
}

impl InheritancePolicy {
    fn default_limit() -> usize {
        20
    }
}

impl Default for InheritancePolicy {
    fn default() -> Self {
        Self {
            limit: Self::default_limit(),
        }
    }
}

/// Default per-tool-call deadline in seconds.
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;
