//! Core types shared across the Sovereign Stack

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Spiral session identifier - cheaply cloneable
#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub struct SessionKey(Arc<str>);

impl SessionKey {
    pub fn new(s: impl Into<String>) -> Self {
        Self(Arc::from(s.into()))
    }

    /// Mint a fresh session key: `spiral_<compact-utc>_<8-hex>`.
    pub fn mint() -> Self {
        let ts = chrono::Utc::now().format("%Y%m%d_%H%M%S");
        let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];
        Self::new(format!("spiral_{}_{}", ts, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SessionKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Generate a record id: monotonic timestamp prefix + random suffix.
/// Sorting ids lexicographically sorts records chronologically.
pub fn record_id() -> String {
    let ts = chrono::Utc::now().format("%Y%m%dT%H%M%S%.6f");
    let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];
    format!("{}_{}", ts, suffix)
}

/// Tool descriptor advertised through `tools/list`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: serde_json::Value,
}

/// Resource descriptor advertised through `resources/list`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}
