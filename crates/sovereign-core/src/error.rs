//! Error types for the Sovereign Stack

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unsafe path segment: {0}")]
    UnsafePath(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("operation timed out after {0}s")]
    Timeout(u64),

    #[error("audit chain broken at entry {index}: {detail}")]
    ChainBroken { index: usize, detail: String },

    #[error("internal error (incident {incident_id})")]
    Internal { incident_id: String },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn unsafe_path(msg: impl Into<String>) -> Self {
        Self::UnsafePath(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Wrap an I/O or serialization fault. The detail is logged with an
    /// incident id; only the id travels to the caller.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        let incident_id = uuid::Uuid::new_v4().simple().to_string();
        tracing::error!(incident_id = %incident_id, "internal fault: {}", detail);
        Self::Internal { incident_id }
    }

    /// Stable machine-readable kind string, exposed on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::UnsafePath(_) => "unsafe_path",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Timeout(_) => "timeout",
            Self::ChainBroken { .. } => "chain_broken",
            Self::Internal { .. } => "internal",
        }
    }

    pub fn to_fault(&self) -> ToolFault {
        ToolFault {
            kind: self.kind().to_string(),
            message: self.to_string(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::internal(e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::internal(e)
    }
}

/// Structured error surfaced by every tool call: `{kind, message}`.
/// No stack traces, no absolute paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolFault {
    pub kind: String,
    pub message: String,
}
