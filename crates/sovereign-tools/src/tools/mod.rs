//! Tool implementations, one file per subsystem.

pub mod chronicle;
pub mod compaction;
pub mod governance;
pub mod routing;
pub mod spiral;

use serde_json::Value;
use sovereign_core::{Error, Result};

/// Required string argument.
pub(crate) fn required_str<'a>(args: &'a Value, key: &str) -> Result<&'a str> {
    args[key]
        .as_str()
        .ok_or_else(|| Error::invalid_input(format!("missing required param: {}", key)))
}

/// Optional string argument.
pub(crate) fn opt_str<'a>(args: &'a Value, key: &str) -> Option<&'a str> {
    args[key].as_str()
}

/// Optional f64 argument, present-but-wrong-type is an error.
pub(crate) fn opt_f64(args: &Value, key: &str) -> Result<Option<f64>> {
    match &args[key] {
        Value::Null => Ok(None),
        v => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| Error::invalid_input(format!("param {} must be a number", key))),
    }
}

/// Bounded usize argument with a default.
pub(crate) fn limit_arg(args: &Value, key: &str, default: usize) -> usize {
    args[key]
        .as_u64()
        .map(|n| n as usize)
        .unwrap_or(default)
        .clamp(1, 500)
}

/// Optional string-array argument.
pub(crate) fn str_list(args: &Value, key: &str) -> Vec<String> {
    args[key]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}
