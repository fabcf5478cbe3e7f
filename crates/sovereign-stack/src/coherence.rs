//! Coherence Engine — schema-driven semantic routing
//!
//! A schema is an ordered sequence of path segments: literal text,
//! `{key}` substitutions, or the computed group `decile(key)`. Routing a
//! packet through a schema is deterministic; the same (schema, packet)
//! always lands on the same path under `memory/`.
//!
//! Three modes:
//! - `transmit` — packet → path (write-time routing)
//! - `receive`  — constraints → glob (read-time tuning)
//! - `derive`   — path corpus → schema (recover latent structure)

use serde_json::{Map, Value};
use sovereign_core::{Error, Result, RootContext};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::store;

/// Default routing schema for agent experience packets.
pub const DEFAULT_SCHEMA: &str =
    "outcome={outcome}/tool_family={tool_family}/decile(step)/{step}.json";

/// Canonical key name assigned to numeric positions that correlate with a
/// decile bracket during `derive`.
const DECILE_KEY: &str = "step";

/// One path segment of a schema.
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Fixed text, e.g. `intake`.
    Literal(String),
    /// Text with `{key}` substitutions, e.g. `outcome={outcome}`.
    Template(String),
    /// Computed decile bucket of a numeric key, e.g. `decile(step)` → `0-9`.
    Decile(String),
}

/// An ordered path template. Parse once, route many times.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    segments: Vec<Segment>,
}

impl Schema {
    pub fn parse(template: &str) -> Result<Self> {
        let template = template.trim().trim_matches('/');
        if template.is_empty() {
            return Err(Error::invalid_input("empty schema template"));
        }
        let mut segments = Vec::new();
        for part in template.split('/') {
            if part.is_empty() {
                return Err(Error::invalid_input("schema contains an empty segment"));
            }
            if let Some(key) = part
                .strip_prefix("decile(")
                .and_then(|rest| rest.strip_suffix(')'))
            {
                if !is_identifier(key) {
                    return Err(Error::invalid_input(format!(
                        "invalid decile key: {:?}",
                        key
                    )));
                }
                segments.push(Segment::Decile(key.to_string()));
            } else if part.contains('{') || part.contains('}') {
                for key in template_keys(part) {
                    if !is_identifier(&key) {
                        return Err(Error::invalid_input(format!(
                            "invalid substitution key: {:?}",
                            key
                        )));
                    }
                }
                if part.matches('{').count() != part.matches('}').count() {
                    return Err(Error::invalid_input(format!(
                        "unbalanced braces in segment: {:?}",
                        part
                    )));
                }
                segments.push(Segment::Template(part.to_string()));
            } else {
                segments.push(Segment::Literal(part.to_string()));
            }
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Every `{key}` and `decile(key)` the schema references.
    pub fn referenced_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(_) => {}
                Segment::Template(t) => keys.extend(template_keys(t)),
                Segment::Decile(k) => keys.push(k.clone()),
            }
        }
        keys.dedup();
        keys
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .segments
            .iter()
            .map(|seg| match seg {
                Segment::Literal(lit) => lit.clone(),
                Segment::Template(tpl) => tpl.clone(),
                Segment::Decile(key) => format!("decile({})", key),
            })
            .collect();
        write!(f, "{}", parts.join("/"))
    }
}

/// The routing engine. Holds the root and the default schema.
pub struct Coherence {
    ctx: RootContext,
    default_schema: Schema,
}

impl Coherence {
    pub fn new(ctx: RootContext) -> Self {
        let default_schema = Schema::parse(DEFAULT_SCHEMA).expect("default schema parses");
        Self {
            ctx,
            default_schema,
        }
    }

    pub fn default_schema(&self) -> &Schema {
        &self.default_schema
    }

    /// Route `packet` through `schema` to its destination path. With
    /// `dry_run=false` the packet is persisted as JSON at that path,
    /// overwriting atomically if the target exists.
    pub fn transmit(
        &self,
        packet: &Map<String, Value>,
        schema: &Schema,
        dry_run: bool,
    ) -> Result<PathBuf> {
        validate_packet(packet)?;

        let mut rendered = Vec::with_capacity(schema.segments.len());
        for seg in &schema.segments {
            let text = match seg {
                Segment::Literal(lit) => lit.clone(),
                Segment::Template(tpl) => render_template(tpl, packet)?,
                Segment::Decile(key) => decile_bucket(packet, key)?,
            };
            check_segment(&text)?;
            rendered.push(text);
        }

        let mut path = self.ctx.memory_dir();
        for seg in &rendered {
            path.push(seg);
        }

        if !dry_run {
            store::write_json_atomic(&path, packet).map_err(|e| match e {
                // keep structured kinds; redact the target from internals
                Error::Internal { .. } => {
                    tracing::warn!(
                        "transmit write failed for {}",
                        self.ctx.redact(&path)
                    );
                    e
                }
                other => other,
            })?;
        }

        Ok(path)
    }

    /// Produce a glob from partial constraints: known positions are
    /// substituted, unknown positions become `*`.
    pub fn receive(&self, constraints: &Map<String, Value>, schema: &Schema) -> Result<String> {
        validate_packet(constraints)?;

        let mut parts = vec![self.ctx.memory_dir().to_string_lossy().to_string()];
        for seg in &schema.segments {
            let text = match seg {
                Segment::Literal(lit) => lit.clone(),
                Segment::Template(tpl) => {
                    if template_keys(tpl)
                        .iter()
                        .all(|k| constraints.contains_key(k))
                    {
                        render_template(tpl, constraints)?
                    } else {
                        "*".to_string()
                    }
                }
                Segment::Decile(key) => {
                    if constraints.contains_key(key) {
                        decile_bucket(constraints, key)?
                    } else {
                        "*".to_string()
                    }
                }
            };
            parts.push(text);
        }
        Ok(parts.join("/"))
    }

    /// Recover a schema from a corpus of paths produced by `transmit`.
    ///
    /// Position classification, most specific first: a single observed
    /// value becomes a literal; a decile-shaped column becomes a computed
    /// group; a `key=value` column becomes that key's substitution;
    /// anything else becomes a numbered substitution. Numeric columns
    /// bracketed by a decile column share the canonical decile key.
    pub fn derive(&self, paths: &[String]) -> Result<Schema> {
        if paths.is_empty() {
            return Err(Error::invalid_input("derive requires at least one path"));
        }

        let root_prefix = self.ctx.memory_dir().to_string_lossy().to_string();
        let split: Vec<Vec<String>> = paths
            .iter()
            .map(|p| {
                let trimmed = p
                    .strip_prefix(&root_prefix)
                    .unwrap_or(p)
                    .trim_matches('/');
                trimmed.split('/').map(|s| s.to_string()).collect()
            })
            .collect();

        let width = split.iter().map(|s| s.len()).max().unwrap_or(0);
        if width == 0 || split.iter().any(|s| s.len() != width) {
            return Err(Error::invalid_input(
                "derive requires paths with a uniform segment count",
            ));
        }

        // First pass: find decile columns so numeric columns can be named.
        let decile_cols: Vec<bool> = (0..width)
            .map(|i| split.iter().all(|row| parse_decile(&row[i]).is_some()))
            .collect();

        let mut segments = Vec::with_capacity(width);
        let mut anon = 0usize;
        for i in 0..width {
            let column: Vec<&str> = split.iter().map(|row| row[i].as_str()).collect();

            // literal beats group beats substitution
            if column.iter().all(|v| *v == column[0]) {
                segments.push(Segment::Literal(column[0].to_string()));
                continue;
            }

            if decile_cols[i] {
                segments.push(Segment::Decile(DECILE_KEY.to_string()));
                continue;
            }

            // key=value column with a stable key
            if let Some(key) = common_kv_key(&column) {
                segments.push(Segment::Template(format!("{}={{{}}}", key, key)));
                continue;
            }

            // numeric column correlated with a decile bracket shares its key
            let stems: Vec<&str> = column
                .iter()
                .map(|v| v.strip_suffix(".json").unwrap_or(v))
                .collect();
            let numeric = stems.iter().all(|s| s.parse::<i64>().is_ok());
            let has_ext = column.iter().all(|v| v.ends_with(".json"));
            if numeric && decile_cols.iter().any(|d| *d) {
                let tpl = if has_ext {
                    format!("{{{}}}.json", DECILE_KEY)
                } else {
                    format!("{{{}}}", DECILE_KEY)
                };
                segments.push(Segment::Template(tpl));
                continue;
            }

            // fallback: anonymous substitution
            let tpl = if has_ext {
                format!("{{key{}}}.json", anon)
            } else {
                format!("{{key{}}}", anon)
            };
            anon += 1;
            segments.push(Segment::Template(tpl));
        }

        Ok(Schema { segments })
    }
}

// ---------------------------------------------------------------------------
// Rendering helpers
// ---------------------------------------------------------------------------

fn validate_packet(packet: &Map<String, Value>) -> Result<()> {
    for (key, value) in packet {
        match value {
            Value::String(_) | Value::Number(_) | Value::Bool(_) => {}
            _ => {
                return Err(Error::invalid_input(format!(
                    "packet value for {:?} must be a scalar",
                    key
                )));
            }
        }
    }
    Ok(())
}

fn render_template(tpl: &str, packet: &Map<String, Value>) -> Result<String> {
    let mut out = String::new();
    let mut rest = tpl;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let close = rest[open..]
            .find('}')
            .ok_or_else(|| Error::invalid_input("unbalanced braces in schema segment"))?
            + open;
        let key = &rest[open + 1..close];
        let value = packet.get(key).ok_or_else(|| {
            Error::invalid_input(format!("schema references missing packet key: {}", key))
        })?;
        out.push_str(&sanitize(&scalar_to_string(value)));
        rest = &rest[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn decile_bucket(packet: &Map<String, Value>, key: &str) -> Result<String> {
    let value = packet.get(key).ok_or_else(|| {
        Error::invalid_input(format!("schema references missing packet key: {}", key))
    })?;
    let n = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.floor() as i64))
        .ok_or_else(|| {
            Error::invalid_input(format!("decile key {:?} must be numeric", key))
        })?;
    if n < 0 {
        return Err(Error::invalid_input(format!(
            "decile key {:?} must be non-negative",
            key
        )));
    }
    let base = (n / 10) * 10;
    Ok(format!("{}-{}", base, base + 9))
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Strip path separators, collapse whitespace, apply a conservative
/// character allowlist.
pub fn sanitize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_space = false;
    for ch in raw.chars() {
        if ch.is_whitespace() {
            if !last_was_space && !out.is_empty() {
                out.push('_');
            }
            last_was_space = true;
            continue;
        }
        last_was_space = false;
        if ch == '/' || ch == '\\' {
            continue;
        }
        if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' || ch == '.' {
            out.push(ch);
        }
    }
    out.trim_end_matches('_').to_string()
}

/// A rendered segment must be non-empty and must not reduce to a
/// parent/self reference.
fn check_segment(seg: &str) -> Result<()> {
    if seg.is_empty() || seg.chars().all(|c| c == '.') {
        return Err(Error::unsafe_path(format!(
            "segment sanitized to {:?}",
            seg
        )));
    }
    if seg.contains('/') || seg.contains('\\') {
        return Err(Error::unsafe_path(format!(
            "segment still contains a separator: {:?}",
            seg
        )));
    }
    Ok(())
}

fn template_keys(tpl: &str) -> Vec<String> {
    let mut keys = Vec::new();
    let mut rest = tpl;
    while let Some(open) = rest.find('{') {
        if let Some(close) = rest[open..].find('}') {
            keys.push(rest[open + 1..open + close].to_string());
            rest = &rest[open + close + 1..];
        } else {
            break;
        }
    }
    keys
}

fn is_identifier(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn parse_decile(s: &str) -> Option<(i64, i64)> {
    let (lo, hi) = s.split_once('-')?;
    let lo: i64 = lo.parse().ok()?;
    let hi: i64 = hi.parse().ok()?;
    (hi - lo == 9 && lo % 10 == 0).then_some((lo, hi))
}

fn common_kv_key(column: &[&str]) -> Option<String> {
    let mut keys = BTreeMap::new();
    for v in column {
        let (key, _) = v.split_once('=')?;
        *keys.entry(key.to_string()).or_insert(0usize) += 1;
    }
    (keys.len() == 1).then(|| keys.into_keys().next().unwrap())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_parses_all_segment_kinds() {
        let s = Schema::parse("intake/outcome={outcome}/decile(step)/{step}.json").unwrap();
        assert_eq!(s.segments().len(), 4);
        assert_eq!(s.segments()[0], Segment::Literal("intake".into()));
        assert_eq!(s.segments()[2], Segment::Decile("step".into()));
        assert_eq!(
            s.referenced_keys(),
            vec!["outcome".to_string(), "step".to_string()]
        );
    }

    #[test]
    fn schema_round_trips_through_display() {
        let raw = "outcome={outcome}/decile(step)/{step}.json";
        let s = Schema::parse(raw).unwrap();
        assert_eq!(s.to_string(), raw);
        assert_eq!(Schema::parse(&s.to_string()).unwrap(), s);
    }

    #[test]
    fn sanitize_strips_separators_and_collapses_whitespace() {
        assert_eq!(sanitize("web search"), "web_search");
        assert_eq!(sanitize("a/b\\c"), "abc");
        assert_eq!(sanitize("  spaced   out  "), "spaced_out");
    }

    #[test]
    fn parent_reference_is_unsafe() {
        assert!(check_segment(&sanitize("../")).is_err());
        assert!(check_segment(&sanitize("..")).is_err());
        assert!(check_segment(&sanitize("ok")).is_ok());
    }

    #[test]
    fn decile_buckets() {
        let mut m = Map::new();
        m.insert("step".into(), serde_json::json!(5));
        assert_eq!(decile_bucket(&m, "step").unwrap(), "0-9");
        m.insert("step".into(), serde_json::json!(47));
        assert_eq!(decile_bucket(&m, "step").unwrap(), "40-49");
    }
}
