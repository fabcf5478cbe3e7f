//! Routing tools — route packets through a schema, derive schemas from paths

use crate::registry::{Tool, ToolResult};
use serde_json::{json, Map, Value};
use sovereign_core::{Error, Result};
use sovereign_stack::coherence::Schema;
use sovereign_stack::Stack;
use std::sync::Arc;

pub struct RouteTool {
    stack: Arc<Stack>,
}

impl RouteTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    fn run(&self, args: &Value) -> Result<Value> {
        let packet = packet_arg(args, "packet")?;
        let schema = schema_arg(&self.stack, args)?;
        let dry_run = args["dry_run"].as_bool().unwrap_or(true);

        let path = self
            .stack
            .coherence()
            .transmit(&packet, &schema, dry_run)?;
        Ok(json!({
            "path": path.to_string_lossy(),
            "dry_run": dry_run,
        }))
    }
}

#[async_trait::async_trait]
impl Tool for RouteTool {
    fn name(&self) -> &str {
        "route"
    }

    fn description(&self) -> &str {
        "Route a data packet through a schema to its destination path. \
         With dry_run=false the packet is persisted as JSON at that path."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "packet": {
                    "type": "object",
                    "description": "Flat map of scalar routing attributes"
                },
                "schema": {
                    "type": "string",
                    "description": "Path template, e.g. 'outcome={outcome}/decile(step)/{step}.json' (default: the agent memory schema)"
                },
                "dry_run": { "type": "boolean", "default": true }
            },
            "required": ["packet"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        ToolResult::from_result(self.run(&args))
    }
}

pub struct DeriveTool {
    stack: Arc<Stack>,
}

impl DeriveTool {
    pub fn new(stack: Arc<Stack>) -> Self {
        Self { stack }
    }

    fn run(&self, args: &Value) -> Result<Value> {
        let paths: Vec<String> = args["paths"]
            .as_array()
            .ok_or_else(|| Error::invalid_input("missing required param: paths"))?
            .iter()
            .map(|v| {
                v.as_str()
                    .map(String::from)
                    .ok_or_else(|| Error::invalid_input("paths must be strings"))
            })
            .collect::<Result<_>>()?;

        let schema = self.stack.coherence().derive(&paths)?;
        Ok(json!({
            "template": schema.to_string(),
            "segment_count": schema.segments().len(),
            "path_count": paths.len(),
        }))
    }
}

#[async_trait::async_trait]
impl Tool for DeriveTool {
    fn name(&self) -> &str {
        "derive"
    }

    fn description(&self) -> &str {
        "Recover a routing schema from a corpus of paths: literals, computed \
         groups, and substitutions, most specific segment type first."
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Paths to analyze"
                }
            },
            "required": ["paths"]
        })
    }

    async fn execute(&self, args: Value) -> ToolResult {
        ToolResult::from_result(self.run(&args))
    }
}

fn packet_arg(args: &Value, key: &str) -> Result<Map<String, Value>> {
    args[key]
        .as_object()
        .cloned()
        .ok_or_else(|| Error::invalid_input(format!("missing required param: {}", key)))
}

fn schema_arg(stack: &Stack, args: &Value) -> Result<Schema> {
    match &args["schema"] {
        Value::Null => Ok(stack.coherence().default_schema().clone()),
        Value::String(template) => Schema::parse(template),
        Value::Object(obj) => {
            let template = obj
                .get("template")
                .and_then(|v| v.as_str())
                .ok_or_else(|| Error::invalid_input("schema object requires a template field"))?;
            Schema::parse(template)
        }
        _ => Err(Error::invalid_input(
            "schema must be a template string or an object with a template field",
        )),
    }
}
