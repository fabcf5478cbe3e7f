//! RPC router — dispatches protocol methods to the tool and resource
//! registries
//!
//! Both transports call route_rpc with the same ServerState, so the
//! catalog is identical over stdio and SSE. Every tools/call runs under
//! the per-call deadline; a structured {kind, message} fault is attached
//! as error data so clients can branch on the kind.

use serde_json::{json, Value};
use sovereign_core::{RequestId, RpcRequest, RpcResponse, DEFAULT_CALL_TIMEOUT_SECS};
use sovereign_stack::Stack;
use sovereign_tools::{ToolRegistry, ToolResult};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::resources::ResourceRegistry;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub struct ServerState {
    pub stack: Arc<Stack>,
    pub registry: ToolRegistry,
    pub resources: ResourceRegistry,
    pub started_at: Instant,
    pub call_timeout: Duration,
}

impl ServerState {
    pub fn new(stack: Arc<Stack>, registry: ToolRegistry) -> Self {
        Self {
            resources: ResourceRegistry::new(stack.clone()),
            stack,
            registry,
            started_at: Instant::now(),
            call_timeout: Duration::from_secs(DEFAULT_CALL_TIMEOUT_SECS),
        }
    }
}

/// Route one request. Notifications (no id) produce no response.
pub async fn route_rpc(req: RpcRequest, state: &ServerState) -> Option<RpcResponse> {
    if req.id.is_none() {
        // notifications/initialized and friends need no reply
        tracing::debug!(method = %req.method, "notification received");
        return None;
    }
    let id = req.id.clone();

    let response = match req.method.as_str() {
        "initialize" => handle_initialize(id),
        "ping" => RpcResponse::ok(id, json!({})),
        "tools/list" => RpcResponse::ok(
            id,
            json!({ "tools": state.registry.descriptors() }),
        ),
        "tools/call" => handle_tools_call(id, req.params, state).await,
        "resources/list" => RpcResponse::ok(
            id,
            json!({ "resources": state.resources.list() }),
        ),
        "resources/read" => handle_resources_read(id, req.params, state).await,
        method => RpcResponse::method_not_found(id, method),
    };
    Some(response)
}

fn handle_initialize(id: Option<RequestId>) -> RpcResponse {
    RpcResponse::ok(
        id,
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {
                "tools": {},
                "resources": {}
            },
            "serverInfo": {
                "name": "sovereign-stack",
                "version": env!("CARGO_PKG_VERSION")
            }
        }),
    )
}

async fn handle_tools_call(
    id: Option<RequestId>,
    params: Value,
    state: &ServerState,
) -> RpcResponse {
    let name = match params["name"].as_str() {
        Some(n) => n.to_string(),
        None => return RpcResponse::invalid_params(id, "missing required param: name"),
    };
    let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

    // every call is witnessed by the spiral before it runs
    state.stack.witness_tool_call(&name).await;

    let result = tokio::time::timeout(
        state.call_timeout,
        state.registry.execute(&name, arguments),
    )
    .await;

    match result {
        Err(_) => {
            tracing::warn!(tool = %name, "tool call exceeded deadline");
            RpcResponse::err_with_data(
                id,
                -32000,
                format!(
                    "operation timed out after {}s",
                    state.call_timeout.as_secs()
                ),
                json!({ "kind": "timeout" }),
            )
        }
        Ok(ToolResult::Fault(fault)) => RpcResponse::err_with_data(
            id,
            -32000,
            fault.message.clone(),
            json!({ "kind": fault.kind, "message": fault.message }),
        ),
        Ok(result) => RpcResponse::ok(
            id,
            json!({
                "content": [{ "type": "text", "text": result.to_content_string() }],
                "isError": false
            }),
        ),
    }
}

async fn handle_resources_read(
    id: Option<RequestId>,
    params: Value,
    state: &ServerState,
) -> RpcResponse {
    let uri = match params["uri"].as_str() {
        Some(u) => u,
        None => return RpcResponse::invalid_params(id, "missing required param: uri"),
    };
    match state.resources.read(uri).await {
        Ok(text) => RpcResponse::ok(
            id,
            json!({
                "contents": [{
                    "uri": uri,
                    "mimeType": "text/plain",
                    "text": text
                }]
            }),
        ),
        Err(e) => RpcResponse::err_with_data(
            id,
            -32002,
            e.to_string(),
            json!({ "kind": e.kind() }),
        ),
    }
}
