//! Wire protocol — JSON-RPC over stdio or SSE
//!
//! Wire format:
//!
//! Client → Server (request):
//!   { "jsonrpc": "2.0", "id": 1, "method": "tools/call", "params": { "name": "route", "arguments": {...} } }
//!
//! Server → Client (response):
//!   { "jsonrpc": "2.0", "id": 1, "result": { ... } }
//!   { "jsonrpc": "2.0", "id": 1, "error": { "code": -32601, "message": "..." } }
//!
//! On the SSE transport, responses are framed as `data:` lines; the first
//! event on a connection announces the per-connection message endpoint.

use serde::{Deserialize, Serialize};

/// Request id — the protocol permits numbers and strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RequestId {
    Num(i64),
    Str(String),
}

/// RPC request from client.
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<RequestId>,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// RPC response to client.
#[derive(Debug, Clone, Serialize)]
pub struct RpcResponse {
    pub jsonrpc: &'static str,
    pub id: Option<RequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

impl RpcResponse {
    /// Successful response with a result value.
    pub fn ok(id: Option<RequestId>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response.
    pub fn err(id: Option<RequestId>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Error response carrying structured data alongside the message.
    pub fn err_with_data(
        id: Option<RequestId>,
        code: i32,
        message: impl Into<String>,
        data: serde_json::Value,
    ) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: Some(data),
            }),
        }
    }

    /// Shorthand for a method-not-found error.
    pub fn method_not_found(id: Option<RequestId>, method: &str) -> Self {
        Self::err(id, -32601, format!("Method not found: {}", method))
    }

    /// Shorthand for an invalid-params error.
    pub fn invalid_params(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::err(id, -32602, message)
    }

    /// Shorthand for an internal error.
    pub fn internal_error(id: Option<RequestId>, message: impl Into<String>) -> Self {
        Self::err(id, -32603, message)
    }
}

/// RPC error detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}
