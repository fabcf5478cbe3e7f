//! SSE transport — long-lived GET event stream plus a POST message route
//!
//! GET /sse opens the stream; its first event announces the
//! per-connection POST endpoint. POST /messages carries client→server
//! JSON-RPC; responses are pushed onto the originating connection's
//! stream as `message` events. GET /health reports liveness.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use dashmap::DashMap;
use futures::stream::{self, Stream, StreamExt};
use sovereign_core::{GatewayConfig, RpcRequest, RpcResponse};
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, info, warn};

use crate::rpc::{route_rpc, ServerState};

/// Per-connection response channel capacity.
const CHANNEL_CAPACITY: usize = 64;

struct SseState {
    server: Arc<ServerState>,
    connections: DashMap<String, mpsc::Sender<RpcResponse>>,
}

pub async fn start_sse(config: GatewayConfig, server: Arc<ServerState>) -> anyhow::Result<()> {
    let state = Arc::new(SseState {
        server,
        connections: DashMap::new(),
    });

    let app = Router::new()
        .route("/sse", get(sse_handler))
        .route("/messages", post(messages_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
        .with_state(state);

    let bind_addr: SocketAddr = format!("{}:{}", config.bind.to_addr(), config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid bind address: {}", e))?;

    info!("Sovereign Stack SSE gateway v{}", env!("CARGO_PKG_VERSION"));
    info!("  Listening on: {}", bind_addr);
    info!("  Stream:  GET  http://{}/sse", bind_addr);
    info!("  Ingress: POST http://{}/messages", bind_addr);
    info!("  Health:  GET  http://{}/health", bind_addr);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn sse_handler(
    State(state): State<Arc<SseState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let conn_id = uuid::Uuid::new_v4().simple().to_string();
    let (tx, rx) = mpsc::channel::<RpcResponse>(CHANNEL_CAPACITY);
    state.connections.insert(conn_id.clone(), tx);
    info!(connection = %conn_id, "sse connection opened");

    let endpoint = Event::default()
        .event("endpoint")
        .data(format!("/messages?session={}", conn_id));

    let responses = stream::unfold(rx, |mut rx| async move {
        let response = rx.recv().await?;
        let data = serde_json::to_string(&response).unwrap_or_else(|_| "{}".into());
        Some((
            Ok::<_, Infallible>(Event::default().event("message").data(data)),
            rx,
        ))
    });

    let stream = stream::once(async move { Ok(endpoint) }).chain(responses);
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn messages_handler(
    State(state): State<Arc<SseState>>,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let Some(session) = query.get("session") else {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "missing session query param" })),
        );
    };
    let Some(tx) = state.connections.get(session).map(|t| t.value().clone()) else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "error": "unknown session" })),
        );
    };

    let request: RpcRequest = match serde_json::from_value(body) {
        Ok(r) => r,
        Err(e) => {
            let parse_err = RpcResponse::err(None, -32700, format!("parse error: {}", e));
            let _ = tx.send(parse_err).await;
            return (StatusCode::ACCEPTED, Json(serde_json::json!({ "ok": true })));
        }
    };

    debug!(session = %session, method = %request.method, "sse request");
    if let Some(response) = route_rpc(request, &state.server).await {
        if tx.send(response).await.is_err() {
            warn!(session = %session, "sse connection gone, dropping it");
            state.connections.remove(session);
        }
    }
    (StatusCode::ACCEPTED, Json(serde_json::json!({ "ok": true })))
}

async fn health_handler(State(state): State<Arc<SseState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "tools": state.server.registry.list().len(),
        "connections": state.connections.len(),
        "uptime_secs": state.server.started_at.elapsed().as_secs(),
    }))
}
