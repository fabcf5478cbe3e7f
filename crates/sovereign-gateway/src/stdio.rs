//! stdio transport — newline-delimited JSON-RPC on the process streams
//!
//! stdout carries the protocol; everything diagnostic goes to stderr.

use sovereign_core::{RpcRequest, RpcResponse};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use crate::rpc::{route_rpc, ServerState};

pub async fn run_stdio(state: Arc<ServerState>) -> anyhow::Result<()> {
    info!("stdio transport ready");

    let stdin = tokio::io::stdin();
    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(stdin).lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<RpcRequest>(&line) {
            Ok(req) => {
                debug!(method = %req.method, "request");
                route_rpc(req, &state).await
            }
            Err(e) => Some(RpcResponse::err(
                None,
                -32700,
                format!("parse error: {}", e),
            )),
        };

        if let Some(response) = response {
            let mut body = serde_json::to_vec(&response)?;
            body.push(b'\n');
            stdout.write_all(&body).await?;
            stdout.flush().await?;
        }
    }

    info!("stdin closed, shutting down");
    Ok(())
}
