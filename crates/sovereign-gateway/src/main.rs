//! Sovereign Stack — local persistence and governance server
//!
//! `serve` binds the stdio transport (stdout carries the protocol, logs go
//! to stderr); `sse` binds the HTTP transport. Both expose the identical
//! tool and resource catalog.

use clap::{Parser, Subcommand};
use sovereign_core::{BindMode, GatewayConfig, RootContext};
use sovereign_gateway::{run_stdio, start_sse, ServerState};
use sovereign_stack::Stack;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sovereign-stack", about = "Sovereign Stack persistence and governance server")]
struct Cli {
    /// Storage root (default: $SOVEREIGN_ROOT or ~/.sovereign)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve over stdio (for a local MCP client)
    Serve,
    /// Serve over HTTP/SSE
    Sse {
        #[arg(short, long, default_value_t = 8743)]
        port: u16,
        #[arg(short, long, default_value = "loopback")]
        bind: String,
    },
    /// Verify the audit hash chain (or acknowledge a quarantine)
    VerifyAudit {
        #[arg(long)]
        acknowledge: bool,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // stdout may carry the protocol, so diagnostics always go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sovereign=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let ctx = match cli.root {
        Some(root) => RootContext::new(root),
        None => RootContext::from_env(),
    };

    match cli.command {
        Commands::Serve => {
            let stack = Stack::open(ctx).await?;
            let registry = sovereign_tools::create_default_registry(stack.clone());
            let state = Arc::new(ServerState::new(stack, registry));
            run_stdio(state).await
        }
        Commands::Sse { port, bind } => {
            let stack = Stack::open(ctx).await?;
            let registry = sovereign_tools::create_default_registry(stack.clone());
            let state = Arc::new(ServerState::new(stack, registry));
            let config = GatewayConfig {
                port,
                bind: match bind.as_str() {
                    "lan" | "0.0.0.0" => BindMode::Lan,
                    _ => BindMode::Loopback,
                },
            };
            start_sse(config, state).await
        }
        Commands::VerifyAudit { acknowledge } => {
            let stack = Stack::open(ctx).await?;
            let audit = stack.governance().audit();
            if acknowledge {
                audit.acknowledge().await?;
                eprintln!("quarantine acknowledged, governance re-opened");
            } else {
                let count = audit.verify().await?;
                eprintln!("audit chain intact: {} entries", count);
            }
            Ok(())
        }
        Commands::Version => {
            println!("sovereign-stack {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
