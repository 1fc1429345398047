//! Reasoning-orchestration server entrypoint (§6).
//!
//! Thin by design: all request handling lives in `reason-mcp`, all
//! algorithmic work in the `reason-engine-*` crates. This binary's job is
//! CLI/env flag resolution, logging init, and picking + running a
//! transport — the same split the teacher draws between `brain`'s
//! `main.rs` (arg parsing, wiring) and the library crates it calls into.

use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use reason_mcp::{build_registry, open_memory_store, resolve_transport, serve, ReasoningServer, TransportKind};
use tokio_util::sync::CancellationToken;

/// CLI transport selector mirroring [`TransportKind`], with a `clap`
/// `ValueEnum` impl so `--transport` can be parsed directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TransportArg {
    /// Standard-in/out JSON-RPC.
    Stdio,
    /// Event-stream HTTP pair.
    Sse,
    /// Single bidirectional streamable-HTTP endpoint.
    StreamableHttp,
    /// Both HTTP transports on one port.
    Dual,
}

impl From<TransportArg> for TransportKind {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Stdio => Self::Stdio,
            TransportArg::Sse => Self::Sse,
            TransportArg::StreamableHttp => Self::StreamableHttp,
            TransportArg::Dual => Self::Dual,
        }
    }
}

/// Reasoning-orchestration server: sequential thinking, graph-of-thoughts,
/// reflexion, and dialectic reasoning tools over an MCP transport (§6).
#[derive(Debug, Parser)]
#[command(name = "reason-server", version, about)]
struct Args {
    /// Transport to serve. Falls back to `MCP_TRANSPORT`, then
    /// auto-selects stdio when both stdin and stdout are non-TTY, else
    /// serves both HTTP transports ("dual") on one port.
    #[arg(long, env = "MCP_TRANSPORT", value_enum)]
    transport: Option<TransportArg>,

    /// Port for HTTP transports (sse / streamable-http / dual). Ignored
    /// for stdio.
    #[arg(long, env = "MCP_PORT")]
    port: Option<u16>,

    /// HTTP path the RPC endpoint is mounted at (sse / streamable-http /
    /// dual). Ignored for stdio.
    #[arg(long, env = "MCP_HTTP_PATH")]
    http_path: Option<String>,

    /// Explicit `host:port` to bind HTTP transports to, overriding `--port`.
    #[arg(long, env = "MCP_BASE_URL")]
    base_url: Option<String>,
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}

/// Resolve `Args`' flags into the process-wide env vars the rest of
/// `reason-mcp` reads (`MCP_PORT`, `MCP_HTTP_PATH`) so a CLI flag behaves
/// identically to its environment-variable equivalent (§6 "per-provider
/// and per-tool timeouts … recognized options").
///
/// # Safety
///
/// Single-threaded at this point in `main` (before the Tokio runtime has
/// spawned any other task), so mutating the environment here cannot race
/// a concurrent reader.
fn apply_cli_overrides(args: &Args) {
    if let Some(port) = args.port {
        unsafe {
            std::env::set_var("MCP_PORT", port.to_string());
        }
    }
    if let Some(path) = &args.http_path {
        unsafe {
            std::env::set_var("MCP_HTTP_PATH", path);
        }
    }
    if let Some(base_url) = &args.base_url {
        unsafe {
            std::env::set_var("MCP_BASE_URL", base_url);
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();
    apply_cli_overrides(&args);

    let registry = build_registry();
    let memory = match open_memory_store().await {
        Ok(store) => std::sync::Arc::new(store),
        Err(err) => {
            tracing::error!(%err, "failed to open episodic memory store");
            return ExitCode::FAILURE;
        }
    };
    let server = ReasoningServer::new(registry, memory, env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    let kind = resolve_transport(args.transport.map(TransportKind::from));
    tracing::info!(?kind, "starting reasoning-orchestration server");

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received shutdown signal");
        shutdown_signal.cancel();
    });

    match serve(server, kind, shutdown).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(reason_mcp::McpError::Bind(msg)) => {
            tracing::error!(error = %msg, "transport failed to bind");
            ExitCode::FAILURE
        }
        Err(err) => {
            // Every other error category is treated as part of an orderly
            // shutdown at the process level (§6 "Exit codes: non-zero only
            // on transport-bind failure") — it's still logged so an
            // operator can see what happened.
            tracing::warn!(%err, "transport ended with an error");
            ExitCode::SUCCESS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn transport_arg_maps_onto_transport_kind() {
        assert_eq!(TransportKind::from(TransportArg::Stdio), TransportKind::Stdio);
        assert_eq!(TransportKind::from(TransportArg::Sse), TransportKind::Sse);
        assert_eq!(TransportKind::from(TransportArg::StreamableHttp), TransportKind::StreamableHttp);
        assert_eq!(TransportKind::from(TransportArg::Dual), TransportKind::Dual);
    }
}
