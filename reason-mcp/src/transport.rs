//! Transport selection and serving (§6 "Transports"): stdio, an
//! event-stream HTTP pair, a single bidirectional streamable-HTTP
//! endpoint, and a "dual" mode that serves the latter two on one port.
//!
//! Grounded on the teacher's `neuron-mcp::server::McpServer::serve_stdio`
//! (stdio transport) generalized with `rmcp`'s own `transport-sse-server`
//! and `transport-streamable-http-server` feature sets, which this crate's
//! `Cargo.toml` already enables — the teacher itself only ever serves
//! stdio, so the HTTP transports are grounded directly on `rmcp`'s
//! documented server examples rather than on teacher code.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{Method, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use rmcp::transport::sse_server::{SseServer, SseServerConfig};
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use rmcp::transport::streamable_http_server::tower::{StreamableHttpServerConfig, StreamableHttpService};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::error::McpError;
use crate::server::ReasoningServer;

/// Header MCP streamable-HTTP clients set once a session is established.
/// A GET without it is a legacy SSE-stream open, not a streamable-HTTP
/// resumption (§6 "dual" mode).
const SESSION_HEADER: &str = "mcp-session-id";

/// Which transport carries the tool-call RPC (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// Standard-in/out, newline-framed JSON-RPC.
    Stdio,
    /// Event-stream HTTP pair (one read channel, one write endpoint).
    Sse,
    /// Single bidirectional streamable-HTTP endpoint.
    StreamableHttp,
    /// SSE and streamable-HTTP served simultaneously on one port.
    Dual,
}

impl TransportKind {
    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "stdio" => Some(Self::Stdio),
            "sse" => Some(Self::Sse),
            "streamable-http" | "streamable_http" | "http" => Some(Self::StreamableHttp),
            "dual" => Some(Self::Dual),
            _ => None,
        }
    }
}

/// Resolve the transport to serve (§6):
///
/// 1. An explicit `transport` argument, if given.
/// 2. The `MCP_TRANSPORT` environment variable.
/// 3. Auto-select stdio when both stdin and stdout are non-TTY and nothing
///    else was configured.
/// 4. Otherwise, `dual` — the most capable default for an interactively
///    launched process.
#[must_use]
pub fn resolve_transport(explicit: Option<TransportKind>) -> TransportKind {
    if let Some(kind) = explicit {
        return kind;
    }
    if let Ok(raw) = std::env::var("MCP_TRANSPORT") {
        if let Some(kind) = TransportKind::parse(&raw) {
            return kind;
        }
        tracing::warn!(value = %raw, "unrecognized MCP_TRANSPORT, ignoring");
    }
    if !is_tty(Stream::Stdin) && !is_tty(Stream::Stdout) {
        return TransportKind::Stdio;
    }
    TransportKind::Dual
}

enum Stream {
    Stdin,
    Stdout,
}

fn is_tty(stream: Stream) -> bool {
    use std::io::IsTerminal;
    match stream {
        Stream::Stdin => std::io::stdin().is_terminal(),
        Stream::Stdout => std::io::stdout().is_terminal(),
    }
}

/// Resolve the bind address for HTTP transports: `MCP_PORT` (default
/// `8090`) on all interfaces, or `MCP_BASE_URL` if it names an explicit
/// host.
#[must_use]
pub fn bind_addr() -> SocketAddr {
    let port: u16 = std::env::var("MCP_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8090);
    std::env::var("MCP_BASE_URL")
        .ok()
        .and_then(|base| base.parse::<SocketAddr>().ok())
        .unwrap_or_else(|| SocketAddr::from(([0, 0, 0, 0], port)))
}

/// The path HTTP transports mount the RPC endpoint at: `MCP_HTTP_PATH`
/// (default `/mcp`).
#[must_use]
pub fn http_path() -> String {
    std::env::var("MCP_HTTP_PATH").unwrap_or_else(|_| "/mcp".to_string())
}

/// Serve `server` on the resolved transport until cancelled. Returns once
/// the transport shuts down in an orderly fashion; a bind failure is
/// returned as an error (§6 "Exit codes: non-zero only on transport-bind
/// failure").
pub async fn serve(server: ReasoningServer, kind: TransportKind, shutdown: CancellationToken) -> Result<(), McpError> {
    match kind {
        TransportKind::Stdio => serve_stdio(server, shutdown).await,
        TransportKind::Sse => serve_sse(server, shutdown).await,
        TransportKind::StreamableHttp => serve_streamable_http(server, shutdown).await,
        TransportKind::Dual => serve_dual(server, shutdown).await,
    }
}

/// Serve over stdin/stdout (§6), mirroring the teacher's
/// `McpServer::serve_stdio`.
async fn serve_stdio(server: ReasoningServer, shutdown: CancellationToken) -> Result<(), McpError> {
    use rmcp::transport::io::stdio;
    use rmcp::ServiceExt as _;

    let handler = server.handler();
    let transport = stdio();
    let running = handler
        .serve(transport)
        .await
        .map_err(crate::error::from_service_error)?;

    tokio::select! {
        result = running.waiting() => {
            result.map_err(crate::error::from_service_error)?;
        }
        () = shutdown.cancelled() => {}
    }
    Ok(())
}

/// Serve the event-stream HTTP pair (§6): one GET endpoint clients read
/// the event stream from, one POST endpoint clients write RPC calls to.
async fn serve_sse(server: ReasoningServer, shutdown: CancellationToken) -> Result<(), McpError> {
    let addr = bind_addr();
    let config = SseServerConfig {
        bind: addr,
        sse_path: http_path(),
        post_path: format!("{}/message", http_path().trim_end_matches('/')),
        ct: shutdown.clone(),
        sse_keep_alive: None,
    };
    let (sse_server, router) = SseServer::new(config);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| McpError::Bind(format!("SSE transport on {addr}: {e}")))?;

    let handler = server.handler();
    let _ct = sse_server.with_service(move || handler.clone());

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| McpError::Transport(format!("serving SSE transport: {e}")))
}

/// Serve the single bidirectional streamable-HTTP endpoint (§6).
async fn serve_streamable_http(server: ReasoningServer, shutdown: CancellationToken) -> Result<(), McpError> {
    let addr = bind_addr();
    let path = http_path();
    let router = streamable_http_router(server, &path);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| McpError::Bind(format!("streamable-HTTP transport on {addr}: {e}")))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| McpError::Transport(format!("serving streamable-HTTP transport: {e}")))
}

fn streamable_http_router(server: ReasoningServer, path: &str) -> Router {
    let handler = server.handler();
    let service = StreamableHttpService::new(
        move || Ok(handler.clone()),
        Arc::new(LocalSessionManager::default()),
        StreamableHttpServerConfig::default(),
    );
    Router::new().nest_service(path, service)
}

/// State shared by the "dual" transport's dispatch handler: the SSE
/// router and the streamable-HTTP router, both already bound to the same
/// `ReasoningServer` instance.
#[derive(Clone)]
struct DualState {
    sse: Router,
    http: Router,
}

/// Serve SSE and streamable-HTTP simultaneously on one port (§6): GETs
/// lacking a session header go to the event-stream handler, everything
/// else goes to the streamable-HTTP handler.
async fn serve_dual(server: ReasoningServer, shutdown: CancellationToken) -> Result<(), McpError> {
    let addr = bind_addr();
    let path = http_path();

    let sse_config = SseServerConfig {
        bind: addr,
        sse_path: path.clone(),
        post_path: format!("{}/message", path.trim_end_matches('/')),
        ct: shutdown.clone(),
        sse_keep_alive: None,
    };
    let (sse_server, sse_router) = SseServer::new(sse_config);
    let sse_handler = server.handler();
    let _ct = sse_server.with_service(move || sse_handler.clone());

    let http_router = streamable_http_router(server, &path);

    let state = DualState {
        sse: sse_router,
        http: http_router,
    };
    let dispatch = Router::new().fallback(any(dispatch_dual)).with_state(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| McpError::Bind(format!("dual transport on {addr}: {e}")))?;

    axum::serve(listener, dispatch)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| McpError::Transport(format!("serving dual transport: {e}")))
}

async fn dispatch_dual(State(state): State<DualState>, req: Request<Body>) -> Response {
    let is_session_get = req.method() == Method::GET && !req.headers().contains_key(SESSION_HEADER);
    let result = if is_session_get {
        state.sse.oneshot(req).await
    } else {
        state.http.oneshot(req).await
    };
    match result {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(%err, "dual transport dispatch failed");
            axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_transport_wins_over_everything() {
        // SAFETY: test-only env mutation, no concurrent access in this test binary.
        unsafe {
            std::env::set_var("MCP_TRANSPORT", "dual");
        }
        let kind = resolve_transport(Some(TransportKind::Stdio));
        unsafe {
            std::env::remove_var("MCP_TRANSPORT");
        }
        assert_eq!(kind, TransportKind::Stdio);
    }

    #[test]
    fn env_var_is_parsed_case_insensitively() {
        // SAFETY: test-only env mutation, no concurrent access in this test binary.
        unsafe {
            std::env::set_var("MCP_TRANSPORT", "STREAMABLE-HTTP");
        }
        let kind = resolve_transport(None);
        unsafe {
            std::env::remove_var("MCP_TRANSPORT");
        }
        assert_eq!(kind, TransportKind::StreamableHttp);
    }

    #[test]
    fn unrecognized_env_value_falls_through_to_tty_probe() {
        // SAFETY: test-only env mutation, no concurrent access in this test binary.
        unsafe {
            std::env::set_var("MCP_TRANSPORT", "telepathy");
        }
        let kind = resolve_transport(None);
        unsafe {
            std::env::remove_var("MCP_TRANSPORT");
        }
        // Test binaries have no controlling TTY either way; either auto-select
        // branch is a legitimate outcome, but it must be one of the two.
        assert!(matches!(kind, TransportKind::Stdio | TransportKind::Dual));
    }

    #[test]
    fn default_http_path_is_mcp() {
        // SAFETY: test-only env mutation, no concurrent access in this test binary.
        unsafe {
            std::env::remove_var("MCP_HTTP_PATH");
        }
        assert_eq!(http_path(), "/mcp");
    }

    #[test]
    fn http_path_env_override() {
        // SAFETY: test-only env mutation, no concurrent access in this test binary.
        unsafe {
            std::env::set_var("MCP_HTTP_PATH", "/rpc");
        }
        let path = http_path();
        unsafe {
            std::env::remove_var("MCP_HTTP_PATH");
        }
        assert_eq!(path, "/rpc");
    }

    #[test]
    fn default_bind_port_is_8090() {
        // SAFETY: test-only env mutation, no concurrent access in this test binary.
        unsafe {
            std::env::remove_var("MCP_PORT");
            std::env::remove_var("MCP_BASE_URL");
        }
        assert_eq!(bind_addr().port(), 8090);
    }

    #[test]
    fn port_env_override() {
        // SAFETY: test-only env mutation, no concurrent access in this test binary.
        unsafe {
            std::env::set_var("MCP_PORT", "9999");
            std::env::remove_var("MCP_BASE_URL");
        }
        let addr = bind_addr();
        unsafe {
            std::env::remove_var("MCP_PORT");
        }
        assert_eq!(addr.port(), 9999);
    }
}
