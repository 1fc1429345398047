//! MCP surface errors, grounded on the teacher's `neuron-mcp::McpError`
//! conversion pattern — rmcp's own error types are foreign, so we can't
//! `impl From` for them directly and instead provide named conversion
//! helpers.

/// Errors from the tool-call RPC surface (§6).
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    /// No provider could be resolved for a requested name (unknown name, or
    /// a known provider missing its required API key).
    #[error("unknown or unconfigured provider: {0}")]
    UnknownProvider(String),
    /// A `fallback_providers` / provider list was empty after filtering.
    #[error("no providers available to build a fallback chain")]
    NoProviders,
    /// The underlying transport failed to start or serve.
    #[error("transport error: {0}")]
    Transport(String),
    /// The transport could not bind its listening socket (§6 "Exit codes:
    /// non-zero only on transport-bind failure") — the sole error kind the
    /// binary's `main` maps to a non-zero exit status.
    #[error("failed to bind transport: {0}")]
    Bind(String),
    /// Failure opening or using the episodic memory store.
    #[error("memory error: {0}")]
    Memory(#[from] reason_memory::MemoryError),
    /// The graph-of-thoughts engine failed outright (not a `success=false`
    /// result — an actual server-side error, §7).
    #[error("graph_of_thoughts failed: {0}")]
    Got(#[from] reason_engine_got::GotError),
    /// The reflexion engine failed outright.
    #[error("reflexion failed: {0}")]
    Reflexion(#[from] reason_engine_reflexion::ReflexionError),
    /// The dialectic engine failed outright.
    #[error("dialectic_reason failed: {0}")]
    Dialectic(#[from] reason_engine_dialectic::DialecticError),
    /// A bare model call used directly by `sequential_thinking` failed on
    /// every provider in the chain.
    #[error("sequential_thinking failed: {0}")]
    Provider(#[from] reason_provider::ProviderError),
}

/// Convert an rmcp `ServiceError` into [`McpError`] (orphan-rule workaround,
/// mirrors the teacher's `neuron-mcp::error::from_service_error`).
pub(crate) fn from_service_error(err: rmcp::ServiceError) -> McpError {
    McpError::Transport(err.to_string())
}
