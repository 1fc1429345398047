//! Object-safe tool trait, grounded on the teacher's `neuron_tool::ToolDyn`.

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::error::ToolError;

/// Context threaded through every tool execution: the run-wide cancellation
/// token and the per-tool timeout resolved from [`reason_core::Config`].
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Cancellation token for the enclosing run (§4.6).
    pub cancel: CancellationToken,
    /// Timeout for this specific execution.
    pub timeout: std::time::Duration,
}

impl ToolContext {
    /// Build a context for a single tool execution.
    #[must_use]
    pub fn new(cancel: CancellationToken, timeout: std::time::Duration) -> Self {
        Self { cancel, timeout }
    }
}

/// Object-safe tool executor: `(name, description, execute(ctx, input))`.
///
/// Implementors are stored as `Arc<dyn ToolExecutor>` in [`crate::ToolRegistry`].
/// `execute` returns an owned boxed future (RPITIT isn't object-safe) so the
/// registry can hold a heterogeneous collection of tool kinds.
pub trait ToolExecutor: Send + Sync {
    /// The tool's unique name, used for registry lookup and `enabled_tools`
    /// filtering at the RPC boundary.
    fn name(&self) -> &str;

    /// Human-readable description, surfaced to the model as part of its
    /// tool-use prompt.
    fn description(&self) -> &str;

    /// Execute the tool. Errors are surfaced to callers as a `ToolResult`
    /// with `success=false`, never as a propagated exception (§4.7).
    fn execute(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>>;
}
