//! Tool error taxonomy, grounded on the teacher's `neuron_tool::ToolError`.

use thiserror::Error;

/// Errors from tool registry or executor operations.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ToolError {
    /// No tool is registered under this name.
    #[error("tool not found: {0}")]
    NotFound(String),
    /// The tool is registered but currently disabled.
    #[error("tool disabled: {0}")]
    Disabled(String),
    /// The input handed to the tool didn't match what it expects.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The tool ran but failed (subprocess exit, HTTP error, parse failure).
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    /// Execution exceeded its configured timeout.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),
    /// The run's cancellation token fired mid-execution.
    #[error("cancelled")]
    Cancelled,
}
