//! Tool result shape (§3 "Tool result").

use serde::{Deserialize, Serialize};

/// The outcome of dispatching one tool call through [`crate::ToolRegistry`].
///
/// `success=true` iff the executor returned `Ok`; a disabled or unknown
/// tool, or an executor error, yields `success=false` with `error_text`
/// set rather than propagating an exception (§4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Name of the tool that was invoked (or attempted).
    pub tool_name: String,
    /// The input it was invoked with.
    pub input: serde_json::Value,
    /// The tool's output text, when successful.
    pub output: Option<String>,
    /// Whether the call succeeded.
    pub success: bool,
    /// Human-readable error, when `success` is false.
    pub error_text: Option<String>,
}

impl ToolResult {
    /// Build a successful result.
    #[must_use]
    pub fn ok(tool_name: impl Into<String>, input: serde_json::Value, output: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            input,
            output: Some(output.into()),
            success: true,
            error_text: None,
        }
    }

    /// Build a failed result.
    #[must_use]
    pub fn err(tool_name: impl Into<String>, input: serde_json::Value, error_text: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            input,
            output: None,
            success: false,
            error_text: Some(error_text.into()),
        }
    }
}
