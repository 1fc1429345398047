//! Code execution tool. Disabled by default; gated behind `CODE_EXEC_ENABLED`
//! (§4.7). The sandbox here is a best-effort pattern blocklist plus a
//! subprocess timeout — explicitly not a security boundary (§9 Open
//! Questions). A production deployment should replace it with OS-level
//! isolation; the `ToolExecutor` interface would not need to change.

use std::future::Future;
use std::pin::Pin;
use std::process::Stdio;

use reason_core::text::truncate_chars;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::ToolError;
use crate::executor::{ToolContext, ToolExecutor};

const MAX_OUTPUT_CHARS: usize = 4000;

// Substrings that are near-certain signs of sandbox escape or host access.
// Matched case-sensitively against the raw source; this is a coarse net,
// not a parser, and a determined submitter can trivially work around it
// (string concatenation, getattr, etc). It exists to stop accidental or
// unsophisticated misuse, not adversarial input.
const BLOCKED_PATTERNS: &[&str] = &[
    "import os",
    "import sys",
    "import subprocess",
    "import socket",
    "import shutil",
    "__import__",
    "open(",
    "exec(",
    "eval(",
    "compile(",
    "os.system",
    "os.popen",
];

fn find_blocked_pattern(code: &str) -> Option<&'static str> {
    BLOCKED_PATTERNS.iter().find(|p| code.contains(*p)).copied()
}

/// Runs short Python snippets in a `python3` subprocess.
pub struct CodeExecutor;

impl ToolExecutor for CodeExecutor {
    fn name(&self) -> &str {
        "code_executor"
    }

    fn description(&self) -> &str {
        "Runs a short Python snippet and returns its stdout. Disabled unless explicitly enabled."
    }

    fn execute(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let code = input
                .get("code")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| ToolError::InvalidInput("missing \"code\" string field".into()))?;

            if let Some(pattern) = find_blocked_pattern(code) {
                return Err(ToolError::InvalidInput(format!(
                    "code contains a blocked pattern: {pattern}"
                )));
            }

            let mut child = Command::new("python3")
                .arg("-I") // isolated mode: ignore PYTHONPATH/site customizations
                .arg("-c")
                .arg(code)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| ToolError::ExecutionFailed(format!("failed to spawn python3: {e}")))?;

            let output = tokio::select! {
                () = ctx.cancel.cancelled() => {
                    let _ = child.kill().await;
                    return Err(ToolError::Cancelled);
                }
                res = child.wait_with_output() => {
                    res.map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
                }
            };

            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(ToolError::ExecutionFailed(truncate_chars(&stderr, MAX_OUTPUT_CHARS)));
            }

            let stdout = String::from_utf8_lossy(&output.stdout);
            Ok(truncate_chars(&stdout, MAX_OUTPUT_CHARS))
        })
    }
}

/// Validate a Python snippet's syntax without executing it, via
/// `python3 -c "compile(..., 'exec')"` fed on stdin. Used ahead of
/// [`CodeExecutor::execute`] by callers that want to reject a malformed
/// snippet before spending a full execution timeout on it.
pub async fn validate_syntax(code: &str, cancel: &tokio_util::sync::CancellationToken) -> Result<(), String> {
    let mut child = Command::new("python3")
        .arg("-I")
        .arg("-c")
        .arg("import sys; compile(sys.stdin.read(), '<tool>', 'exec')")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| format!("failed to spawn python3: {e}"))?;

    if let Some(mut stdin) = child.stdin.take() {
        let _ = stdin.write_all(code.as_bytes()).await;
    }

    let output = tokio::select! {
        () = cancel.cancelled() => {
            let _ = child.kill().await;
            return Err("cancelled".to_string());
        }
        res = child.wait_with_output() => res.map_err(|e| e.to_string())?,
    };

    if output.status.success() {
        Ok(())
    } else {
        Err(String::from_utf8_lossy(&output.stderr).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_obvious_escape_patterns() {
        assert!(find_blocked_pattern("import os\nos.system('rm -rf /')").is_some());
        assert!(find_blocked_pattern("print('hi')").is_none());
    }

    #[tokio::test]
    async fn tool_rejects_missing_code_field() {
        let tool = CodeExecutor;
        let ctx = ToolContext::new(tokio_util::sync::CancellationToken::new(), std::time::Duration::from_secs(5));
        let result = tool.execute(&ctx, serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn tool_rejects_blocked_pattern_before_spawning() {
        let tool = CodeExecutor;
        let ctx = ToolContext::new(tokio_util::sync::CancellationToken::new(), std::time::Duration::from_secs(5));
        let result = tool
            .execute(&ctx, serde_json::json!({"code": "import subprocess"}))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidInput(_))));
    }
}
