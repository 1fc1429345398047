//! HTTP fetch tool: a sandboxed-by-scope GET/POST helper for model-directed
//! evidence gathering (used by the dialectic engine's tool-backed
//! verification, §4.6).

use std::future::Future;
use std::pin::Pin;

use reason_core::text::truncate_chars;

use crate::error::ToolError;
use crate::executor::{ToolContext, ToolExecutor};

const MAX_BODY_CHARS: usize = 4000;

/// Fetches a URL over HTTP(S) and returns a truncated snippet of the body.
pub struct HttpFetch {
    client: reqwest::Client,
}

impl HttpFetch {
    /// Build a fetch tool with a fresh `reqwest::Client`.
    #[must_use]
    pub fn new() -> Self {
        Self { client: reqwest::Client::new() }
    }
}

impl Default for HttpFetch {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolExecutor for HttpFetch {
    fn name(&self) -> &str {
        "http_fetch"
    }

    fn description(&self) -> &str {
        "Fetches a URL over HTTP(S) and returns a truncated text snippet of the response body"
    }

    fn execute(
        &self,
        ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let url = input
                .get("url")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| ToolError::InvalidInput("missing \"url\" string field".into()))?;
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ToolError::InvalidInput("url must be http(s)".into()));
            }
            let method = input
                .get("method")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("GET")
                .to_ascii_uppercase();

            let request = match method.as_str() {
                "GET" => self.client.get(url),
                "POST" => {
                    let body = input.get("body").and_then(serde_json::Value::as_str).unwrap_or("");
                    self.client.post(url).body(body.to_string())
                }
                other => return Err(ToolError::InvalidInput(format!("unsupported method: {other}"))),
            };

            let response = tokio::select! {
                () = ctx.cancel.cancelled() => return Err(ToolError::Cancelled),
                res = request.send() => res.map_err(|e| ToolError::ExecutionFailed(e.to_string()))?,
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?;

            if !status.is_success() {
                return Err(ToolError::ExecutionFailed(format!(
                    "http {status}: {}",
                    truncate_chars(&body, MAX_BODY_CHARS)
                )));
            }

            Ok(truncate_chars(&body, MAX_BODY_CHARS))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ToolContext {
        ToolContext::new(tokio_util::sync::CancellationToken::new(), std::time::Duration::from_secs(5))
    }

    #[tokio::test]
    async fn rejects_non_http_urls() {
        let tool = HttpFetch::new();
        let result = tool.execute(&ctx(), serde_json::json!({"url": "file:///etc/passwd"})).await;
        assert!(matches!(result, Err(ToolError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn rejects_unsupported_method() {
        let tool = HttpFetch::new();
        let result = tool
            .execute(&ctx(), serde_json::json!({"url": "http://example.com", "method": "DELETE"}))
            .await;
        assert!(matches!(result, Err(ToolError::InvalidInput(_))));
    }
}
