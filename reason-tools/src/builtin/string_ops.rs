//! String manipulation tool: a small fixed set of named operations.

use std::future::Future;
use std::pin::Pin;

use crate::error::ToolError;
use crate::executor::{ToolContext, ToolExecutor};

/// Applies one of a fixed set of named string operations to an input text.
pub struct StringOps;

impl ToolExecutor for StringOps {
    fn name(&self) -> &str {
        "string_ops"
    }

    fn description(&self) -> &str {
        "Applies a string operation (upper, lower, reverse, length, trim, replace) to text"
    }

    fn execute(
        &self,
        _ctx: &ToolContext,
        input: serde_json::Value,
    ) -> Pin<Box<dyn Future<Output = Result<String, ToolError>> + Send + '_>> {
        Box::pin(async move {
            let op = input
                .get("op")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| ToolError::InvalidInput("missing \"op\" string field".into()))?;
            let text = input
                .get("text")
                .and_then(serde_json::Value::as_str)
                .ok_or_else(|| ToolError::InvalidInput("missing \"text\" string field".into()))?;

            match op {
                "upper" => Ok(text.to_uppercase()),
                "lower" => Ok(text.to_lowercase()),
                "reverse" => Ok(text.chars().rev().collect()),
                "trim" => Ok(text.trim().to_string()),
                "length" => Ok(text.chars().count().to_string()),
                "replace" => {
                    let from = input
                        .get("from")
                        .and_then(serde_json::Value::as_str)
                        .ok_or_else(|| ToolError::InvalidInput("replace requires \"from\"".into()))?;
                    let to = input
                        .get("to")
                        .and_then(serde_json::Value::as_str)
                        .ok_or_else(|| ToolError::InvalidInput("replace requires \"to\"".into()))?;
                    Ok(text.replace(from, to))
                }
                other => Err(ToolError::InvalidInput(format!("unknown op: {other}"))),
            }
        })
    }
}
