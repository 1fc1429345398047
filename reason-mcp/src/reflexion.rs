//! `reflexion` RPC wrapper (§6) over [`reason_engine_reflexion::ReflexionEngine`].

use std::sync::Arc;

use reason_engine_reflexion::{AttemptRecord, ReflexionEngine, ReflexionParams};
use reason_events::StreamingManager;
use reason_memory::MemoryStore;
use reason_tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::McpError;
use crate::streamctl::StreamRequestFields;
use crate::tools::resolve_enabled_tools;

/// `reflexion(...)` request parameters (§6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReflexionRequest {
    /// The problem statement.
    pub problem: String,
    /// Maximum attempts before giving up.
    pub max_attempts: u32,
    /// Whether to consult episodic memory for past lessons up front.
    pub learn_from_past: bool,
    /// Whether tool actions are permitted during an attempt.
    pub enable_tools: bool,
    /// Maximum tool calls per attempt.
    pub max_tool_calls: u32,
    /// Tool names the model may invoke; empty means "every enabled tool".
    pub enabled_tools: Vec<String>,
    /// Explicit provider name, taking priority over env resolution.
    pub provider: Option<String>,
    /// Per-call model override.
    pub model: Option<String>,
    /// Additional providers to fall back to, in order, after `provider`.
    pub fallback_providers: Vec<String>,
    /// `stream*…` fields (§6), resolved via [`StreamRequestFields::resolve`].
    #[serde(flatten)]
    pub stream: StreamRequestFields,
}

impl Default for ReflexionRequest {
    fn default() -> Self {
        let defaults = ReflexionParams::default();
        Self {
            problem: String::new(),
            max_attempts: defaults.max_attempts,
            learn_from_past: defaults.use_memory,
            enable_tools: defaults.enable_tools,
            max_tool_calls: defaults.max_tool_calls_per_attempt,
            enabled_tools: Vec::new(),
            provider: None,
            model: None,
            fallback_providers: Vec::new(),
            stream: StreamRequestFields::default(),
        }
    }
}

impl ReflexionRequest {
    fn params(&self, resolved_enabled_tools: Vec<String>) -> ReflexionParams {
        ReflexionParams {
            max_attempts: self.max_attempts.max(1),
            temperature: ReflexionParams::default().temperature,
            enable_tools: self.enable_tools,
            max_tool_calls_per_attempt: self.max_tool_calls,
            enabled_tools: resolved_enabled_tools,
            use_memory: self.learn_from_past,
        }
    }
}

/// `reflexion(...)` response shape (§6).
#[derive(Debug, Clone, Serialize)]
pub struct ReflexionResponse {
    /// The final answer text.
    pub answer: String,
    /// Whether the evaluator judged an attempt successful.
    pub success: bool,
    /// Every attempt made, in order.
    pub attempts: Vec<AttemptRecord>,
    /// Lessons pulled from episodic memory at the start of the run (§4.8,
    /// §8 scenario 5).
    pub lessons_learned: Vec<String>,
}

/// Serve one `reflexion` call.
///
/// # Errors
///
/// [`McpError::Reflexion`] if the engine run fails outright;
/// [`McpError::Memory`] if `learn_from_past` is set and opening the
/// episodic memory store fails.
pub async fn run(
    request: ReflexionRequest,
    registry: &Arc<ToolRegistry>,
    events: &Arc<StreamingManager>,
    memory: Option<Arc<MemoryStore>>,
    build_chain: impl FnOnce(Option<&str>, &[String], Option<&str>) -> Result<Arc<reason_provider::FallbackChain>, McpError>,
    cancel: CancellationToken,
) -> Result<ReflexionResponse, McpError> {
    let resolved_tools = resolve_enabled_tools(registry, &request.enabled_tools);
    let params = request.params(resolved_tools);
    let chain = build_chain(request.provider.as_deref(), &request.fallback_providers, request.model.as_deref())?;

    let memory = if request.learn_from_past { memory } else { None };
    let engine = ReflexionEngine::new(chain, Arc::clone(registry), Arc::clone(events), memory, params);
    let result = engine.reason(&request.problem, cancel).await?;

    Ok(ReflexionResponse {
        answer: result.answer,
        success: result.success,
        attempts: result.attempts,
        lessons_learned: result.lessons_learned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_mirror_engine_defaults() {
        let req = ReflexionRequest::default();
        let engine_defaults = ReflexionParams::default();
        assert_eq!(req.max_attempts, engine_defaults.max_attempts);
        assert_eq!(req.learn_from_past, engine_defaults.use_memory);
    }

    #[test]
    fn zero_max_attempts_is_floored_to_one() {
        let req = ReflexionRequest {
            max_attempts: 0,
            ..Default::default()
        };
        assert_eq!(req.params(Vec::new()).max_attempts, 1);
    }
}
