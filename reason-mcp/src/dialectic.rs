//! `dialectic_reason` RPC wrapper (§6) over
//! [`reason_engine_dialectic::DialecticEngine`].

use std::sync::Arc;

use reason_engine_dialectic::{DialecticEngine, DialecticParams, DialecticStep};
use reason_events::StreamingManager;
use reason_tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::McpError;
use crate::streamctl::StreamRequestFields;
use crate::tools::resolve_enabled_tools;

/// `dialectic_reason(...)` request parameters (§6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DialecticReasonRequest {
    /// The problem statement.
    pub problem: String,
    /// Maximum rounds before returning the best-seen synthesis.
    pub max_rounds: u32,
    /// Score a synthesis must meet (alongside validity, no issues) to
    /// resolve a round.
    pub confidence_target: f64,
    /// Requested max output tokens for generation calls.
    pub max_tokens: i64,
    /// Skip full verification; generate all three positions in one call.
    pub fast_mode: bool,
    /// Whether verification may request tool-backed evidence.
    pub enable_tools: bool,
    /// Maximum tool calls across all verifications in the run.
    pub max_tool_calls: u32,
    /// Tool names verification may invoke; empty means "every enabled tool".
    pub enabled_tools: Vec<String>,
    /// Explicit provider name, taking priority over env resolution.
    pub provider: Option<String>,
    /// Per-call model override, applied to whichever phase has no more
    /// specific `*_model` override.
    pub model: Option<String>,
    /// Per-phase model override for the thesis call.
    pub thesis_model: Option<String>,
    /// Per-phase model override for the antithesis call.
    pub antithesis_model: Option<String>,
    /// Per-phase model override for the synthesis call.
    pub synthesis_model: Option<String>,
    /// Additional providers to fall back to, in order, after `provider`.
    pub fallback_providers: Vec<String>,
    /// `stream*…` fields (§6), resolved via [`StreamRequestFields::resolve`].
    #[serde(flatten)]
    pub stream: StreamRequestFields,
}

impl Default for DialecticReasonRequest {
    fn default() -> Self {
        let defaults = DialecticParams::default();
        Self {
            problem: String::new(),
            max_rounds: defaults.max_rounds,
            confidence_target: defaults.confidence_target,
            max_tokens: 0,
            fast_mode: defaults.fast_mode,
            enable_tools: defaults.enable_tools,
            max_tool_calls: defaults.max_tool_calls_total,
            enabled_tools: Vec::new(),
            provider: None,
            model: None,
            thesis_model: None,
            antithesis_model: None,
            synthesis_model: None,
            fallback_providers: Vec::new(),
            stream: StreamRequestFields::default(),
        }
    }
}

impl DialecticReasonRequest {
    fn params(&self, resolved_enabled_tools: Vec<String>) -> DialecticParams {
        let base_model = self.model.clone();
        DialecticParams {
            fast_mode: self.fast_mode,
            temperature: DialecticParams::default().temperature,
            max_tokens: self.max_tokens,
            enable_tools: self.enable_tools,
            enabled_tools: resolved_enabled_tools,
            max_tool_calls_per_verification: DialecticParams::default().max_tool_calls_per_verification,
            max_tool_calls_total: self.max_tool_calls,
            max_rounds: self.max_rounds.max(1),
            verify_threshold: DialecticParams::default().verify_threshold,
            confidence_target: self.confidence_target,
            thesis_model: self.thesis_model.clone().or_else(|| base_model.clone()),
            antithesis_model: self.antithesis_model.clone().or_else(|| base_model.clone()),
            synthesis_model: self.synthesis_model.clone().or(base_model),
        }
    }
}

/// `dialectic_reason(...)` response shape (§6).
#[derive(Debug, Clone, Serialize)]
pub struct DialecticReasonResponse {
    /// The final answer: the resolving synthesis, or the best-seen one.
    pub answer: String,
    /// Whether a round resolved.
    pub success: bool,
    /// Confidence (synthesis verification score) of `answer`.
    pub confidence: f64,
    /// Total rounds run.
    pub total_rounds: u32,
    /// Every round's full step record, in order.
    pub steps: Vec<DialecticStep>,
}

/// Serve one `dialectic_reason` call.
///
/// # Errors
///
/// [`McpError::Dialectic`] if the engine run fails outright.
pub async fn run(
    request: DialecticReasonRequest,
    registry: &Arc<ToolRegistry>,
    events: &Arc<StreamingManager>,
    build_chain: impl FnOnce(Option<&str>, &[String], Option<&str>) -> Result<Arc<reason_provider::FallbackChain>, McpError>,
    cancel: CancellationToken,
) -> Result<DialecticReasonResponse, McpError> {
    let resolved_tools = resolve_enabled_tools(registry, &request.enabled_tools);
    let params = request.params(resolved_tools);
    let chain = build_chain(request.provider.as_deref(), &request.fallback_providers, request.model.as_deref())?;

    let engine = DialecticEngine::new(chain, Arc::clone(registry), Arc::clone(events), params);
    let result = engine.reason(&request.problem, cancel).await?;

    Ok(DialecticReasonResponse {
        answer: result.answer,
        success: result.success,
        confidence: result.confidence,
        total_rounds: result.total_rounds,
        steps: result.steps,
    })
}
