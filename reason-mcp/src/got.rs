//! `graph_of_thoughts` RPC wrapper (§6) over [`reason_engine_got::GotEngine`].

use std::sync::Arc;

use reason_engine_got::{GotEngine, GotNode, GotParams};
use reason_events::StreamingManager;
use reason_tools::ToolRegistry;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::McpError;
use crate::streamctl::StreamRequestFields;
use crate::tools::resolve_enabled_tools;

/// `graph_of_thoughts(...)` request parameters (§6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphOfThoughtsRequest {
    /// The problem statement.
    pub problem: String,
    /// §3 "GoT node" expansion fan-out.
    pub branching_factor: u32,
    /// Stop once the graph holds this many nodes.
    pub max_nodes: u32,
    /// No node may be expanded past this depth.
    pub max_depth: u32,
    /// Whether same-depth convergent thoughts may be merged.
    pub enable_merging: bool,
    /// Whether tool actions are permitted.
    pub enable_tools: bool,
    /// Maximum tool calls across the whole run.
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

impl Default for GraphOfThoughtsRequest {
    fn default() -> Self {
        let defaults = GotParams::default();
        Self {
            problem: String::new(),
            branching_factor: defaults.branching_factor,
            max_nodes: defaults.max_nodes,
            max_depth: defaults.max_depth,
            enable_merging: defaults.enable_merging,
            enable_tools: defaults.enable_tools,
            max_tool_calls: defaults.max_tool_calls,
            enabled_tools: Vec::new(),
            provider: None,
            model: None,
            fallback_providers: Vec::new(),
            stream: StreamRequestFields::default(),
        }
    }
}

impl GraphOfThoughtsRequest {
    fn params(&self, resolved_enabled_tools: Vec<String>) -> GotParams {
        GotParams {
            branching_factor: self.branching_factor.max(1),
            max_nodes: self.max_nodes.max(1),
            max_depth: self.max_depth.max(1),
            merge_threshold: GotParams::default().merge_threshold,
            min_score: GotParams::default().min_score,
            temperature: GotParams::default().temperature,
            enable_merging: self.enable_merging,
            enable_tools: self.enable_tools,
            max_tool_calls: self.max_tool_calls,
            enabled_tools: resolved_enabled_tools,
        }
    }
}

/// `graph_of_thoughts(...)` response shape (§6).
#[derive(Debug, Clone, Serialize)]
pub struct GraphOfThoughtsResponse {
    /// The final answer text.
    pub answer: String,
    /// Whether the answer came from a node explicitly marked a solution.
    pub is_solution: bool,
    /// The canonical path from root to the answering node.
    pub path: Vec<String>,
    /// Every node created during the run.
    pub nodes: Vec<GotNode>,
    /// Total nodes created.
    pub node_count: usize,
}

/// Serve one `graph_of_thoughts` call.
///
/// # Errors
///
/// [`McpError::Got`] if the engine run fails outright (not a
/// `is_solution=false` result, which is a normal outcome).
pub async fn run(
    request: GraphOfThoughtsRequest,
    registry: &Arc<ToolRegistry>,
    events: &Arc<StreamingManager>,
    build_chain: impl FnOnce(Option<&str>, &[String], Option<&str>) -> Result<Arc<reason_provider::FallbackChain>, McpError>,
    cancel: CancellationToken,
) -> Result<GraphOfThoughtsResponse, McpError> {
    let resolved_tools = resolve_enabled_tools(registry, &request.enabled_tools);
    let params = request.params(resolved_tools);
    let chain = build_chain(request.provider.as_deref(), &request.fallback_providers, request.model.as_deref())?;

    let engine = GotEngine::new(chain, Arc::clone(registry), Arc::clone(events), params);
    let result = engine.reason(&request.problem, cancel).await?;

    Ok(GraphOfThoughtsResponse {
        answer: result.answer,
        is_solution: result.is_solution,
        path: result.path,
        nodes: result.nodes,
        node_count: result.node_count,
    })
}
