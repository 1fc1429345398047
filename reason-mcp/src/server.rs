//! MCP server exposing the six reasoning tools over the MCP protocol
//! (§6), grounded on the teacher's `neuron-mcp::server::McpServer` /
//! `McpServerHandler` split — a thin owner struct plus a `ServerHandler`
//! implementation that dispatches `call_tool` by name.

use std::borrow::Cow;
use std::sync::Arc;

use reason_events::StreamingManager;
use reason_memory::MemoryStore;
use reason_tools::ToolRegistry;
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, Implementation, ListToolsResult,
    PaginatedRequestParams, ProtocolVersion, ServerCapabilities, ServerInfo, Tool as McpTool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData, ServerHandler};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::dialectic::{self, DialecticReasonRequest};
use crate::error::McpError;
use crate::got::{self, GraphOfThoughtsRequest};
use crate::memory::{memory_path, memory_stats};
use crate::providers::{self, list_providers};
use crate::reflexion::{self, ReflexionRequest};
use crate::sequential::{self, SequentialRequest};

const SEQUENTIAL_THINKING: &str = "sequential_thinking";
const GRAPH_OF_THOUGHTS: &str = "graph_of_thoughts";
const REFLEXION: &str = "reflexion";
const DIALECTIC_REASON: &str = "dialectic_reason";
const LIST_PROVIDERS: &str = "list_providers";
const MEMORY_STATS: &str = "memory_stats";

/// Env-var prefix (§6 `<TOOL>_PROVIDER`/`<TOOL>_MODEL`/`<TOOL>_FALLBACKS`)
/// used for each tool's provider resolution.
const SEQUENTIAL_ENV_PREFIX: &str = "SEQUENTIAL_THINKING";
const GOT_ENV_PREFIX: &str = "GRAPH_OF_THOUGHTS";
const REFLEXION_ENV_PREFIX: &str = "REFLEXION";
const DIALECTIC_ENV_PREFIX: &str = "DIALECTIC_REASON";

/// MCP server wrapping the reasoning-tool registry, provider catalog, and
/// episodic memory store. Cheap to clone — every field is an `Arc` — so
/// one instance can back every connection a multi-client transport opens
/// (mirrors the teacher's stdio-only `McpServer`, generalized to the
/// SSE/streamable-HTTP transports this spec also requires).
#[derive(Clone)]
pub struct ReasoningServer {
    registry: Arc<ToolRegistry>,
    memory: Arc<MemoryStore>,
    name: String,
    version: String,
}

impl ReasoningServer {
    /// Build a server over an already-constructed tool registry and
    /// episodic memory store.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>, memory: Arc<MemoryStore>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            registry,
            memory,
            name: name.into(),
            version: version.into(),
        }
    }

    /// The underlying [`ServerHandler`] implementation, for transports
    /// that need to construct their own service per connection.
    #[must_use]
    pub(crate) fn handler(&self) -> ReasoningHandler {
        ReasoningHandler {
            registry: Arc::clone(&self.registry),
            memory: Arc::clone(&self.memory),
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct ReasoningHandler {
    registry: Arc<ToolRegistry>,
    memory: Arc<MemoryStore>,
    name: String,
    version: String,
}

fn tool(name: &'static str, description: &'static str, schema: serde_json::Value) -> McpTool {
    let schema_obj = schema.as_object().cloned().unwrap_or_default();
    McpTool {
        name: Cow::Borrowed(name),
        title: None,
        description: Some(Cow::Borrowed(description)),
        input_schema: Arc::new(schema_obj),
        output_schema: None,
        annotations: None,
        execution: None,
        icons: None,
        meta: None,
    }
}

/// Build an object-schema `serde_json::Value` from a `{"type": "object", ...}`
/// value plus the five `stream*…` properties (§6) every reasoning tool
/// accepts, merged in under `properties`.
fn with_stream_properties(mut schema: serde_json::Value, required: &[&str]) -> serde_json::Value {
    let stream = json!({
        "stream": {"type": "boolean"},
        "stream_mode": {"type": "string", "enum": ["none", "tokens", "events", "both"]},
        "stderr_stream": {"type": "boolean"},
        "logging": {"type": "boolean"},
        "progress": {"type": "boolean"},
    });
    if let (Some(props), Some(stream_props)) = (schema["properties"].as_object_mut(), stream.as_object()) {
        for (k, v) in stream_props {
            props.insert(k.clone(), v.clone());
        }
    }
    if !required.is_empty() {
        schema["required"] = json!(required);
    }
    schema
}

fn tool_catalog() -> Vec<McpTool> {
    vec![
        tool(
            SEQUENTIAL_THINKING,
            "Sequential chain-of-thought: repeatedly prompt for the next thought until the model signals a final answer.",
            with_stream_properties(
                json!({
                    "type": "object",
                    "properties": {
                        "problem": {"type": "string"},
                        "max_thoughts": {"type": "integer", "minimum": 1},
                        "provider": {"type": "string"},
                        "model": {"type": "string"},
                    },
                }),
                &["problem"],
            ),
        ),
        tool(
            GRAPH_OF_THOUGHTS,
            "Graph-of-thoughts search: UCB-guided expansion of a DAG of candidate thoughts, with optional merging and tool use.",
            with_stream_properties(
                json!({
                    "type": "object",
                    "properties": {
                        "problem": {"type": "string"},
                        "branching_factor": {"type": "integer", "minimum": 1},
                        "max_nodes": {"type": "integer", "minimum": 1},
                        "max_depth": {"type": "integer", "minimum": 1},
                        "enable_merging": {"type": "boolean"},
                        "enable_tools": {"type": "boolean"},
                        "max_tool_calls": {"type": "integer", "minimum": 0},
                        "enabled_tools": {"type": "array", "items": {"type": "string"}},
                        "provider": {"type": "string"},
                        "model": {"type": "string"},
                        "fallback_providers": {"type": "array", "items": {"type": "string"}},
                    },
                }),
                &["problem"],
            ),
        ),
        tool(
            REFLEXION,
            "Reflexion: attempt/evaluate/reflect loop with persistent episodic memory across runs.",
            with_stream_properties(
                json!({
                    "type": "object",
                    "properties": {
                        "problem": {"type": "string"},
                        "max_attempts": {"type": "integer", "minimum": 1},
                        "learn_from_past": {"type": "boolean"},
                        "enable_tools": {"type": "boolean"},
                        "max_tool_calls": {"type": "integer", "minimum": 0},
                        "enabled_tools": {"type": "array", "items": {"type": "string"}},
                        "provider": {"type": "string"},
                        "model": {"type": "string"},
                        "fallback_providers": {"type": "array", "items": {"type": "string"}},
                    },
                }),
                &["problem"],
            ),
        ),
        tool(
            DIALECTIC_REASON,
            "Dialectic reasoning: thesis/antithesis/synthesis rounds with verification and optional tool-backed evidence.",
            with_stream_properties(
                json!({
                    "type": "object",
                    "properties": {
                        "problem": {"type": "string"},
                        "max_rounds": {"type": "integer", "minimum": 1},
                        "confidence_target": {"type": "number", "minimum": 0.0, "maximum": 1.0},
                        "max_tokens": {"type": "integer"},
                        "fast_mode": {"type": "boolean"},
                        "enable_tools": {"type": "boolean"},
                        "max_tool_calls": {"type": "integer", "minimum": 0},
                        "enabled_tools": {"type": "array", "items": {"type": "string"}},
                        "provider": {"type": "string"},
                        "model": {"type": "string"},
                        "thesis_model": {"type": "string"},
                        "antithesis_model": {"type": "string"},
                        "synthesis_model": {"type": "string"},
                        "fallback_providers": {"type": "array", "items": {"type": "string"}},
                    },
                }),
                &["problem"],
            ),
        ),
        tool(
            LIST_PROVIDERS,
            "List every known LLM provider and whether it is currently configured.",
            json!({"type": "object", "properties": {}}),
        ),
        tool(
            MEMORY_STATS,
            "Report episodic-memory counts and the on-disk path it is stored at.",
            json!({"type": "object", "properties": {}}),
        ),
    ]
}

fn invalid_params(msg: impl Into<String>) -> ErrorData {
    ErrorData::invalid_params(msg.into(), None)
}

fn internal_error(err: impl std::fmt::Display) -> ErrorData {
    ErrorData::internal_error(err.to_string(), None)
}

fn success_json(value: &impl serde::Serialize) -> CallToolResult {
    let text = serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string());
    CallToolResult::success(vec![Content::text(text)])
}

fn parse_arguments<T: serde::de::DeserializeOwned>(request: &CallToolRequestParams) -> Result<T, ErrorData> {
    let value = match &request.arguments {
        Some(map) => serde_json::Value::Object(map.clone()),
        None => serde_json::Value::Object(serde_json::Map::new()),
    };
    serde_json::from_value(value).map_err(|e| invalid_params(format!("invalid arguments: {e}")))
}

impl ServerHandler for ReasoningHandler {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: self.name.clone(),
                version: self.version.clone(),
                ..Default::default()
            },
            instructions: Some(
                "Reasoning-orchestration tools: sequential_thinking, graph_of_thoughts, reflexion, \
                 dialectic_reason, list_providers, memory_stats."
                    .to_string(),
            ),
        }
    }

    async fn list_tools(
        &self,
        _request: Option<PaginatedRequestParams>,
        _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, ErrorData> {
        Ok(ListToolsResult::with_all_items(tool_catalog()))
    }

    async fn call_tool(
        &self,
        request: CallToolRequestParams,
        _context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, ErrorData> {
        let cancel = CancellationToken::new();
        match &*request.name {
            SEQUENTIAL_THINKING => {
                let req: SequentialRequest = parse_arguments(&request)?;
                let mode = req.stream.resolve();
                let events = Arc::new(StreamingManager::new(mode));
                let build_chain = |provider: Option<&str>, fallbacks: &[String], model: Option<&str>| {
                    providers::build_chain(SEQUENTIAL_ENV_PREFIX, provider, fallbacks, model)
                };
                match sequential::run_request(req, &events, build_chain, cancel).await {
                    Ok(response) => Ok(success_json(&response)),
                    Err(err) => Ok(CallToolResult::error(vec![Content::text(err.to_string())])),
                }
            }
            GRAPH_OF_THOUGHTS => {
                let req: GraphOfThoughtsRequest = parse_arguments(&request)?;
                let mode = req.stream.resolve();
                let events = Arc::new(StreamingManager::new(mode));
                let build_chain = |provider: Option<&str>, fallbacks: &[String], model: Option<&str>| {
                    providers::build_chain(GOT_ENV_PREFIX, provider, fallbacks, model)
                };
                match got::run(req, &self.registry, &events, build_chain, cancel).await {
                    Ok(response) => Ok(success_json(&response)),
                    Err(err) => Ok(CallToolResult::error(vec![Content::text(err.to_string())])),
                }
            }
            REFLEXION => {
                let req: ReflexionRequest = parse_arguments(&request)?;
                let mode = req.stream.resolve();
                let events = Arc::new(StreamingManager::new(mode));
                let build_chain = |provider: Option<&str>, fallbacks: &[String], model: Option<&str>| {
                    providers::build_chain(REFLEXION_ENV_PREFIX, provider, fallbacks, model)
                };
                match reflexion::run(req, &self.registry, &events, Some(Arc::clone(&self.memory)), build_chain, cancel).await {
                    Ok(response) => Ok(success_json(&response)),
                    Err(err) => Ok(CallToolResult::error(vec![Content::text(err.to_string())])),
                }
            }
            DIALECTIC_REASON => {
                let req: DialecticReasonRequest = parse_arguments(&request)?;
                let mode = req.stream.resolve();
                let events = Arc::new(StreamingManager::new(mode));
                let build_chain = |provider: Option<&str>, fallbacks: &[String], model: Option<&str>| {
                    providers::build_chain(DIALECTIC_ENV_PREFIX, provider, fallbacks, model)
                };
                match dialectic::run(req, &self.registry, &events, build_chain, cancel).await {
                    Ok(response) => Ok(success_json(&response)),
                    Err(err) => Ok(CallToolResult::error(vec![Content::text(err.to_string())])),
                }
            }
            LIST_PROVIDERS => Ok(success_json(&list_providers())),
            MEMORY_STATS => {
                let stats = memory_stats(&self.memory).await;
                let _ = memory_path();
                Ok(success_json(&stats))
            }
            other => Err(invalid_params(format!("tool not found: {other}"))),
        }
    }
}

impl From<McpError> for ErrorData {
    fn from(err: McpError) -> Self {
        internal_error(err)
    }
}
