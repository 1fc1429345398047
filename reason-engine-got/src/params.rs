//! Tunable parameters for a single [`crate::GotEngine::reason`] run (§4.9).

/// Parameters governing one graph-of-thoughts run.
#[derive(Debug, Clone)]
pub struct GotParams {
    /// How many candidate next actions to request per expansion.
    pub branching_factor: u32,
    /// Stop expanding once the graph holds this many nodes.
    pub max_nodes: u32,
    /// No node may be expanded past this depth.
    pub max_depth: u32,
    /// Unused directly by the selection rule (kept for API symmetry with
    /// the merge-probe prompt threshold a caller may want to tune); merging
    /// itself is decided by the model probe, not a numeric threshold here.
    pub merge_threshold: f64,
    /// A thought scoring below this is marked terminal (dead end).
    pub min_score: f64,
    /// Sampling temperature for action-generation and evaluator prompts.
    pub temperature: f64,
    /// Whether same-depth thoughts can be merged into one node.
    pub enable_merging: bool,
    /// Whether tool actions are permitted at all.
    pub enable_tools: bool,
    /// Maximum number of tool calls across the whole run.
    pub max_tool_calls: u32,
    /// Tool names the model is allowed to invoke; empty means "all enabled
    /// tools in the registry".
    pub enabled_tools: Vec<String>,
}

impl Default for GotParams {
    fn default() -> Self {
        Self {
            branching_factor: 3,
            max_nodes: 15,
            max_depth: 5,
            merge_threshold: 0.8,
            min_score: 0.3,
            temperature: 0.7,
            enable_merging: true,
            enable_tools: false,
            max_tool_calls: 5,
            enabled_tools: Vec::new(),
        }
    }
}
