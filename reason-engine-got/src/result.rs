//! The outcome of a [`crate::engine::GotEngine::reason`] run.

use crate::node::GotNode;

/// A snapshot of a completed (or exhausted) graph-of-thoughts run.
#[derive(Debug, Clone)]
pub struct GotResult {
    /// The final answer text.
    pub answer: String,
    /// Whether `answer` came from a node the model explicitly marked as a
    /// solution (`true`), versus the exhaustion-path summarization call
    /// (`false`).
    pub is_solution: bool,
    /// The canonical path (root to the node `answer` was derived from).
    pub path: Vec<String>,
    /// Every node created during the run.
    pub nodes: Vec<GotNode>,
    /// Total nodes created.
    pub node_count: usize,
}
