//! GoT node shape (§3 "GoT node").

use serde::{Deserialize, Serialize};

/// What produced a node's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// A reasoning step generated by the model.
    Thought,
    /// The result of invoking a built-in tool.
    Tool,
}

/// A tool invocation attached to a [`NodeKind::Tool`] node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Name of the invoked tool.
    pub name: String,
    /// Input passed to the tool.
    pub input: serde_json::Value,
}

/// One node in the graph-of-thoughts DAG (§3 "GoT node").
///
/// Invariants enforced by [`crate::graph::Graph`]: a non-root node has at
/// least one parent; `depth(c) == depth(first_parent) + 1`; the graph is
/// acyclic; `children`/`parents` stay mutually consistent; a node carries
/// `merged_from` entries iff it has absorbed at least one additional
/// expansion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GotNode {
    /// Stable id, unique within one run's graph.
    pub id: String,
    /// What produced this node.
    pub kind: NodeKind,
    /// The thought text, or the tool's output text for a tool node.
    pub content: String,
    /// Search depth; 0 for the root.
    pub depth: u32,
    /// Current score in `[0, 1]`.
    pub score: f64,
    /// Number of times this node has been touched by backpropagation
    /// (root starts at 1).
    pub visits: u32,
    /// Sum of backpropagated rewards, used for the UCB1 mean term.
    pub total_reward: f64,
    /// Ids of this node's parents. The first entry is the *canonical*
    /// parent: the one whose depth+1 defines this node's depth, and the
    /// one [`crate::graph::Graph::path_to`] walks.
    pub parents: Vec<String>,
    /// Ids of this node's children.
    pub children: Vec<String>,
    /// Whether this node has no outgoing expansions (dead end, solution,
    /// or at max depth).
    pub is_terminal: bool,
    /// Whether this node represents a solution to the original problem.
    pub is_solution: bool,
    /// The final-answer text, set only when `is_solution`.
    pub answer: Option<String>,
    /// Ids of additional thoughts absorbed into this node via merging.
    pub merged_from: Vec<String>,
    /// The tool call this node represents, for [`NodeKind::Tool`] nodes.
    pub tool_call: Option<ToolCall>,
    /// The raw tool result text, for [`NodeKind::Tool`] nodes.
    pub tool_result: Option<String>,
}

impl GotNode {
    pub(crate) fn root(id: String, problem: &str) -> Self {
        Self {
            id,
            kind: NodeKind::Thought,
            content: problem.to_string(),
            depth: 0,
            score: 1.0,
            visits: 1,
            total_reward: 1.0,
            parents: Vec::new(),
            children: Vec::new(),
            is_terminal: false,
            is_solution: false,
            answer: None,
            merged_from: Vec::new(),
            tool_call: None,
            tool_result: None,
        }
    }
}
