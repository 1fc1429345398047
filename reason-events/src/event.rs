//! Event record shape (§3 "Event").

use serde::{Deserialize, Serialize};

/// The kind of an [`Event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// A generated thought/reasoning step.
    Thought,
    /// A scored evaluation of a node.
    Evaluation,
    /// Two nodes were merged.
    Merge,
    /// A candidate or final solution was produced.
    Solution,
    /// A recoverable error occurred mid-run.
    Error,
    /// A coarse-grained progress update.
    Progress,
    /// A single streamed text fragment.
    Token,
    /// A tool was invoked.
    Tool,
}

/// A single timestamped event in a run's history (§3).
///
/// Every field beyond `elapsed_ms` and `event_type` is optional: which ones
/// are populated depends on the event type (a `Token` event sets `content`
/// only; a `Tool` event sets the tool fields; and so on).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Milliseconds elapsed since the run's `StreamingManager` was created.
    pub elapsed_ms: u64,
    /// The kind of event.
    pub event_type: EventType,
    /// Node this event pertains to, for graph-of-thoughts style engines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    /// Free-text payload (a thought, an error message, a token fragment).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Evaluation score, when this is an `Evaluation` or `Solution` event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Search depth at which this event occurred.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
    /// Total nodes expanded so far, for progress reporting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_nodes: Option<usize>,
    /// Whether the node this event pertains to is a solution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_solution: Option<bool>,
    /// The final answer text, set only on the terminal `Solution` event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_answer: Option<String>,
    /// Name of the tool invoked, for `Tool` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Input passed to the tool, for `Tool` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_input: Option<serde_json::Value>,
    /// Output produced by the tool, for `Tool` events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_output: Option<String>,
}

impl Event {
    /// Build a bare event of the given type with every optional field unset.
    /// `elapsed_ms` is filled in by [`crate::StreamingManager::push`].
    #[must_use]
    pub fn new(event_type: EventType) -> Self {
        Self {
            elapsed_ms: 0,
            event_type,
            node_id: None,
            content: None,
            score: None,
            depth: None,
            total_nodes: None,
            is_solution: None,
            final_answer: None,
            tool_name: None,
            tool_input: None,
            tool_output: None,
        }
    }

    /// Set `content`.
    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    /// Set `node_id`.
    #[must_use]
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Set `score`.
    #[must_use]
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Set `depth`.
    #[must_use]
    pub fn with_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Set `total_nodes`.
    #[must_use]
    pub fn with_total_nodes(mut self, total_nodes: usize) -> Self {
        self.total_nodes = Some(total_nodes);
        self
    }

    /// Set `is_solution`.
    #[must_use]
    pub fn with_is_solution(mut self, is_solution: bool) -> Self {
        self.is_solution = Some(is_solution);
        self
    }

    /// Set `final_answer`.
    #[must_use]
    pub fn with_final_answer(mut self, final_answer: impl Into<String>) -> Self {
        self.final_answer = Some(final_answer.into());
        self
    }

    /// Set the tool fields.
    #[must_use]
    pub fn with_tool(
        mut self,
        name: impl Into<String>,
        input: serde_json::Value,
        output: impl Into<String>,
    ) -> Self {
        self.tool_name = Some(name.into());
        self.tool_input = Some(input);
        self.tool_output = Some(output.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_only_requested_fields() {
        let e = Event::new(EventType::Thought).with_content("hmm").with_depth(2);
        assert_eq!(e.content.as_deref(), Some("hmm"));
        assert_eq!(e.depth, Some(2));
        assert!(e.score.is_none());
        assert!(e.tool_name.is_none());
    }

    #[test]
    fn tool_event_sets_all_three_tool_fields() {
        let e = Event::new(EventType::Tool).with_tool("calculator", serde_json::json!({"a": 1}), "2");
        assert_eq!(e.tool_name.as_deref(), Some("calculator"));
        assert_eq!(e.tool_output.as_deref(), Some("2"));
        assert_eq!(e.tool_input, Some(serde_json::json!({"a": 1})));
    }
}
