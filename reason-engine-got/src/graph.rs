//! The graph-of-thoughts DAG itself: storage, expansion, merging, and
//! backpropagation (§4.9).

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::node::{GotNode, NodeKind, ToolCall};

/// The arena holding every node created during one run.
///
/// Uses a plain [`std::sync::RwLock`] rather than an async lock: §5 states
/// node creation within one run is strictly sequential (there is never a
/// second task racing to mutate the graph across an `.await`), so a
/// synchronous lock held only across short, non-blocking sections is
/// sufficient and lets callers take cheap synchronous snapshots.
pub struct Graph {
    nodes: RwLock<HashMap<String, GotNode>>,
    next_id: AtomicU64,
}

impl Graph {
    /// Create an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    fn fresh_id(&self) -> String {
        format!("n{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Insert the root node (the problem statement), depth 0.
    pub fn insert_root(&self, problem: &str) -> String {
        let id = self.fresh_id();
        let node = GotNode::root(id.clone(), problem);
        self.nodes.write().expect("graph lock poisoned").insert(id.clone(), node);
        id
    }

    /// Insert a new child node under `parent_id`.
    #[allow(clippy::too_many_arguments)]
    pub fn insert_child(
        &self,
        parent_id: &str,
        kind: NodeKind,
        content: String,
        score: f64,
        is_terminal: bool,
        is_solution: bool,
        answer: Option<String>,
        tool_call: Option<ToolCall>,
        tool_result: Option<String>,
    ) -> String {
        let id = self.fresh_id();
        let mut guard = self.nodes.write().expect("graph lock poisoned");
        let parent_depth = guard.get(parent_id).map_or(0, |p| p.depth);
        let node = GotNode {
            id: id.clone(),
            kind,
            content,
            depth: parent_depth + 1,
            score,
            visits: 1,
            total_reward: score,
            parents: vec![parent_id.to_string()],
            children: Vec::new(),
            is_terminal,
            is_solution,
            answer,
            merged_from: Vec::new(),
            tool_call,
            tool_result,
        };
        guard.insert(id.clone(), node);
        if let Some(parent) = guard.get_mut(parent_id) {
            parent.children.push(id.clone());
        }
        id
    }

    /// Merge a freshly generated thought into an existing same-depth node
    /// instead of creating a new sibling, per the merge-probe decision
    /// (§4.9 step 2c, §8 "Merge law"). Adds `new_parent_id` to the existing
    /// node's parent set (if not already present), records the absorbed
    /// thought's id in `merged_from`, bumps `visits`, and nudges `score`
    /// upward by a small fixed bonus capped at 1.0.
    pub fn merge_into(&self, existing_id: &str, new_parent_id: &str, absorbed_id: &str) {
        let mut guard = self.nodes.write().expect("graph lock poisoned");
        if let Some(node) = guard.get_mut(existing_id) {
            if !node.parents.iter().any(|p| p == new_parent_id) {
                node.parents.push(new_parent_id.to_string());
            }
            if !node.merged_from.iter().any(|m| m == absorbed_id) {
                node.merged_from.push(absorbed_id.to_string());
            }
            node.visits += 1;
            node.score = (node.score + 0.05).min(1.0);
        }
        if let Some(parent) = guard.get_mut(new_parent_id) {
            if !parent.children.iter().any(|c| c == existing_id) {
                parent.children.push(existing_id.to_string());
            }
        }
    }

    /// Backpropagate a reward up from `node_id` through every ancestor,
    /// visiting each ancestor at most once even when multiple parent paths
    /// reach it (§4.9 step 4, §8 "Backprop law").
    pub fn backpropagate(&self, node_id: &str, reward: f64) {
        let mut guard = self.nodes.write().expect("graph lock poisoned");
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = guard
            .get(node_id)
            .map(|n| n.parents.clone())
            .unwrap_or_default()
            .into();

        while let Some(id) = queue.pop_front() {
            if !seen.insert(id.clone()) {
                continue;
            }
            let parents = if let Some(node) = guard.get_mut(&id) {
                node.visits += 1;
                node.total_reward += reward;
                node.parents.clone()
            } else {
                Vec::new()
            };
            for parent in parents {
                if !seen.contains(&parent) {
                    queue.push_back(parent);
                }
            }
        }
    }

    /// Mark a node terminal, removing it from future expansion candidates.
    /// Used when a freshly created node's thought turns out to duplicate an
    /// existing one and gets merged into it instead of explored on its own.
    pub fn mark_terminal(&self, id: &str) {
        if let Some(node) = self.nodes.write().expect("graph lock poisoned").get_mut(id) {
            node.is_terminal = true;
        }
    }

    /// Clone of a single node, by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<GotNode> {
        self.nodes.read().expect("graph lock poisoned").get(id).cloned()
    }

    /// Nodes eligible for expansion: not terminal, not already a solution,
    /// and within `max_depth`.
    #[must_use]
    pub fn expansion_candidates(&self, max_depth: u32) -> Vec<GotNode> {
        self.nodes
            .read()
            .expect("graph lock poisoned")
            .values()
            .filter(|n| !n.is_terminal && !n.is_solution && n.depth < max_depth)
            .cloned()
            .collect()
    }

    /// The canonical path from the root to `node_id`, following each node's
    /// first (canonical) parent only (§3 "GoT node", "first parent defines
    /// the canonical path").
    #[must_use]
    pub fn path_to(&self, node_id: &str) -> Vec<String> {
        let guard = self.nodes.read().expect("graph lock poisoned");
        let mut path = vec![node_id.to_string()];
        let mut current = node_id.to_string();
        while let Some(node) = guard.get(&current) {
            let Some(parent) = node.parents.first() else {
                break;
            };
            path.push(parent.clone());
            current = parent.clone();
        }
        path.reverse();
        path
    }

    /// Total node count. Doubles as the run's `total_visits` term for UCB1
    /// (§4.9: every node creation increments this in lockstep with the
    /// root's initial visit count) and as the `max_nodes` termination test.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.read().expect("graph lock poisoned").len()
    }

    /// Whether the graph holds no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A snapshot of every node, for result reporting.
    #[must_use]
    pub fn snapshot(&self) -> Vec<GotNode> {
        self.nodes.read().expect("graph lock poisoned").values().cloned().collect()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_has_depth_zero_and_one_visit() {
        let g = Graph::new();
        let root = g.insert_root("problem");
        let node = g.get(&root).unwrap();
        assert_eq!(node.depth, 0);
        assert_eq!(node.visits, 1);
        assert!(node.parents.is_empty());
    }

    #[test]
    fn child_depth_is_parent_depth_plus_one() {
        let g = Graph::new();
        let root = g.insert_root("p");
        let child = g.insert_child(&root, NodeKind::Thought, "t".into(), 0.5, false, false, None, None, None);
        assert_eq!(g.get(&child).unwrap().depth, 1);
        assert_eq!(g.get(&root).unwrap().children, vec![child.clone()]);
        assert_eq!(g.get(&child).unwrap().parents, vec![root]);
    }

    #[test]
    fn backpropagate_visits_each_ancestor_once_across_multiple_parents() {
        let g = Graph::new();
        let root = g.insert_root("p");
        let a = g.insert_child(&root, NodeKind::Thought, "a".into(), 0.5, false, false, None, None, None);
        let b = g.insert_child(&root, NodeKind::Thought, "b".into(), 0.5, false, false, None, None, None);
        let merged = g.insert_child(&a, NodeKind::Thought, "m".into(), 0.5, false, false, None, None, None);
        g.merge_into(&merged, &b, &merged);

        let root_visits_before = g.get(&root).unwrap().visits;
        g.backpropagate(&merged, 1.0);
        let root_visits_after = g.get(&root).unwrap().visits;
        assert_eq!(root_visits_after, root_visits_before + 1);
    }

    #[test]
    fn merge_into_unions_parents_and_bumps_score_capped_at_one() {
        let g = Graph::new();
        let root = g.insert_root("p");
        let a = g.insert_child(&root, NodeKind::Thought, "a".into(), 0.99, false, false, None, None, None);
        let b = g.insert_child(&root, NodeKind::Thought, "b".into(), 0.5, false, false, None, None, None);
        g.merge_into(&a, &b, "absorbed");
        let node = g.get(&a).unwrap();
        assert!(node.parents.contains(&root));
        assert!(node.parents.contains(&b));
        assert_eq!(node.merged_from, vec!["absorbed".to_string()]);
        assert!((node.score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn path_to_follows_first_parent_only() {
        let g = Graph::new();
        let root = g.insert_root("p");
        let a = g.insert_child(&root, NodeKind::Thought, "a".into(), 0.5, false, false, None, None, None);
        let b = g.insert_child(&a, NodeKind::Thought, "b".into(), 0.5, false, false, None, None, None);
        assert_eq!(g.path_to(&b), vec![root, a, b]);
    }

    #[test]
    fn expansion_candidates_excludes_terminal_solution_and_over_depth() {
        let g = Graph::new();
        let root = g.insert_root("p");
        let terminal = g.insert_child(&root, NodeKind::Thought, "t".into(), 0.1, true, false, None, None, None);
        let solved = g.insert_child(&root, NodeKind::Thought, "s".into(), 0.9, false, true, Some("ans".into()), None, None);
        let ok = g.insert_child(&root, NodeKind::Thought, "o".into(), 0.5, false, false, None, None, None);
        let candidates = g.expansion_candidates(5);
        let ids: HashSet<_> = candidates.iter().map(|n| n.id.clone()).collect();
        assert!(ids.contains(&ok));
        assert!(ids.contains(&root));
        assert!(!ids.contains(&terminal));
        assert!(!ids.contains(&solved));
    }

    #[test]
    fn len_tracks_node_count() {
        let g = Graph::new();
        let root = g.insert_root("p");
        assert_eq!(g.len(), 1);
        g.insert_child(&root, NodeKind::Thought, "a".into(), 0.5, false, false, None, None, None);
        assert_eq!(g.len(), 2);
    }
}
