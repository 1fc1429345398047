//! UCB1 node selection with a merge bonus (§4.9 step 1, §8 "Selection law").

use crate::node::GotNode;

/// Exploration constant `sqrt(2)`, the textbook UCB1 default.
const EXPLORATION: f64 = std::f64::consts::SQRT_2;

/// Bonus added per absorbed merge, rewarding nodes that have accumulated
/// converging lines of reasoning.
const MERGE_BONUS: f64 = 0.1;

/// Score a node for selection. An unvisited node (`visits == 0`, never
/// actually produced since every node is created with `visits >= 1`, but
/// guarded defensively) scores `+infinity` so it is always explored first.
#[must_use]
pub fn ucb1(node: &GotNode, total_visits: u32) -> f64 {
    if node.visits == 0 {
        return f64::INFINITY;
    }
    let mean_reward = node.total_reward / f64::from(node.visits);
    let exploration = EXPLORATION * ((total_visits.max(1) as f64).ln() / f64::from(node.visits)).sqrt();
    let merge_bonus = MERGE_BONUS * node.merged_from.len() as f64;
    mean_reward + exploration + merge_bonus
}

/// Pick the highest-UCB1-scoring node among `candidates`. Returns `None` for
/// an empty slice. Ties resolve to the first candidate with the max score
/// (`candidates` order is the iteration order the caller supplied).
#[must_use]
pub fn select_best<'a>(candidates: &'a [GotNode], total_visits: u32) -> Option<&'a GotNode> {
    candidates
        .iter()
        .max_by(|a, b| ucb1(a, total_visits).total_cmp(&ucb1(b, total_visits)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn node(visits: u32, total_reward: f64, merged_from: usize) -> GotNode {
        GotNode {
            id: "n".into(),
            kind: NodeKind::Thought,
            content: String::new(),
            depth: 1,
            score: 0.0,
            visits,
            total_reward,
            parents: vec!["root".into()],
            children: Vec::new(),
            is_terminal: false,
            is_solution: false,
            answer: None,
            merged_from: vec!["x".to_string(); merged_from],
            tool_call: None,
            tool_result: None,
        }
    }

    #[test]
    fn higher_mean_reward_wins_all_else_equal() {
        let low = node(5, 1.0, 0);
        let high = node(5, 4.0, 0);
        assert!(ucb1(&high, 10) > ucb1(&low, 10));
    }

    #[test]
    fn fewer_visits_gets_more_exploration_credit() {
        let rarely_visited = node(1, 0.5, 0);
        let often_visited = node(20, 10.0, 0);
        let rarely_ucb = ucb1(&rarely_visited, 20);
        let often_ucb = ucb1(&often_visited, 20);
        assert!(rarely_ucb > 0.0);
        assert!(often_ucb > 0.0);
    }

    #[test]
    fn merge_bonus_increases_score() {
        let plain = node(5, 2.0, 0);
        let merged = node(5, 2.0, 3);
        assert!(ucb1(&merged, 10) > ucb1(&plain, 10));
    }

    #[test]
    fn select_best_picks_max_and_none_on_empty() {
        let candidates = vec![node(5, 1.0, 0), node(5, 4.0, 0)];
        let best = select_best(&candidates, 10).unwrap();
        assert!((best.total_reward - 4.0).abs() < 1e-9);
        assert!(select_best(&[], 10).is_none());
    }
}
