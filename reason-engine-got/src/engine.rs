//! The Graph-of-Thoughts engine itself (C10, §4.9).

use std::sync::Arc;

use reason_events::{Event, EventType, StreamingManager};
use reason_provider::{ChatMessage, ChatOptions, FallbackChain};
use reason_tools::ToolRegistry;
use tokio_util::sync::CancellationToken;

use crate::error::GotError;
use crate::graph::Graph;
use crate::node::{NodeKind, ToolCall};
use crate::params::GotParams;
use crate::prompts::{
    build_action_prompt, build_evaluation_prompt, build_final_answer_prompt, build_merge_probe_prompt,
    parse_actions, parse_evaluation, parse_merge_probe, Action,
};
use crate::result::GotResult;

/// Mean-path-score at or above which a solution node short-circuits the
/// run instead of continuing to expand (§4.9 step 3, §8 "Early-exit law").
const SOLUTION_SHORT_CIRCUIT_SCORE: f64 = 0.85;

/// Drives one graph-of-thoughts run end to end: UCB1-guided expansion,
/// optional tool use, model-probed merging, and backpropagation.
///
/// Holds an `Arc<FallbackChain>` rather than being generic over `Provider` —
/// every caller already has a chain (a single provider collapses into a
/// one-element chain, §3), and threading a `P: Provider` type parameter
/// through three engine crates buys nothing since `FallbackChain` already
/// type-erases via [`reason_provider::DynProvider`] (§9 "Polymorphism").
pub struct GotEngine {
    provider: Arc<FallbackChain>,
    tools: Arc<ToolRegistry>,
    events: Arc<StreamingManager>,
    params: GotParams,
}

impl GotEngine {
    /// Build an engine for one run.
    #[must_use]
    pub fn new(
        provider: Arc<FallbackChain>,
        tools: Arc<ToolRegistry>,
        events: Arc<StreamingManager>,
        params: GotParams,
    ) -> Self {
        Self {
            provider,
            tools,
            events,
            params,
        }
    }

    async fn call_model(
        &self,
        prompt: &str,
        temperature: f64,
        cancel: &CancellationToken,
    ) -> Result<String, reason_provider::ProviderError> {
        let messages = [ChatMessage::user(prompt)];
        let options = ChatOptions {
            temperature: Some(temperature),
            ..Default::default()
        };
        let mut on_token = |fragment: &str| self.events.token(fragment);
        let response = self.provider.chat_stream(&messages, options, &mut on_token, cancel).await?;
        Ok(response.content)
    }

    /// Run the graph-of-thoughts search to completion.
    ///
    /// # Errors
    ///
    /// [`GotError::Cancelled`] if `cancel` fires mid-run; [`GotError::FinalAnswerFailed`]
    /// if the loop exhausts without a solution and the summarization call
    /// itself fails on every provider in the chain.
    pub async fn reason(&self, problem: &str, cancel: CancellationToken) -> Result<GotResult, GotError> {
        let graph = Graph::new();
        let root = graph.insert_root(problem);
        self.events.push(Event::new(EventType::Progress).with_node_id(root.clone()).with_total_nodes(1));

        let mut tool_calls_used: u32 = 0;
        let mut best: Option<(String, Vec<String>, f64, bool)> = None; // (node_id, path, score, is_solution)

        'expansion: while (graph.len() as u32) < self.params.max_nodes {
            if cancel.is_cancelled() {
                return Err(GotError::Cancelled);
            }

            let candidates = graph.expansion_candidates(self.params.max_depth);
            if candidates.is_empty() {
                break;
            }
            let total_visits = graph.len() as u32;
            let Some(selected) = crate::ucb::select_best(&candidates, total_visits) else {
                break;
            };
            let selected = selected.clone();

            let tool_names: Vec<String> = if self.params.enable_tools {
                if self.params.enabled_tools.is_empty() {
                    self.tools.names()
                } else {
                    self.params.enabled_tools.clone()
                }
            } else {
                Vec::new()
            };

            let prompt = build_action_prompt(
                problem,
                &selected.content,
                selected.depth,
                self.params.branching_factor,
                &tool_names,
            );
            let raw = match self.call_model(&prompt, self.params.temperature, &cancel).await {
                Ok(text) => text,
                Err(reason_provider::ProviderError::Cancelled) if cancel.is_cancelled() => {
                    return Err(GotError::Cancelled);
                }
                Err(err) => {
                    tracing::debug!(node = %selected.id, error = %err, "action generation failed, abandoning node");
                    self.events.push(Event::new(EventType::Error).with_content(err.to_string()));
                    graph.mark_terminal(&selected.id);
                    continue;
                }
            };
            let actions = parse_actions(&raw);

            for action in actions.into_iter().take(self.params.branching_factor as usize) {
                if cancel.is_cancelled() {
                    return Err(GotError::Cancelled);
                }
                if (graph.len() as u32) >= self.params.max_nodes {
                    break 'expansion;
                }

                match action {
                    Action::Thought(content) => {
                        if let Some((node_id, score, is_solution)) = self
                            .expand_thought(&graph, problem, &selected.id, selected.depth, content, &cancel)
                            .await
                        {
                            self.track_best(&graph, &mut best, &node_id, score, is_solution);
                            if is_solution && score >= SOLUTION_SHORT_CIRCUIT_SCORE {
                                break 'expansion;
                            }
                        }
                    }
                    Action::Tool { name, input } => {
                        if !self.params.enable_tools || tool_calls_used >= self.params.max_tool_calls {
                            continue;
                        }
                        if !self.params.enabled_tools.is_empty()
                            && !self.params.enabled_tools.iter().any(|n| n == &name)
                        {
                            continue;
                        }
                        tool_calls_used += 1;
                        let node_id = self.expand_tool(&graph, &selected.id, name, input, cancel.clone()).await;
                        self.track_best(&graph, &mut best, &node_id, graph.get(&node_id).map_or(0.0, |n| n.score), false);
                    }
                }
            }
        }

        if let Some((node_id, path, score, true)) = best {
            let answer = graph.get(&node_id).and_then(|n| n.answer).unwrap_or_default();
            self.events.push(
                Event::new(EventType::Solution)
                    .with_node_id(node_id)
                    .with_score(score)
                    .with_is_solution(true)
                    .with_final_answer(answer.clone()),
            );
            return Ok(GotResult {
                answer,
                is_solution: true,
                path,
                nodes: graph.snapshot(),
                node_count: graph.len(),
            });
        }

        let fallback_path_id = self.best_effort_node(&graph, &best);
        let path_ids = graph.path_to(&fallback_path_id);
        let path_contents: Vec<String> = path_ids.iter().filter_map(|id| graph.get(id)).map(|n| n.content).collect();
        let prompt = build_final_answer_prompt(problem, &path_contents);
        let answer = self
            .call_model(&prompt, 0.3, &cancel)
            .await
            .map_err(|e| GotError::FinalAnswerFailed(e.to_string()))?;

        self.events.push(
            Event::new(EventType::Solution)
                .with_node_id(fallback_path_id)
                .with_is_solution(false)
                .with_final_answer(answer.clone()),
        );

        Ok(GotResult {
            answer,
            is_solution: false,
            path: path_ids,
            nodes: graph.snapshot(),
            node_count: graph.len(),
        })
    }

    fn best_effort_node(&self, graph: &Graph, best: &Option<(String, Vec<String>, f64, bool)>) -> String {
        if let Some((id, _, _, _)) = best {
            return id.clone();
        }
        graph
            .snapshot()
            .into_iter()
            .max_by(|a, b| a.score.total_cmp(&b.score))
            .map(|n| n.id)
            .unwrap_or_default()
    }

    fn track_best(
        &self,
        graph: &Graph,
        best: &mut Option<(String, Vec<String>, f64, bool)>,
        node_id: &str,
        score: f64,
        is_solution: bool,
    ) {
        let better = match best {
            None => true,
            Some((_, _, best_score, best_is_solution)) => {
                (is_solution && !*best_is_solution) || (is_solution == *best_is_solution && score > *best_score)
            }
        };
        if better {
            *best = Some((node_id.to_string(), graph.path_to(node_id), score, is_solution));
        }
    }

    /// Generate, evaluate, merge-probe, and insert a single thought action;
    /// returns `(node_id, score, is_solution)` for the surviving node (the
    /// newly created one, or the node it was merged into).
    async fn expand_thought(
        &self,
        graph: &Graph,
        problem: &str,
        parent_id: &str,
        parent_depth: u32,
        content: String,
        cancel: &CancellationToken,
    ) -> Option<(String, f64, bool)> {
        let eval_prompt = build_evaluation_prompt(problem, &content);
        let eval_raw = self.call_model(&eval_prompt, 0.0, cancel).await.ok()?;
        let evaluation = parse_evaluation(&eval_raw);
        let score = evaluation.score.clamp(0.0, 1.0);
        let is_terminal = score < self.params.min_score && !evaluation.is_solution;

        let new_id = graph.insert_child(
            parent_id,
            NodeKind::Thought,
            content.clone(),
            score,
            is_terminal,
            evaluation.is_solution,
            evaluation.answer.clone(),
            None,
            None,
        );
        self.events.push(
            Event::new(EventType::Thought)
                .with_node_id(new_id.clone())
                .with_depth(parent_depth + 1)
                .with_score(score)
                .with_total_nodes(graph.len()),
        );
        graph.backpropagate(&new_id, score);

        if !self.params.enable_merging || evaluation.is_solution {
            return Some((new_id, score, evaluation.is_solution));
        }

        let target_depth = parent_depth + 1;
        let siblings: Vec<_> = graph
            .snapshot()
            .into_iter()
            .filter(|n| n.id != new_id && n.depth == target_depth && n.kind == NodeKind::Thought && !n.is_solution)
            .collect();

        for sibling in siblings {
            let probe_prompt = build_merge_probe_prompt(&sibling.content, &content);
            let Ok(probe_raw) = self.call_model(&probe_prompt, 0.0, cancel).await else {
                continue;
            };
            if parse_merge_probe(&probe_raw) {
                graph.merge_into(&sibling.id, parent_id, &new_id);
                graph.mark_terminal(&new_id);
                self.events.push(
                    Event::new(EventType::Merge)
                        .with_node_id(sibling.id.clone())
                        .with_content(new_id.clone()),
                );
                return Some((sibling.id, sibling.score, false));
            }
        }

        Some((new_id, score, false))
    }

    async fn expand_tool(
        &self,
        graph: &Graph,
        parent_id: &str,
        name: String,
        input: serde_json::Value,
        cancel: CancellationToken,
    ) -> String {
        let outcome = self.tools.execute(cancel, &name, input.clone()).await;
        let (content, score, is_terminal) = if outcome.success {
            (outcome.output.clone().unwrap_or_default(), 0.7, false)
        } else {
            (outcome.error_text.clone().unwrap_or_default(), 0.2, true)
        };

        let node_id = graph.insert_child(
            parent_id,
            NodeKind::Tool,
            content.clone(),
            score,
            is_terminal,
            false,
            None,
            Some(ToolCall { name: name.clone(), input }),
            Some(content.clone()),
        );
        self.events.push(
            Event::new(EventType::Tool)
                .with_node_id(node_id.clone())
                .with_tool(name, outcome.input, content),
        );
        graph.backpropagate(&node_id, score);
        node_id
    }
}
