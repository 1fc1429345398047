//! The Reflexion engine itself (C11, §4.10).

use std::sync::Arc;

use reason_events::{Event, EventType, StreamingManager};
use reason_memory::MemoryStore;
use reason_provider::{ChatMessage, ChatOptions, FallbackChain};
use reason_tools::ToolRegistry;
use tokio_util::sync::CancellationToken;

use crate::error::ReflexionError;
use crate::params::ReflexionParams;
use crate::prompts::{
    build_evaluation_prompt, build_force_final_prompt, build_reflection_prompt, build_step_prompt, parse_evaluation,
    parse_step, AttemptStep,
};
use crate::result::{AttemptRecord, ReflexionResult};

/// Drives one reflexion run: attempt, evaluate, reflect, retry — optionally
/// consulting cross-run episodic memory for lessons up front and always
/// recording each attempt as a new episode (§4.8, §4.10).
///
/// Like [`reason_engine_got::GotEngine`], holds an `Arc<FallbackChain>`
/// rather than being generic over `Provider` (§9 "Polymorphism").
pub struct ReflexionEngine {
    provider: Arc<FallbackChain>,
    tools: Arc<ToolRegistry>,
    events: Arc<StreamingManager>,
    memory: Option<Arc<MemoryStore>>,
    params: ReflexionParams,
}

impl ReflexionEngine {
    /// Build an engine for one run. `memory` is `None` to run without
    /// cross-run learning entirely (distinct from `params.use_memory =
    /// false`, which skips the lookup but still stores this run's episodes
    /// if a store is present).
    #[must_use]
    pub fn new(
        provider: Arc<FallbackChain>,
        tools: Arc<ToolRegistry>,
        events: Arc<StreamingManager>,
        memory: Option<Arc<MemoryStore>>,
        params: ReflexionParams,
    ) -> Self {
        Self {
            provider,
            tools,
            events,
            memory,
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

    /// Run one attempt's inner reasoning loop (§4.10 step 3a): up to
    /// `max_thoughts_per_attempt` iterations, each prompting the model for
    /// one JSON step — a thought (optionally final) or a tool action whose
    /// output is spliced back into the next iteration's prompt. Returns the
    /// thought trail recorded for this attempt, the full trail (thoughts
    /// interleaved with tool results, used to render the prompt and any
    /// forced-final fallback), and the final answer if a step declared one.
    ///
    /// `hard_failure` is set when a model call failed and nothing at all —
    /// not even a prior attempt or an earlier step this attempt — has been
    /// produced yet; callers propagate that as [`ReflexionError::AttemptFailed`].
    async fn run_inner_loop(
        &self,
        problem: &str,
        lessons: &[String],
        prior_reflections: &[String],
        any_attempts_completed: bool,
        cancel: &CancellationToken,
    ) -> Result<(Vec<String>, Vec<String>, Option<String>), reason_provider::ProviderError> {
        let tool_names: Vec<String> = if self.params.enable_tools {
            if self.params.enabled_tools.is_empty() {
                self.tools.names()
            } else {
                self.params.enabled_tools.clone()
            }
        } else {
            Vec::new()
        };

        let max_steps = self.params.max_thoughts_per_attempt.max(1);
        let mut thoughts: Vec<String> = Vec::new();
        let mut trail: Vec<String> = Vec::new();
        let mut tool_calls_used: u32 = 0;
        let mut final_answer: Option<String> = None;

        for step in 1..=max_steps {
            if cancel.is_cancelled() {
                return Err(reason_provider::ProviderError::Cancelled);
            }

            let prompt = build_step_prompt(problem, lessons, prior_reflections, &trail, step, max_steps, &tool_names);
            let raw = match self.call_model(&prompt, self.params.temperature, cancel).await {
                Ok(text) => text,
                Err(err) => {
                    if !any_attempts_completed && thoughts.is_empty() && trail.is_empty() {
                        return Err(err);
                    }
                    self.events.push(Event::new(EventType::Error).with_content(err.to_string()));
                    break;
                }
            };

            match parse_step(&raw) {
                AttemptStep::Tool { name, input } => {
                    let permitted = self.params.enable_tools
                        && tool_calls_used < self.params.max_tool_calls_per_attempt
                        && (self.params.enabled_tools.is_empty() || self.params.enabled_tools.iter().any(|n| n == &name));
                    if !permitted {
                        trail.push(format!("(tool call to {name} was not permitted this attempt)"));
                        continue;
                    }
                    tool_calls_used += 1;
                    let outcome = self.tools.execute(cancel.clone(), &name, input.clone()).await;
                    self.events.push(
                        Event::new(EventType::Tool).with_tool(
                            name.clone(),
                            outcome.input.clone(),
                            outcome.output.clone().or_else(|| outcome.error_text.clone()).unwrap_or_default(),
                        ),
                    );
                    let text = if outcome.success {
                        outcome.output.unwrap_or_default()
                    } else {
                        format!("error: {}", outcome.error_text.unwrap_or_default())
                    };
                    trail.push(format!("tool {name}({input}) -> {text}"));
                }
                AttemptStep::Thought { thought, is_final, answer } => {
                    self.events.push(Event::new(EventType::Thought).with_content(thought.clone()).with_depth(step));
                    thoughts.push(thought.clone());
                    trail.push(thought.clone());
                    if is_final {
                        final_answer = Some(answer.unwrap_or(thought));
                        break;
                    }
                }
            }
        }

        if final_answer.is_none() {
            let force_prompt = build_force_final_prompt(problem, &trail);
            if let Ok(text) = self.call_model(&force_prompt, self.params.temperature, cancel).await {
                final_answer = Some(text.trim().to_string());
            }
        }

        Ok((thoughts, trail, final_answer))
    }

    /// Run the attempt/evaluate/reflect loop to completion.
    ///
    /// # Errors
    ///
    /// [`ReflexionError::Cancelled`] if `cancel` fires mid-run;
    /// [`ReflexionError::AttemptFailed`] if every provider in the chain
    /// fails on the very first attempt (there is nothing yet to fall back
    /// to); [`ReflexionError::Memory`] if the episodic store errors while
    /// loading lessons or persisting an episode.
    pub async fn reason(&self, problem: &str, cancel: CancellationToken) -> Result<ReflexionResult, ReflexionError> {
        let lessons = match (&self.memory, self.params.use_memory) {
            (Some(store), true) => store.past_lessons(problem).await,
            _ => Vec::new(),
        };

        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut prior_reflections: Vec<String> = Vec::new();

        for attempt_number in 1..=self.params.max_attempts {
            if cancel.is_cancelled() {
                return Err(ReflexionError::Cancelled);
            }

            let (thoughts, _trail, final_answer) = match self
                .run_inner_loop(problem, &lessons, &prior_reflections, !attempts.is_empty(), &cancel)
                .await
            {
                Ok(outcome) => outcome,
                Err(reason_provider::ProviderError::Cancelled) if cancel.is_cancelled() => {
                    return Err(ReflexionError::Cancelled);
                }
                Err(err) => return Err(ReflexionError::AttemptFailed(err.to_string())),
            };
            let answer = final_answer.unwrap_or_else(|| thoughts.last().cloned().unwrap_or_default());

            if cancel.is_cancelled() {
                return Err(ReflexionError::Cancelled);
            }
            let eval_prompt = build_evaluation_prompt(problem, &answer);
            let judgment = match self.call_model(&eval_prompt, 0.0, &cancel).await {
                Ok(eval_raw) => parse_evaluation(&eval_raw),
                Err(reason_provider::ProviderError::Cancelled) if cancel.is_cancelled() => {
                    return Err(ReflexionError::Cancelled);
                }
                Err(_) => crate::prompts::parse_evaluation("evaluator unreachable"),
            };

            self.events.push(
                Event::new(EventType::Evaluation)
                    .with_score(judgment.score)
                    .with_is_solution(judgment.success),
            );

            let reflection = if judgment.success {
                None
            } else {
                let reflect_prompt = build_reflection_prompt(problem, &answer, judgment.failure_reason.as_deref());
                self.call_model(&reflect_prompt, 0.7, &cancel).await.ok().map(|r| r.trim().to_string())
            };

            if let Some(store) = &self.memory {
                let mut episode = reason_memory::Episode::new(
                    problem,
                    attempt_number,
                    thoughts.clone(),
                    answer.clone(),
                    judgment.success,
                    self.provider.provider_names().first().copied().unwrap_or("unknown"),
                );
                if let Some(reason) = &judgment.failure_reason {
                    episode = episode.with_failure_reason(reason.clone());
                }
                if let Some(reflection) = &reflection {
                    episode = episode.with_reflection(reflection.clone());
                }
                store.store_episode(episode).await?;
            }

            let record = AttemptRecord {
                attempt_number,
                thoughts,
                answer,
                score: judgment.score,
                success: judgment.success,
                failure_reason: judgment.failure_reason,
                reflection: reflection.clone(),
            };
            let success = record.success;
            let answer = record.answer.clone();
            attempts.push(record);

            if success {
                self.events.push(Event::new(EventType::Solution).with_is_solution(true).with_final_answer(answer));
                return Ok(ReflexionResult {
                    answer: attempts.last().expect("just pushed").answer.clone(),
                    success: true,
                    attempts,
                    lessons_learned: lessons,
                });
            }

            if let Some(reflection) = reflection {
                prior_reflections.push(reflection);
            }
        }

        let best = attempts.iter().max_by(|a, b| a.score.total_cmp(&b.score)).cloned();

        let answer = best.map(|a| a.answer).unwrap_or_default();
        self.events.push(
            Event::new(EventType::Solution).with_is_solution(false).with_final_answer(answer.clone()),
        );

        Ok(ReflexionResult {
            answer,
            success: false,
            attempts,
            lessons_learned: lessons,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reason_events::StreamMode;
    use reason_provider::{ChatResponse, DynProvider, Provider, ProviderError, StreamingProvider};
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedProvider {
        responses: Vec<&'static str>,
        calls: AtomicUsize,
    }

    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "stub"
        }

        fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: ChatOptions,
            _cancel: &CancellationToken,
        ) -> impl Future<Output = Result<ChatResponse, ProviderError>> + Send {
            let i = self.calls.fetch_add(1, Ordering::SeqCst);
            let idx = i.min(self.responses.len() - 1);
            let content = self.responses[idx].to_string();
            async move {
                Ok(ChatResponse {
                    content,
                    model: "stub-model".into(),
                    provider_name: "stub".into(),
                })
            }
        }
    }

    impl StreamingProvider for ScriptedProvider {}

    fn chain(responses: Vec<&'static str>) -> Arc<FallbackChain> {
        let provider = Arc::new(ScriptedProvider {
            responses,
            calls: AtomicUsize::new(0),
        });
        Arc::new(FallbackChain::new(vec![provider as Arc<dyn DynProvider>]).unwrap())
    }

    fn engine(responses: Vec<&'static str>, params: ReflexionParams, memory: Option<Arc<MemoryStore>>) -> ReflexionEngine {
        ReflexionEngine::new(
            chain(responses),
            Arc::new(ToolRegistry::with_builtins()),
            Arc::new(StreamingManager::new(StreamMode::Events)),
            memory,
            params,
        )
    }

    #[tokio::test]
    async fn first_attempt_success_returns_immediately() {
        let e = engine(
            vec![
                r#"{"type": "thought", "thought": "thinking it through", "is_final": true, "answer": "42"}"#,
                r#"{"success": true, "score": 1.0}"#,
            ],
            ReflexionParams {
                use_memory: false,
                enable_tools: false,
                ..Default::default()
            },
            None,
        );
        let result = e.reason("what is the answer?", CancellationToken::new()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.answer, "42");
        assert_eq!(result.attempts.len(), 1);
    }

    #[tokio::test]
    async fn inner_loop_iterates_until_is_final_before_evaluating() {
        let e = engine(
            vec![
                r#"{"type": "thought", "thought": "step one", "is_final": false}"#,
                r#"{"type": "thought", "thought": "step two", "is_final": false}"#,
                r#"{"type": "thought", "thought": "step three", "is_final": true, "answer": "done"}"#,
                r#"{"success": true, "score": 1.0}"#,
            ],
            ReflexionParams {
                use_memory: false,
                enable_tools: false,
                max_thoughts_per_attempt: 5,
                ..Default::default()
            },
            None,
        );
        let result = e.reason("count to three", CancellationToken::new()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.answer, "done");
        assert_eq!(result.attempts[0].thoughts, vec!["step one", "step two", "step three"]);
    }

    #[tokio::test]
    async fn inner_loop_executes_a_tool_action_and_feeds_its_output_back() {
        let e = engine(
            vec![
                r#"{"type": "tool", "name": "calculator", "input": {"expression": "2+2"}}"#,
                r#"{"type": "thought", "thought": "the sum is 4", "is_final": true, "answer": "4"}"#,
                r#"{"success": true, "score": 1.0}"#,
            ],
            ReflexionParams {
                use_memory: false,
                enable_tools: true,
                enabled_tools: vec!["calculator".to_string()],
                max_thoughts_per_attempt: 5,
                ..Default::default()
            },
            None,
        );
        let result = e.reason("what is 2+2?", CancellationToken::new()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.answer, "4");
    }

    #[tokio::test]
    async fn inner_loop_forces_a_final_answer_when_steps_are_exhausted() {
        let e = engine(
            vec![
                r#"{"type": "thought", "thought": "still thinking", "is_final": false}"#,
                r#"{"type": "thought", "thought": "still thinking", "is_final": false}"#,
                "the forced final answer",
                r#"{"success": true, "score": 1.0}"#,
            ],
            ReflexionParams {
                use_memory: false,
                enable_tools: false,
                max_thoughts_per_attempt: 2,
                ..Default::default()
            },
            None,
        );
        let result = e.reason("a slow problem", CancellationToken::new()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.answer, "the forced final answer");
    }

    #[tokio::test]
    async fn failed_attempts_reflect_and_store_episodes_then_exhaust() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::open(dir.path().join("mem.json")).await.unwrap());
        let e = engine(
            vec![
                r#"{"type": "thought", "thought": "t1", "is_final": true, "answer": "wrong1"}"#,
                r#"{"success": false, "score": 0.2, "failure_reason": "off by one"}"#,
                "I should recheck my arithmetic",
                r#"{"type": "thought", "thought": "t2", "is_final": true, "answer": "wrong2"}"#,
                r#"{"success": false, "score": 0.3, "failure_reason": "still wrong"}"#,
                "try a different approach entirely",
            ],
            ReflexionParams {
                max_attempts: 2,
                use_memory: true,
                enable_tools: false,
                ..Default::default()
            },
            Some(store.clone()),
        );
        let result = e.reason("a tricky problem", CancellationToken::new()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.attempts.len(), 2);
        assert_eq!(store.stats().await.total_episodes, 2);
    }

    #[tokio::test]
    async fn cancellation_before_first_attempt_returns_cancelled() {
        let e = engine(vec!["unused"], ReflexionParams::default(), None);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = e.reason("p", cancel).await.unwrap_err();
        assert!(matches!(err, ReflexionError::Cancelled));
    }

    #[tokio::test]
    async fn past_lesson_is_folded_into_first_prompt_and_surfaced_on_the_result() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::open(dir.path().join("mem.json")).await.unwrap());
        let problem = "sequence 2, 6, 12, 20, 30, ?";
        let mut seeded = reason_memory::Episode::new(problem, 1, vec![], "wrong".into(), false, "stub");
        seeded = seeded.with_reflection("look at differences of differences");
        store.store_episode(seeded).await.unwrap();

        let e = engine(
            vec![
                r#"{"type": "thought", "thought": "t", "is_final": true, "answer": "42"}"#,
                r#"{"success": true, "score": 1.0}"#,
            ],
            ReflexionParams {
                use_memory: true,
                ..Default::default()
            },
            Some(store),
        );
        let result = e.reason(problem, CancellationToken::new()).await.unwrap();
        assert_eq!(result.lessons_learned, vec!["look at differences of differences".to_string()]);
    }

    #[tokio::test]
    async fn malformed_attempt_response_degrades_to_raw_text_answer() {
        // A non-JSON step response degrades to a non-final thought (per
        // `parse_step`'s fallback), so the inner loop runs to
        // `max_thoughts_per_attempt` and then forces a final answer.
        let e = engine(
            vec![
                "the raw answer text",
                "the raw answer text",
                "the raw answer text",
                r#"{"success": true, "score": 0.9}"#,
            ],
            ReflexionParams {
                use_memory: false,
                max_thoughts_per_attempt: 2,
                ..Default::default()
            },
            None,
        );
        let result = e.reason("p", CancellationToken::new()).await.unwrap();
        assert_eq!(result.answer, "the raw answer text");
    }
}
