//! The Dialectic engine itself (C12, §4.11).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use reason_events::{Event, EventType, StreamingManager};
use reason_provider::{ChatMessage, ChatOptions, FallbackChain};
use reason_tools::ToolRegistry;
use tokio_util::sync::CancellationToken;

use crate::error::DialecticError;
use crate::params::DialecticParams;
use crate::prompts::{
    build_antithesis_prompt, build_fast_mode_prompt, build_synthesis_prompt, build_thesis_prompt,
    build_tool_proposal_prompt, build_verification_prompt, heuristic_verification, parse_fast_mode,
    parse_tool_proposals, parse_verification,
};
use crate::result::{Claim, DialecticResult, DialecticStep, Verification, VerificationStatus};

/// Antithesis calls run warmer than the round's base temperature so they
/// don't just restate the thesis (§4.11 "Normal mode").
const ANTITHESIS_TEMPERATURE_OFFSET: f64 = 0.1;
/// Synthesis calls run cooler than the base temperature, favoring a more
/// deliberate reconciliation (§4.11 "Normal mode").
const SYNTHESIS_TEMPERATURE_OFFSET: f64 = -0.1;
/// Verification calls run at a fixed low temperature regardless of the
/// run's base temperature (§4.11 "Verification").
const VERIFICATION_TEMPERATURE: f64 = 0.3;

/// Drives one dialectic run: round-based thesis/antithesis/synthesis with
/// per-claim verification, or a single-call fast-mode shortcut (§4.11).
///
/// Like [`reason_engine_got::GotEngine`] and [`reason_engine_reflexion::ReflexionEngine`],
/// holds an `Arc<FallbackChain>` rather than being generic over `Provider`
/// (§9 "Polymorphism").
pub struct DialecticEngine {
    provider: Arc<FallbackChain>,
    tools: Arc<ToolRegistry>,
    events: Arc<StreamingManager>,
    params: DialecticParams,
}

impl DialecticEngine {
    /// Build an engine for one run.
    #[must_use]
    pub fn new(
        provider: Arc<FallbackChain>,
        tools: Arc<ToolRegistry>,
        events: Arc<StreamingManager>,
        params: DialecticParams,
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
        model_override: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<String, reason_provider::ProviderError> {
        let messages = [ChatMessage::user(prompt)];
        let options = ChatOptions {
            temperature: Some(temperature),
            max_tokens: Some(self.params.max_tokens),
            model_override: model_override.map(|m| std::borrow::Cow::Owned(m.to_string())),
            ..Default::default()
        };
        let mut on_token = |fragment: &str| self.events.token(fragment);
        let response = self.provider.chat_stream(&messages, options, &mut on_token, cancel).await?;
        Ok(response.content)
    }

    /// Run a single claim's verification, optionally gathering tool
    /// evidence first (§4.11 "Verification").
    ///
    /// `tool_calls_used` is shared across all three verifications within
    /// this `reason` call and incremented under its own atomic
    /// test-and-increment before a tool actually executes (§4.11
    /// "Concurrency").
    async fn verify_claim(
        &self,
        problem: &str,
        claim_kind: &str,
        claim: &str,
        tool_calls_used: &AtomicU32,
        cancel: &CancellationToken,
    ) -> Verification {
        let mut evidence_lines = Vec::new();

        if self.params.enable_tools {
            let tool_names: Vec<String> = if self.params.enabled_tools.is_empty() {
                self.tools.names()
            } else {
                self.params.enabled_tools.clone()
            };
            if !tool_names.is_empty() {
                let proposal_prompt = build_tool_proposal_prompt(claim, &tool_names);
                if let Ok(raw) = self.call_model(&proposal_prompt, 0.0, None, cancel).await {
                    let proposals =
                        parse_tool_proposals(&raw, self.params.max_tool_calls_per_verification as usize);
                    for proposal in proposals {
                        if !self.params.enabled_tools.is_empty()
                            && !self.params.enabled_tools.iter().any(|n| n == &proposal.name)
                        {
                            continue;
                        }
                        // Test-and-increment the shared budget before
                        // executing; only a thread that wins the
                        // compare-exchange actually runs the tool.
                        let mut current = tool_calls_used.load(Ordering::SeqCst);
                        let reserved = loop {
                            if current >= self.params.max_tool_calls_total {
                                break false;
                            }
                            match tool_calls_used.compare_exchange(
                                current,
                                current + 1,
                                Ordering::SeqCst,
                                Ordering::SeqCst,
                            ) {
                                Ok(_) => break true,
                                Err(observed) => current = observed,
                            }
                        };
                        if !reserved {
                            break;
                        }

                        let outcome = self.tools.execute(cancel.clone(), &proposal.name, proposal.input.clone()).await;
                        self.events.push(Event::new(EventType::Tool).with_tool(
                            proposal.name.clone(),
                            outcome.input.clone(),
                            outcome.output.clone().or_else(|| outcome.error_text.clone()).unwrap_or_default(),
                        ));
                        let text = if outcome.success {
                            outcome.output.unwrap_or_default()
                        } else {
                            format!("error: {}", outcome.error_text.unwrap_or_default())
                        };
                        evidence_lines.push(format!("- {}({}) -> {text}", proposal.name, proposal.input));
                    }
                }
            }
        }

        let evidence = evidence_lines.join("\n");
        let prompt = build_verification_prompt(problem, claim_kind, claim, &evidence);
        let raw = match self.call_model(&prompt, VERIFICATION_TEMPERATURE, None, cancel).await {
            Ok(text) => text,
            Err(err) => return Verification::unverified(err.to_string()),
        };

        let parsed = parse_verification(&raw).unwrap_or_else(|| heuristic_verification(&raw));
        Verification {
            is_valid: parsed.is_valid,
            score: parsed.score.clamp(0.0, 1.0),
            status: VerificationStatus::Verified,
            issues: parsed.issues,
            strengths: parsed.strengths,
            suggestion: parsed.suggestion,
            tool_results: evidence_lines,
            error_reason: None,
        }
    }

    async fn run_fast_mode(&self, problem: &str, cancel: &CancellationToken) -> Result<DialecticResult, DialecticError> {
        let prompt = build_fast_mode_prompt(problem);
        let raw = self
            .call_model(&prompt, self.params.temperature, None, cancel)
            .await
            .map_err(|e| DialecticError::ThesisFailed(e.to_string()))?;
        let payload = parse_fast_mode(&raw);
        let confidence = payload.confidence.clamp(0.0, 1.0);
        let success = confidence >= self.params.confidence_target;

        let step = DialecticStep {
            round: 1,
            thesis: Claim {
                content: payload.thesis,
                verification: Verification::skipped(),
            },
            antithesis: Claim {
                content: payload.antithesis,
                verification: Verification::skipped(),
            },
            synthesis: Claim {
                content: payload.synthesis.clone(),
                verification: Verification::skipped(),
            },
            resolved: success,
        };

        self.events.push(
            Event::new(EventType::Solution)
                .with_score(confidence)
                .with_is_solution(success)
                .with_final_answer(payload.synthesis.clone()),
        );

        Ok(DialecticResult {
            answer: payload.synthesis,
            success,
            confidence,
            total_rounds: 1,
            steps: vec![step],
        })
    }

    /// Run the dialectic reasoning process to completion.
    ///
    /// # Errors
    ///
    /// [`DialecticError::Cancelled`] if `cancel` fires mid-run;
    /// [`DialecticError::ThesisFailed`] if every provider in the fallback
    /// chain fails on a thesis call (there is nothing yet to fall back to).
    pub async fn reason(&self, problem: &str, cancel: CancellationToken) -> Result<DialecticResult, DialecticError> {
        if cancel.is_cancelled() {
            return Err(DialecticError::Cancelled);
        }
        if self.params.fast_mode {
            return self.run_fast_mode(problem, &cancel).await;
        }

        let tool_calls_used = AtomicU32::new(0);
        let mut steps: Vec<DialecticStep> = Vec::new();
        let mut best: Option<(String, f64)> = None;
        let mut previous_synthesis: Option<String> = None;

        for round in 1..=self.params.max_rounds {
            if cancel.is_cancelled() {
                return Err(DialecticError::Cancelled);
            }

            let thesis_prompt = build_thesis_prompt(problem, round, previous_synthesis.as_deref());
            let thesis_text = match self
                .call_model(&thesis_prompt, self.params.temperature, self.params.thesis_model.as_deref(), &cancel)
                .await
            {
                Ok(text) => text,
                Err(reason_provider::ProviderError::Cancelled) if cancel.is_cancelled() => {
                    return Err(DialecticError::Cancelled);
                }
                Err(err) => {
                    if steps.is_empty() {
                        return Err(DialecticError::ThesisFailed(err.to_string()));
                    }
                    break;
                }
            };
            let thesis_verification = self.verify_claim(problem, "thesis", &thesis_text, &tool_calls_used, &cancel).await;
            self.events.push(Event::new(EventType::Thought).with_content(thesis_text.clone()).with_score(thesis_verification.score));

            let antithesis_prompt = build_antithesis_prompt(problem, &thesis_text);
            let antithesis_text = self
                .call_model(
                    &antithesis_prompt,
                    self.params.temperature + ANTITHESIS_TEMPERATURE_OFFSET,
                    self.params.antithesis_model.as_deref(),
                    &cancel,
                )
                .await
                .unwrap_or_default();
            let antithesis_verification =
                self.verify_claim(problem, "antithesis", &antithesis_text, &tool_calls_used, &cancel).await;
            self.events.push(Event::new(EventType::Thought).with_content(antithesis_text.clone()).with_score(antithesis_verification.score));

            let synthesis_prompt = build_synthesis_prompt(problem, &thesis_text, &antithesis_text);
            let synthesis_text = self
                .call_model(
                    &synthesis_prompt,
                    self.params.temperature + SYNTHESIS_TEMPERATURE_OFFSET,
                    self.params.synthesis_model.as_deref(),
                    &cancel,
                )
                .await
                .unwrap_or_default();
            let synthesis_verification =
                self.verify_claim(problem, "synthesis", &synthesis_text, &tool_calls_used, &cancel).await;
            self.events.push(Event::new(EventType::Evaluation).with_content(synthesis_text.clone()).with_score(synthesis_verification.score));

            let resolved = synthesis_verification.is_valid
                && synthesis_verification.issues.is_empty()
                && synthesis_verification.score >= self.params.confidence_target;

            if resolved || synthesis_verification.score >= self.params.verify_threshold {
                best = Some((synthesis_text.clone(), synthesis_verification.score));
            }

            previous_synthesis = Some(synthesis_text.clone());

            let synthesis_score = synthesis_verification.score;
            steps.push(DialecticStep {
                round,
                thesis: Claim {
                    content: thesis_text,
                    verification: thesis_verification,
                },
                antithesis: Claim {
                    content: antithesis_text,
                    verification: antithesis_verification,
                },
                synthesis: Claim {
                    content: synthesis_text.clone(),
                    verification: synthesis_verification,
                },
                resolved,
            });

            if resolved {
                self.events.push(
                    Event::new(EventType::Solution)
                        .with_score(synthesis_score)
                        .with_is_solution(true)
                        .with_final_answer(synthesis_text.clone()),
                );
                return Ok(DialecticResult {
                    answer: synthesis_text,
                    success: true,
                    confidence: synthesis_score,
                    total_rounds: round,
                    steps,
                });
            }
        }

        let (answer, confidence) = best.unwrap_or_else(|| {
            steps
                .last()
                .map(|s| (s.synthesis.content.clone(), s.synthesis.verification.score))
                .unwrap_or_default()
        });

        self.events.push(
            Event::new(EventType::Solution).with_score(confidence).with_is_solution(false).with_final_answer(answer.clone()),
        );

        Ok(DialecticResult {
            answer,
            success: false,
            confidence,
            total_rounds: steps.len() as u32,
            steps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reason_events::StreamMode;
    use reason_provider::{ChatResponse, DynProvider, Provider, ProviderError, StreamingProvider};
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering as StdOrdering};

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
            let i = self.calls.fetch_add(1, StdOrdering::SeqCst);
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

    fn engine(responses: Vec<&'static str>, params: DialecticParams) -> DialecticEngine {
        DialecticEngine::new(
            chain(responses),
            Arc::new(ToolRegistry::with_builtins()),
            Arc::new(StreamingManager::new(StreamMode::Events)),
            params,
        )
    }

    #[tokio::test]
    async fn resolves_on_first_round_when_synthesis_meets_confidence_target() {
        let e = engine(
            vec![
                "the thesis",
                r#"{"is_valid":true,"score":0.9,"issues":[],"strengths":["x"],"suggestion":""}"#,
                "the antithesis",
                r#"{"is_valid":true,"score":0.8,"issues":[],"strengths":["y"],"suggestion":""}"#,
                "the synthesis",
                r#"{"is_valid":true,"score":0.95,"issues":[],"strengths":["z"],"suggestion":""}"#,
            ],
            DialecticParams {
                confidence_target: 0.85,
                enable_tools: false,
                ..Default::default()
            },
        );
        let result = e.reason("a claim to resolve", CancellationToken::new()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.total_rounds, 1);
        assert!((result.confidence - 0.95).abs() < 1e-9);
        assert_eq!(result.answer, "the synthesis");
    }

    #[tokio::test]
    async fn fast_mode_skips_verification_entirely() {
        let e = engine(
            vec![r#"{"thesis":"t","antithesis":"a","synthesis":"s","confidence":0.9}"#],
            DialecticParams {
                fast_mode: true,
                confidence_target: 0.85,
                ..Default::default()
            },
        );
        let result = e.reason("p", CancellationToken::new()).await.unwrap();
        assert!(result.success);
        assert_eq!(result.steps.len(), 1);
        assert!(matches!(result.steps[0].thesis.verification.status, VerificationStatus::Skipped));
        assert!(matches!(result.steps[0].synthesis.verification.status, VerificationStatus::Skipped));
    }

    #[tokio::test]
    async fn exhaustion_returns_best_seen_synthesis() {
        let e = engine(
            vec![
                "thesis 1",
                r#"{"is_valid":true,"score":0.5,"issues":[],"strengths":[],"suggestion":""}"#,
                "antithesis 1",
                r#"{"is_valid":true,"score":0.5,"issues":[],"strengths":[],"suggestion":""}"#,
                "synthesis 1",
                r#"{"is_valid":true,"score":0.7,"issues":["minor gap"],"strengths":[],"suggestion":"tighten"}"#,
            ],
            DialecticParams {
                max_rounds: 1,
                confidence_target: 0.9,
                verify_threshold: 0.6,
                enable_tools: false,
                ..Default::default()
            },
        );
        let result = e.reason("p", CancellationToken::new()).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.answer, "synthesis 1");
        assert!((result.confidence - 0.7).abs() < 1e-9);
    }

    #[tokio::test]
    async fn malformed_verification_falls_back_to_heuristic_not_failure() {
        let e = engine(
            vec![
                "thesis text",
                "not json but score around 0.8 and it seems valid",
                "antithesis text",
                "not json but score around 0.8 and it seems valid",
                "synthesis text",
                "not json but score around 0.9 and it seems valid",
            ],
            DialecticParams {
                max_rounds: 1,
                confidence_target: 0.85,
                verify_threshold: 0.5,
                enable_tools: false,
                ..Default::default()
            },
        );
        let result = e.reason("p", CancellationToken::new()).await.unwrap();
        assert!((result.confidence - 0.9).abs() < 1e-9);
        assert!(matches!(result.steps[0].synthesis.verification.status, VerificationStatus::Verified));
    }

    #[tokio::test]
    async fn cancellation_before_any_round_returns_cancelled() {
        let e = engine(vec!["unused"], DialecticParams::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = e.reason("p", cancel).await.unwrap_err();
        assert!(matches!(err, DialecticError::Cancelled));
    }
}
