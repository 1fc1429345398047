//! Sequential chain-of-thought (§1, §6 `sequential_thinking`): the simplest
//! of the four reasoning tools — repeatedly prompt for the next thought
//! until the model signals it has an answer or `max_thoughts` is reached.
//!
//! Unlike graph-of-thoughts, reflexion, and dialectic, this has no
//! component entry of its own (§2) and no dedicated crate — it is a thin
//! loop over the same `Provider`/`FallbackChain`/`StreamingManager`
//! machinery those engines use, kept local to the RPC surface that exposes
//! it.

use std::sync::Arc;

use reason_events::{Event, EventType, StreamingManager};
use reason_provider::{ChatMessage, ChatOptions, FallbackChain, ProviderError};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::streamctl::StreamRequestFields;

/// Parameters governing one sequential-thinking run.
#[derive(Debug, Clone)]
pub struct SequentialParams {
    /// Maximum number of thought steps before forcing a final answer.
    pub max_thoughts: u32,
}

impl Default for SequentialParams {
    fn default() -> Self {
        Self { max_thoughts: 5 }
    }
}

/// `sequential_thinking(...)` request parameters (§6).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SequentialRequest {
    /// The problem statement.
    pub problem: String,
    /// Maximum number of thought steps before forcing a final answer.
    pub max_thoughts: u32,
    /// Explicit provider name, taking priority over env resolution.
    pub provider: Option<String>,
    /// Per-call model override.
    pub model: Option<String>,
    /// `stream*…` fields (§6), resolved via [`StreamRequestFields::resolve`].
    #[serde(flatten)]
    pub stream: StreamRequestFields,
}

impl Default for SequentialRequest {
    fn default() -> Self {
        Self {
            problem: String::new(),
            max_thoughts: SequentialParams::default().max_thoughts,
            provider: None,
            model: None,
            stream: StreamRequestFields::default(),
        }
    }
}

impl SequentialRequest {
    fn params(&self) -> SequentialParams {
        SequentialParams {
            max_thoughts: self.max_thoughts.max(1),
        }
    }
}

/// `sequential_thinking(...)` response shape (§6).
#[derive(Debug, Clone, Serialize)]
pub struct SequentialResponse {
    /// The final answer text.
    pub answer: String,
    /// Every thought produced, in order.
    pub thoughts: Vec<String>,
}

/// The outcome of a sequential-thinking run.
#[derive(Debug, Clone)]
pub struct SequentialResult {
    /// The final answer text.
    pub answer: String,
    /// Every thought produced, in order.
    pub thoughts: Vec<String>,
}

/// Errors from a [`run`] call.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum SequentialError {
    /// Every provider in the fallback chain failed on the first thought
    /// (the one call with nothing yet produced to fall back on).
    #[error("thought generation failed: {0}")]
    ThoughtFailed(String),
    /// The run's cancellation token fired.
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Deserialize)]
struct ThoughtStep {
    thought: String,
    #[serde(default)]
    is_final: bool,
    #[serde(default)]
    answer: Option<String>,
}

fn extract_json(raw: &str) -> Option<serde_json::Value> {
    let bytes = raw.as_bytes();
    let start = bytes.iter().position(|b| *b == b'{' || *b == b'[')?;
    let open = bytes[start];
    let close = if open == b'{' { b'}' } else { b']' };
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;
    for (i, b) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if *b == b'\\' {
                escaped = true;
            } else if *b == b'"' {
                in_string = false;
            }
            continue;
        }
        match *b {
            b'"' => in_string = true,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return serde_json::from_slice(&bytes[start..=i]).ok();
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_step(raw: &str) -> ThoughtStep {
    extract_json(raw)
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or(ThoughtStep {
            thought: raw.trim().to_string(),
            is_final: false,
            answer: None,
        })
}

fn build_prompt(problem: &str, thoughts: &[String], step: u32, max_thoughts: u32) -> String {
    let mut sections = vec![format!("Problem: {problem}")];
    if !thoughts.is_empty() {
        sections.push(format!(
            "Thoughts so far:\n{}",
            thoughts
                .iter()
                .enumerate()
                .map(|(i, t)| format!("{}. {t}", i + 1))
                .collect::<Vec<_>>()
                .join("\n")
        ));
    }
    sections.push(format!(
        "This is thought {step} of at most {max_thoughts}. Produce the next reasoning step. \
         Respond with JSON: {{\"thought\": \"...\", \"is_final\": bool, \"answer\": \"...\" or null}}. \
         Set is_final=true and give a complete answer once you're confident, otherwise keep \
         is_final=false and leave answer null."
    ));
    sections.join("\n\n")
}

/// Drive one sequential-thinking run to completion.
///
/// # Errors
///
/// [`SequentialError::Cancelled`] if `cancel` fires before any thought is
/// produced; [`SequentialError::ThoughtFailed`] if every provider in the
/// chain fails on the very first thought.
pub async fn run(
    provider: &Arc<FallbackChain>,
    events: &Arc<StreamingManager>,
    problem: &str,
    params: SequentialParams,
    cancel: CancellationToken,
) -> Result<SequentialResult, SequentialError> {
    let max_thoughts = params.max_thoughts.max(1);
    let mut thoughts = Vec::new();

    for step in 1..=max_thoughts {
        if cancel.is_cancelled() {
            return Err(SequentialError::Cancelled);
        }

        let prompt = build_prompt(problem, &thoughts, step, max_thoughts);
        let raw = match call_model(provider, events, &prompt, &cancel).await {
            Ok(text) => text,
            Err(ProviderError::Cancelled) if cancel.is_cancelled() => {
                return Err(SequentialError::Cancelled);
            }
            Err(err) => {
                if thoughts.is_empty() {
                    return Err(SequentialError::ThoughtFailed(err.to_string()));
                }
                events.push(Event::new(EventType::Error).with_content(err.to_string()));
                break;
            }
        };

        let parsed = parse_step(&raw);
        events.push(
            Event::new(EventType::Thought).with_content(parsed.thought.clone()).with_depth(step),
        );
        thoughts.push(parsed.thought);

        if parsed.is_final {
            let answer = parsed.answer.unwrap_or_else(|| thoughts.last().cloned().unwrap_or_default());
            events.push(Event::new(EventType::Solution).with_is_solution(true).with_final_answer(answer.clone()));
            return Ok(SequentialResult { answer, thoughts });
        }
    }

    let answer = thoughts.last().cloned().unwrap_or_default();
    events.push(Event::new(EventType::Solution).with_is_solution(false).with_final_answer(answer.clone()));
    Ok(SequentialResult { answer, thoughts })
}

/// Serve one `sequential_thinking` call: resolve a fallback chain via
/// `build_chain`, then drive [`run`] to completion.
///
/// # Errors
///
/// [`crate::error::McpError::Provider`] if the engine run fails outright.
pub async fn run_request(
    request: SequentialRequest,
    events: &Arc<StreamingManager>,
    build_chain: impl FnOnce(Option<&str>, &[String], Option<&str>) -> Result<Arc<FallbackChain>, crate::error::McpError>,
    cancel: CancellationToken,
) -> Result<SequentialResponse, crate::error::McpError> {
    let chain = build_chain(request.provider.as_deref(), &[], request.model.as_deref())?;
    let params = request.params();
    let result = run(&chain, events, &request.problem, params, cancel).await?;
    Ok(SequentialResponse {
        answer: result.answer,
        thoughts: result.thoughts,
    })
}

async fn call_model(
    provider: &Arc<FallbackChain>,
    events: &Arc<StreamingManager>,
    prompt: &str,
    cancel: &CancellationToken,
) -> Result<String, ProviderError> {
    let messages = [ChatMessage::user(prompt)];
    let options = ChatOptions {
        temperature: Some(0.7),
        ..Default::default()
    };
    let mut on_token = |fragment: &str| events.token(fragment);
    let response = provider.chat_stream(&messages, options, &mut on_token, cancel).await?;
    Ok(response.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reason_events::StreamMode;
    use reason_provider::{ChatResponse, DynProvider, Provider, StreamingProvider};
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

    #[tokio::test]
    async fn stops_as_soon_as_a_thought_is_marked_final() {
        let provider = chain(vec![
            r#"{"thought": "first idea", "is_final": false}"#,
            r#"{"thought": "got it", "is_final": true, "answer": "42"}"#,
        ]);
        let events = Arc::new(StreamingManager::new(StreamMode::Events));
        let result = run(&provider, &events, "what is the answer?", SequentialParams::default(), CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.answer, "42");
        assert_eq!(result.thoughts.len(), 2);
    }

    #[tokio::test]
    async fn exhausts_max_thoughts_and_returns_the_last_one() {
        let provider = chain(vec![r#"{"thought": "still thinking", "is_final": false}"#]);
        let events = Arc::new(StreamingManager::new(StreamMode::Events));
        let result = run(
            &provider,
            &events,
            "p",
            SequentialParams { max_thoughts: 3 },
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(result.thoughts.len(), 3);
        assert_eq!(result.answer, "still thinking");
    }

    #[tokio::test]
    async fn malformed_response_degrades_to_raw_text_thought() {
        let provider = chain(vec!["just some prose, no json here"]);
        let events = Arc::new(StreamingManager::new(StreamMode::Events));
        let result = run(
            &provider,
            &events,
            "p",
            SequentialParams { max_thoughts: 1 },
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(result.thoughts, vec!["just some prose, no json here".to_string()]);
    }

    #[tokio::test]
    async fn cancellation_before_any_thought_returns_cancelled() {
        let provider = chain(vec!["unused"]);
        let events = Arc::new(StreamingManager::new(StreamMode::Events));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = run(&provider, &events, "p", SequentialParams::default(), cancel).await.unwrap_err();
        assert!(matches!(err, SequentialError::Cancelled));
    }

    #[tokio::test]
    async fn run_request_builds_its_own_chain_and_floors_max_thoughts() {
        let events = Arc::new(StreamingManager::new(StreamMode::None));
        let request = SequentialRequest {
            max_thoughts: 0,
            ..Default::default()
        };
        let response = run_request(
            request,
            &events,
            |_, _, _| Ok(chain(vec![r#"{"thought": "only one", "is_final": false}"#])),
            CancellationToken::new(),
        )
        .await
        .unwrap();
        assert_eq!(response.thoughts, vec!["only one".to_string()]);
    }
}
