//! Client for the Anthropic Messages API, grounded on the teacher's
//! `neuron-provider-anthropic::client::Anthropic`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reason_limiter::FifoLimiter;
use reason_provider::{
    retry, ChatMessage, ChatOptions, ChatResponse, Provider, ProviderError, ResolvedChatOptions,
    RetryPolicy, Role, StreamingProvider,
};
use reason_streaming::decode_anthropic_sse;
use tokio_util::sync::CancellationToken;

use crate::error::{map_http_status, map_reqwest_error};

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Send the request body and read back the response, as one unit so a
/// caller can race the whole thing against cancellation with a single
/// `tokio::select!` arm.
async fn dispatch(
    client: &reqwest::Client,
    url: String,
    api_key: &str,
    timeout: Duration,
    body: &serde_json::Value,
) -> Result<(reqwest::StatusCode, String), ProviderError> {
    let response = client
        .post(url)
        .header("x-api-key", api_key)
        .header("anthropic-version", ANTHROPIC_VERSION)
        .header("content-type", "application/json")
        .timeout(timeout)
        .json(body)
        .send()
        .await
        .map_err(map_reqwest_error)?;
    let status = response.status();
    let text = response.text().await.map_err(map_reqwest_error)?;
    Ok((status, text))
}

/// Client for the Anthropic Messages API. Implements [`Provider`] and
/// [`StreamingProvider`].
pub struct Anthropic {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
    limiter: Arc<FifoLimiter>,
    retry_policy: RetryPolicy,
    timeout: Duration,
}

impl Anthropic {
    /// Create a client with the given API key and sensible defaults.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            client: reqwest::Client::new(),
            limiter: reason_limiter::global(),
            retry_policy: RetryPolicy::default(),
            timeout: reason_core::Config::get().provider_timeouts.get("anthropic"),
        }
    }

    /// Override the default model used when a request doesn't specify one.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL (testing, proxies).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Override the retry policy (tests mainly).
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.base_url)
    }

    fn build_body(&self, messages: &[ChatMessage], resolved: ResolvedChatOptions, model: &str) -> serde_json::Value {
        let system: String = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let turns: Vec<serde_json::Value> = messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                serde_json::json!({
                    "role": if m.role == Role::User { "user" } else { "assistant" },
                    "content": m.content,
                })
            })
            .collect();

        let mut body = serde_json::json!({
            "model": model,
            "messages": turns,
            "max_tokens": resolved.max_tokens.unwrap_or(4096),
            "temperature": resolved.temperature,
        });
        if !system.is_empty() {
            body["system"] = serde_json::Value::String(system);
        }
        body
    }
}

impl Provider for Anthropic {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn chat(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ChatResponse, ProviderError>> + Send {
        async move {
            let model = options
                .model_override
                .as_deref()
                .unwrap_or(&self.model)
                .to_string();
            let resolved = options.resolve(reason_core::Config::get().max_tokens_cap);
            let body = self.build_body(messages, resolved, &model);

            retry(&self.retry_policy, cancel, |_attempt| {
                let body = body.clone();
                let model = model.clone();
                async {
                    // One limiter permit per attempt: acquired before any
                    // outbound I/O, released when `_permit` drops at the end
                    // of this async block (every return path, including the
                    // `?` early-returns below) — Rust's ownership model makes
                    // the §4.3.5 "close on every branch" discipline automatic
                    // rather than something this loop must remember to do.
                    let _permit = self
                        .limiter
                        .acquire(cancel)
                        .await
                        .map_err(|_| ProviderError::Cancelled)?;

                    tracing::debug!(url = %self.messages_url(), model = %model, "sending anthropic completion request");

                    let (status, text) = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(ProviderError::Cancelled),
                        result = dispatch(&self.client, self.messages_url(), &self.api_key, self.timeout, &body) => result?,
                    };

                    if !status.is_success() {
                        return Err(map_http_status(status, &text));
                    }

                    let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
                        ProviderError::InvalidRequest(format!("invalid JSON response: {e}"))
                    })?;

                    let content = json
                        .get("content")
                        .and_then(|c| c.as_array())
                        .and_then(|blocks| blocks.iter().find_map(|b| b.get("text")))
                        .and_then(serde_json::Value::as_str)
                        .map(str::to_string);

                    match content {
                        Some(content) if !content.is_empty() => Ok(ChatResponse {
                            content,
                            model: json
                                .get("model")
                                .and_then(serde_json::Value::as_str)
                                .unwrap_or(&model)
                                .to_string(),
                            provider_name: "anthropic".to_string(),
                        }),
                        _ => Err(ProviderError::EmptyResponse {
                            provider: "anthropic".to_string(),
                            model: model.clone(),
                            status: status.as_u16(),
                            snippet: reason_core::text::truncate_chars(&text, 200),
                        }),
                    }
                }
            })
            .await
        }
    }
}

impl StreamingProvider for Anthropic {
    fn supports_streaming(&self) -> bool {
        true
    }

    fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
        on_token: &mut (dyn FnMut(&str) + Send),
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ChatResponse, ProviderError>> + Send {
        async move {
            let model = options
                .model_override
                .as_deref()
                .unwrap_or(&self.model)
                .to_string();
            let resolved = options.resolve(reason_core::Config::get().max_tokens_cap);
            let mut body = self.build_body(messages, resolved, &model);
            body["stream"] = serde_json::Value::Bool(true);

            // Streaming acquire/retry/close discipline mirrors the
            // non-streaming path (§4.3 "Streaming variant"), except that a
            // parse error inside the body never triggers an HTTP retry.
            let _permit = self
                .limiter
                .acquire(cancel)
                .await
                .map_err(|_| ProviderError::Cancelled)?;

            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ProviderError::Cancelled),
                result = self
                    .client
                    .post(self.messages_url())
                    .header("x-api-key", &self.api_key)
                    .header("anthropic-version", ANTHROPIC_VERSION)
                    .header("content-type", "application/json")
                    .timeout(self.timeout)
                    .json(&body)
                    .send() => result.map_err(map_reqwest_error)?,
            };

            let status = response.status();
            if !status.is_success() {
                let text = response.text().await.map_err(map_reqwest_error)?;
                return Err(map_http_status(status, &text));
            }

            let byte_stream = response
                .bytes_stream()
                .map(|r| r.map_err(|e| reason_streaming::StreamError::Io(e.to_string())));

            let content = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(ProviderError::Cancelled),
                result = decode_anthropic_sse(byte_stream, on_token) => result.map_err(|e| ProviderError::Stream(e.to_string()))?,
            };

            if content.is_empty() {
                return Err(ProviderError::EmptyResponse {
                    provider: "anthropic".to_string(),
                    model,
                    status: status.as_u16(),
                    snippet: String::new(),
                });
            }

            Ok(ChatResponse {
                content,
                model,
                provider_name: "anthropic".to_string(),
            })
        }
    }
}
