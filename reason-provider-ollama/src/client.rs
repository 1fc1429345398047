//! Client for the Ollama Chat API, grounded on the teacher's
//! `neuron-provider-ollama::client::Ollama`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reason_limiter::FifoLimiter;
use reason_provider::{
    retry, ChatMessage, ChatOptions, ChatResponse, Provider, ProviderError, ResolvedChatOptions,
    RetryPolicy, Role, StreamingProvider,
};
use reason_streaming::decode_ndjson;
use tokio_util::sync::CancellationToken;

use crate::error::{map_http_status, map_reqwest_error};

const DEFAULT_MODEL: &str = "llama3.2";
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Send the request body and read back the response, as one unit so a
/// caller can race the whole thing against cancellation with a single
/// `tokio::select!` arm.
async fn dispatch(
    client: &reqwest::Client,
    url: String,
    timeout: Duration,
    body: &serde_json::Value,
) -> Result<(reqwest::StatusCode, String), ProviderError> {
    let response = client
        .post(url)
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

/// Client for the local Ollama Chat API. Implements [`Provider`] and
/// [`StreamingProvider`]. No authentication — Ollama is a local daemon.
pub struct Ollama {
    model: String,
    base_url: String,
    keep_alive: Option<String>,
    client: reqwest::Client,
    limiter: Arc<FifoLimiter>,
    retry_policy: RetryPolicy,
    timeout: Duration,
}

impl Ollama {
    /// Create a client with sensible defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            model: DEFAULT_MODEL.into(),
            base_url: DEFAULT_BASE_URL.into(),
            keep_alive: None,
            client: reqwest::Client::new(),
            limiter: reason_limiter::global(),
            retry_policy: RetryPolicy::default(),
            timeout: reason_core::Config::get().provider_timeouts.get("ollama"),
        }
    }

    /// Override the default model used when a request doesn't specify one.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL (remote Ollama instances, tests).
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the `keep_alive` duration string (e.g. `"5m"`, `"0"` to unload
    /// immediately after the request).
    #[must_use]
    pub fn keep_alive(mut self, duration: impl Into<String>) -> Self {
        self.keep_alive = Some(duration.into());
        self
    }

    /// Override the retry policy (tests mainly).
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    fn build_body(&self, messages: &[ChatMessage], resolved: ResolvedChatOptions, model: &str) -> serde_json::Value {
        let turns: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => "system",
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                serde_json::json!({ "role": role, "content": m.content })
            })
            .collect();

        let mut options = serde_json::Map::new();
        options.insert("temperature".into(), serde_json::Value::from(resolved.temperature));
        if let Some(max_tokens) = resolved.max_tokens {
            options.insert("num_predict".into(), serde_json::Value::from(max_tokens));
        }

        let mut body = serde_json::json!({
            "model": model,
            "messages": turns,
            "options": options,
        });
        if let Some(ka) = &self.keep_alive {
            body["keep_alive"] = serde_json::Value::String(ka.clone());
        }
        body
    }
}

impl Default for Ollama {
    fn default() -> Self {
        Self::new()
    }
}

impl Provider for Ollama {
    fn name(&self) -> &str {
        "ollama"
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
                    let _permit = self
                        .limiter
                        .acquire(cancel)
                        .await
                        .map_err(|_| ProviderError::Cancelled)?;

                    tracing::debug!(url = %self.chat_url(), model = %model, "sending ollama completion request");

                    let (status, text) = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(ProviderError::Cancelled),
                        result = dispatch(&self.client, self.chat_url(), self.timeout, &body) => result?,
                    };

                    if !status.is_success() {
                        return Err(map_http_status(status, &text));
                    }

                    let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
                        ProviderError::InvalidRequest(format!("invalid JSON response: {e}"))
                    })?;

                    let content = json
                        .get("message")
                        .and_then(|m| m.get("content"))
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
                            provider_name: "ollama".to_string(),
                        }),
                        _ => Err(ProviderError::EmptyResponse {
                            provider: "ollama".to_string(),
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

impl StreamingProvider for Ollama {
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
                    .post(self.chat_url())
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
                result = decode_ndjson(byte_stream, on_token) => result.map_err(|e| ProviderError::Stream(e.to_string()))?,
            };

            if content.is_empty() {
                return Err(ProviderError::EmptyResponse {
                    provider: "ollama".to_string(),
                    model,
                    status: status.as_u16(),
                    snippet: String::new(),
                });
            }

            Ok(ChatResponse {
                content,
                model,
                provider_name: "ollama".to_string(),
            })
        }
    }
}
