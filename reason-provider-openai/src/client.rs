//! Client for OpenAI-compatible chat-completions APIs, grounded on the
//! teacher's `neuron-provider-openai::client::OpenAi`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reason_limiter::FifoLimiter;
use reason_provider::{
    retry, ChatMessage, ChatOptions, ChatResponse, Provider, ProviderError, ResolvedChatOptions,
    RetryPolicy, Role, StreamingProvider,
};
use reason_streaming::decode_sse;
use tokio_util::sync::CancellationToken;

use crate::error::{map_http_status, map_reqwest_error};

const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_BASE_URL: &str = "https://api.openai.com";

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
        .bearer_auth(api_key)
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

/// Client for an OpenAI-compatible `/v1/chat/completions` endpoint.
/// Implements [`Provider`] and [`StreamingProvider`].
pub struct OpenAi {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
    limiter: Arc<FifoLimiter>,
    retry_policy: RetryPolicy,
    timeout: Duration,
}

impl OpenAi {
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
            timeout: reason_core::Config::get().provider_timeouts.get("openai"),
        }
    }

    /// Override the default model used when a request doesn't specify one.
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Override the API base URL (self-hosted gateways, proxies, tests).
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

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
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

        let mut body = serde_json::json!({
            "model": model,
            "messages": turns,
            "temperature": resolved.temperature,
        });
        if let Some(max_tokens) = resolved.max_tokens {
            body["max_tokens"] = serde_json::Value::from(max_tokens);
        }
        body
    }
}

impl Provider for OpenAi {
    fn name(&self) -> &str {
        "openai"
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

                    tracing::debug!(url = %self.completions_url(), model = %model, "sending openai completion request");

                    let (status, text) = tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(ProviderError::Cancelled),
                        result = dispatch(&self.client, self.completions_url(), &self.api_key, self.timeout, &body) => result?,
                    };

                    if !status.is_success() {
                        return Err(map_http_status(status, &text));
                    }

                    let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| {
                        ProviderError::InvalidRequest(format!("invalid JSON response: {e}"))
                    })?;

                    let content = json
                        .get("choices")
                        .and_then(|c| c.get(0))
                        .and_then(|c| c.get("message"))
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
                            provider_name: "openai".to_string(),
                        }),
                        _ => Err(ProviderError::EmptyResponse {
                            provider: "openai".to_string(),
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

impl StreamingProvider for OpenAi {
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
                    .post(self.completions_url())
                    .bearer_auth(&self.api_key)
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
                result = decode_sse(byte_stream, on_token) => result.map_err(|e| ProviderError::Stream(e.to_string()))?,
            };

            if content.is_empty() {
                return Err(ProviderError::EmptyResponse {
                    provider: "openai".to_string(),
                    model,
                    status: status.as_u16(),
                    snippet: String::new(),
                });
            }

            Ok(ChatResponse {
                content,
                model,
                provider_name: "openai".to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_model_and_base_url() {
        let client = OpenAi::new("sk-test");
        assert_eq!(client.model, DEFAULT_MODEL);
        assert_eq!(client.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn builder_overrides() {
        let client = OpenAi::new("k").model("gpt-4o").base_url("http://localhost:9999");
        assert_eq!(client.model, "gpt-4o");
        assert_eq!(client.completions_url(), "http://localhost:9999/v1/chat/completions");
    }

    #[test]
    fn build_body_keeps_system_messages_inline() {
        let client = OpenAi::new("k");
        let messages = vec![ChatMessage::system("be terse"), ChatMessage::user("hi")];
        let resolved = ResolvedChatOptions {
            temperature: 0.5,
            max_tokens: Some(100),
        };
        let body = client.build_body(&messages, resolved, "gpt-x");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["max_tokens"], 100);
    }

    #[test]
    fn build_body_omits_max_tokens_when_unspecified() {
        let client = OpenAi::new("k");
        let messages = vec![ChatMessage::user("hi")];
        let resolved = ResolvedChatOptions {
            temperature: 0.5,
            max_tokens: None,
        };
        let body = client.build_body(&messages, resolved, "gpt-x");
        assert!(body.get("max_tokens").is_none());
    }
}
