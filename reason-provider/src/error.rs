//! Provider error taxonomy (§7), grounded on the teacher's
//! `neuron-types::ProviderError`.

use std::time::Duration;

/// Errors from LLM provider operations.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// Transient transport failure: timeout, connection reset, broken pipe,
    /// refused, partial-read EOF (§4.3.3).
    #[error("network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),
    /// HTTP 429; carries a provider-reported retry hint when present.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimit {
        /// Suggested retry delay, if the provider reported one.
        retry_after: Option<Duration>,
    },
    /// Request timed out against the provider's configured timeout.
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    /// HTTP 5xx.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// HTTP 401/403.
    #[error("authentication failed: {0}")]
    Authentication(String),
    /// Non-retryable HTTP 4xx other than 429.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// HTTP 404 model lookup failure.
    #[error("model not found: {0}")]
    ModelNotFound(String),
    /// A 2xx response carried no usable choice/content (§4.3.6, §7).
    #[error("empty response from {provider} (model {model}, status {status}): {snippet}")]
    EmptyResponse {
        /// Provider name.
        provider: String,
        /// Model requested.
        model: String,
        /// HTTP status of the otherwise-successful response.
        status: u16,
        /// Truncated response body, for diagnostics.
        snippet: String,
    },
    /// Error while reading/parsing a streaming response body. Never triggers
    /// an HTTP-level retry (§4.3 streaming variant).
    #[error("stream error: {0}")]
    Stream(String),
    /// The caller's cancellation token fired.
    #[error("cancelled")]
    Cancelled,
    /// All providers in a fallback chain failed (§4.4); the message lists
    /// each provider name and its underlying error.
    #[error("all providers failed: {0}")]
    FallbackExhausted(String),
    /// Constructing a fallback chain with zero providers.
    #[error("fallback chain must have at least one provider")]
    EmptyFallbackChain,
    /// Catch-all for anything not covered above.
    #[error("{0}")]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl ProviderError {
    /// Whether this error is likely transient and worth retrying (§4.3.3, §7).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimit { .. } | Self::Timeout(_) | Self::ServiceUnavailable(_)
        )
    }

    /// Whether this specific error is a rate-limit response, which grants
    /// the retry loop extra attempts (§4.3.4).
    #[must_use]
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimit { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_and_rate_limit_and_timeout_and_5xx_are_retryable() {
        assert!(ProviderError::Network(Box::new(std::io::Error::other("x"))).is_retryable());
        assert!(ProviderError::RateLimit { retry_after: None }.is_retryable());
        assert!(ProviderError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(ProviderError::ServiceUnavailable("x".into()).is_retryable());
    }

    #[test]
    fn auth_and_invalid_request_are_not_retryable() {
        assert!(!ProviderError::Authentication("x".into()).is_retryable());
        assert!(!ProviderError::InvalidRequest("x".into()).is_retryable());
        assert!(!ProviderError::ModelNotFound("x".into()).is_retryable());
    }

    #[test]
    fn rate_limit_is_flagged_distinctly() {
        assert!(ProviderError::RateLimit { retry_after: None }.is_rate_limit());
        assert!(!ProviderError::Timeout(Duration::from_secs(1)).is_rate_limit());
    }
}
