//! Chat message / options data model (§3 "Chat message", "Chat options").

use serde::{Deserialize, Serialize};

/// The role of a message author in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// A system/instruction message.
    System,
    /// A human user message.
    User,
    /// An assistant (model) message.
    Assistant,
}

/// A single `(role, content)` pair. Ordered sequences form a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who authored this message.
    pub role: Role,
    /// Plain-text content.
    pub content: String,
}

impl ChatMessage {
    /// Build a system message.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Build a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Per-request chat options (§3 "Chat options").
///
/// `resolve` applies the normalization rules at point of use: temperature is
/// rounded to two decimals and clamped to `[0, 1]`; `max_tokens <= 0` means
/// "unspecified"; a positive value is clamped to the configured cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ChatOptions {
    /// Sampling temperature, conventionally in `[0, 1]` once resolved.
    pub temperature: Option<f64>,
    /// Requested max output tokens. `<= 0` or `None` means "unspecified".
    pub max_tokens: Option<i64>,
    /// Per-request model override, taking priority over the provider default.
    pub model_override: Option<ResolvedModel>,
}

/// A resolved model override is just a name; kept as a newtype so call sites
/// don't confuse it with an arbitrary `Option<String>`.
pub type ResolvedModel = std::borrow::Cow<'static, str>;

/// A fully resolved, in-bounds `(temperature, max_tokens)` pair, ready to be
/// serialized into a provider's wire request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedChatOptions {
    /// Temperature rounded to 2 decimals and clamped to `[0, 1]`.
    pub temperature: f64,
    /// `None` means "let the provider pick its own default".
    pub max_tokens: Option<u32>,
}

impl ChatOptions {
    /// Apply the §3 resolution rules against the process config's
    /// `max_tokens_cap`.
    #[must_use]
    pub fn resolve(&self, max_tokens_cap: u32) -> ResolvedChatOptions {
        let temperature = self
            .temperature
            .unwrap_or(0.7)
            .clamp(0.0, 1.0);
        let temperature = (temperature * 100.0).round() / 100.0;

        let max_tokens = match self.max_tokens {
            Some(n) if n > 0 => Some((n as u64).min(u64::from(max_tokens_cap)) as u32),
            _ => None,
        };

        ResolvedChatOptions {
            temperature,
            max_tokens,
        }
    }
}

/// A completed chat response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatResponse {
    /// The assistant's text content.
    pub content: String,
    /// The model name that actually served the request (provider-reported,
    /// falling back to the requested model if the provider doesn't echo one).
    pub model: String,
    /// Name of the provider that served the request.
    pub provider_name: String,
}
