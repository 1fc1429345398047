//! `Provider` / `StreamingProvider` traits (§3, §9 "Polymorphism").
//!
//! Grounded on the teacher's `Provider` trait (`agent-types::traits`): RPITIT
//! async methods, not object-safe by design — callers compose with generics
//! rather than `dyn Provider`. `StreamingProvider` is a separate trait so
//! dispatch on streaming support is a plain trait-bound check, matching the
//! teacher's `Provider` / (object-safe-free) capability split.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::types::{ChatMessage, ChatOptions, ChatResponse};

/// A named chat provider.
pub trait Provider: Send + Sync {
    /// The provider's identity, e.g. `"anthropic"`.
    fn name(&self) -> &str;

    /// Send a non-streaming chat request. `cancel` is the run-wide token
    /// (§5): it must reach the limiter acquire, every retry backoff sleep,
    /// and the HTTP dispatch itself, not just be checked between calls.
    fn chat(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ChatResponse, ProviderError>> + Send;
}

/// A provider that additionally supports token-streaming chat.
///
/// `on_token` is invoked synchronously, in emission order, once per text
/// fragment (§4.6, §9 "resist fanning tokens to a separate queue").
///
/// The default body degrades to a single synthetic "fragment" carrying the
/// whole response, for adapters that don't implement real streaming;
/// `supports_streaming` tells [`crate::fallback::FallbackChain`] whether to
/// prefer the real streaming path (§4.4 "falls back to non-streaming").
pub trait StreamingProvider: Provider {
    /// Whether this instance currently supports true token streaming.
    fn supports_streaming(&self) -> bool {
        false
    }

    /// Send a streaming chat request, calling `on_token` for each fragment.
    fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
        on_token: &mut (dyn FnMut(&str) + Send),
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ChatResponse, ProviderError>> + Send {
        async move {
            let response = self.chat(messages, options, cancel).await?;
            on_token(&response.content);
            Ok(response)
        }
    }
}
