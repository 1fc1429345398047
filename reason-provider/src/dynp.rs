//! Object-safe boxed-future wrapper around [`Provider`]/[`StreamingProvider`].
//!
//! `Provider`/`StreamingProvider` use return-position `impl Future` and are
//! intentionally not object-safe (§9 "Polymorphism": "use generics `<P:
//! Provider>` to compose"). [`FallbackChain`] (C4) needs to hold a
//! heterogeneous, ordered list of providers, so it operates over this
//! `dyn`-friendly wrapper instead — grounded on the teacher's `ToolDyn`
//! pattern (`neuron-tool::ToolDyn`), which boxes futures for the same reason.

use std::future::Future;
use std::pin::Pin;

use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::traits::StreamingProvider;
use crate::types::{ChatMessage, ChatOptions, ChatResponse};

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe provider handle used by [`crate::fallback::FallbackChain`].
pub trait DynProvider: Send + Sync {
    /// The provider's identity, e.g. `"anthropic"`.
    fn name(&self) -> &str;

    /// Whether this instance supports true token streaming.
    fn supports_streaming(&self) -> bool;

    /// Boxed non-streaming chat call.
    fn chat<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: ChatOptions,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<ChatResponse, ProviderError>>;

    /// Boxed streaming chat call.
    fn chat_stream<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: ChatOptions,
        on_token: &'a mut (dyn FnMut(&str) + Send),
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<ChatResponse, ProviderError>>;
}

impl<T> DynProvider for T
where
    T: StreamingProvider + Send + Sync,
{
    fn name(&self) -> &str {
        Provider::name(self)
    }

    fn supports_streaming(&self) -> bool {
        StreamingProvider::supports_streaming(self)
    }

    fn chat<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: ChatOptions,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<ChatResponse, ProviderError>> {
        Box::pin(Provider::chat(self, messages, options, cancel))
    }

    fn chat_stream<'a>(
        &'a self,
        messages: &'a [ChatMessage],
        options: ChatOptions,
        on_token: &'a mut (dyn FnMut(&str) + Send),
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<ChatResponse, ProviderError>> {
        Box::pin(StreamingProvider::chat_stream(
            self, messages, options, on_token, cancel,
        ))
    }
}

use crate::traits::Provider;
