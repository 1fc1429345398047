//! Fallback chain (C4) — an ordered, non-empty list of providers tried in
//! order until one succeeds (§4.4).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::dynp::DynProvider;
use crate::error::ProviderError;
use crate::types::{ChatMessage, ChatOptions, ChatResponse};

/// The composition of an ordered non-empty list of providers.
///
/// `chat`/`chat_stream` try each provider in order; the first that returns
/// without error wins. A list of length 1 behaves exactly like its inner
/// provider (collapses, per §3 "Provider").
pub struct FallbackChain {
    providers: Vec<Arc<dyn DynProvider>>,
}

impl FallbackChain {
    /// Build a fallback chain from an ordered, non-empty provider list.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::EmptyFallbackChain`] if `providers` is empty.
    pub fn new(providers: Vec<Arc<dyn DynProvider>>) -> Result<Self, ProviderError> {
        if providers.is_empty() {
            return Err(ProviderError::EmptyFallbackChain);
        }
        Ok(Self { providers })
    }

    /// The ordered provider names in this chain.
    #[must_use]
    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Try each provider's non-streaming chat in order. `cancel` is the
    /// run-wide token (§5) and is forwarded to every provider in turn, not
    /// just checked between them.
    ///
    /// # Errors
    ///
    /// [`ProviderError::FallbackExhausted`] naming every provider and its
    /// underlying error, if all fail.
    pub async fn chat(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, ProviderError> {
        let mut errors = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            match provider.chat(messages, options, cancel).await {
                Ok(resp) => return Ok(resp),
                Err(ProviderError::Cancelled) if cancel.is_cancelled() => return Err(ProviderError::Cancelled),
                Err(err) => {
                    tracing::debug!(provider = provider.name(), error = %err, "fallback provider failed");
                    errors.push(format!("{}: {err}", provider.name()));
                }
            }
        }
        Err(ProviderError::FallbackExhausted(errors.join("; ")))
    }

    /// Try each provider's streaming chat in order. A provider that doesn't
    /// advertise streaming support is still called — its `chat_stream`
    /// degrades to a single synthetic fragment (§4.4 "falls back to
    /// non-streaming"). `cancel` is forwarded the same way as [`Self::chat`].
    ///
    /// # Errors
    ///
    /// Same as [`Self::chat`].
    pub async fn chat_stream(
        &self,
        messages: &[ChatMessage],
        options: ChatOptions,
        on_token: &mut (dyn FnMut(&str) + Send),
        cancel: &CancellationToken,
    ) -> Result<ChatResponse, ProviderError> {
        let mut errors = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            if cancel.is_cancelled() {
                return Err(ProviderError::Cancelled);
            }
            match provider.chat_stream(messages, options, on_token, cancel).await {
                Ok(resp) => return Ok(resp),
                Err(ProviderError::Cancelled) if cancel.is_cancelled() => return Err(ProviderError::Cancelled),
                Err(err) => {
                    tracing::debug!(provider = provider.name(), error = %err, "fallback provider failed");
                    errors.push(format!("{}: {err}", provider.name()));
                }
            }
        }
        Err(ProviderError::FallbackExhausted(errors.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{Provider, StreamingProvider};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        name: &'static str,
        fail: bool,
        calls: AtomicUsize,
    }

    impl Provider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }

        fn chat(
            &self,
            _messages: &[ChatMessage],
            _options: ChatOptions,
            _cancel: &CancellationToken,
        ) -> impl std::future::Future<Output = Result<ChatResponse, ProviderError>> + Send {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = self.name;
            let fail = self.fail;
            async move {
                if fail {
                    Err(ProviderError::Authentication("nope".into()))
                } else {
                    Ok(ChatResponse {
                        content: "ok".into(),
                        model: "stub-model".into(),
                        provider_name: name.into(),
                    })
                }
            }
        }
    }

    impl StreamingProvider for StubProvider {}

    #[test]
    fn empty_chain_is_a_construction_error() {
        let result = FallbackChain::new(vec![]);
        assert!(matches!(result, Err(ProviderError::EmptyFallbackChain)));
    }

    #[tokio::test]
    async fn first_success_wins_and_short_circuits() {
        let a = Arc::new(StubProvider {
            name: "a",
            fail: false,
            calls: AtomicUsize::new(0),
        });
        let b = Arc::new(StubProvider {
            name: "b",
            fail: false,
            calls: AtomicUsize::new(0),
        });
        let chain = FallbackChain::new(vec![a.clone(), b.clone()]).unwrap();
        let resp = chain.chat(&[], ChatOptions::default(), &CancellationToken::new()).await.unwrap();
        assert_eq!(resp.provider_name, "a");
        assert_eq!(a.calls.load(Ordering::SeqCst), 1);
        assert_eq!(b.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn falls_through_on_failure() {
        let a = Arc::new(StubProvider {
            name: "a",
            fail: true,
            calls: AtomicUsize::new(0),
        });
        let b = Arc::new(StubProvider {
            name: "b",
            fail: false,
            calls: AtomicUsize::new(0),
        });
        let chain = FallbackChain::new(vec![a, b]).unwrap();
        let resp = chain.chat(&[], ChatOptions::default(), &CancellationToken::new()).await.unwrap();
        assert_eq!(resp.provider_name, "b");
    }

    #[tokio::test]
    async fn exhaustion_names_every_provider() {
        let a = Arc::new(StubProvider {
            name: "A",
            fail: true,
            calls: AtomicUsize::new(0),
        });
        let b = Arc::new(StubProvider {
            name: "B",
            fail: true,
            calls: AtomicUsize::new(0),
        });
        let chain = FallbackChain::new(vec![a, b]).unwrap();
        let err = chain.chat(&[], ChatOptions::default(), &CancellationToken::new()).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("A: "), "{msg}");
        assert!(msg.contains("B: "), "{msg}");
    }

    #[tokio::test]
    async fn single_provider_collapses_to_inner() {
        let a = Arc::new(StubProvider {
            name: "solo",
            fail: false,
            calls: AtomicUsize::new(0),
        });
        let chain = FallbackChain::new(vec![a]).unwrap();
        assert_eq!(chain.provider_names(), vec!["solo"]);
    }
}
