//! Provider data model, traits, fallback chain (C4), and retry/backoff
//! engine (C5).
//!
//! This crate defines the shape every concrete provider adapter
//! (`reason-provider-anthropic`, `-openai`, `-ollama`) implements against,
//! plus the two pieces of provider-agnostic plumbing that wrap them:
//! [`fallback::FallbackChain`] and [`retry::retry`].

#![deny(missing_docs)]

pub mod dynp;
pub mod error;
pub mod fallback;
pub mod retry;
pub mod traits;
pub mod types;

pub use dynp::DynProvider;
pub use error::ProviderError;
pub use fallback::FallbackChain;
pub use retry::{retry, RetryPolicy};
pub use traits::{Provider, StreamingProvider};
pub use types::{ChatMessage, ChatOptions, ChatResponse, ResolvedChatOptions, Role};
