//! Anthropic Messages API adapter implementing [`reason_provider::Provider`]
//! and [`reason_provider::StreamingProvider`] (C3).

#![deny(missing_docs)]

mod client;
mod error;

pub use client::Anthropic;
