//! Process-wide configuration (C1) and small utilities shared by every
//! crate in the reasoning-orchestration workspace.
//!
//! This crate intentionally stays small: a typed config snapshot with an
//! environment overlay and clamp-and-warn loading (§4.1), plus a couple
//! of helpers (UTF-8-safe truncation, canonical JSON) that every other
//! crate needs and that don't deserve their own crate.

#![deny(missing_docs)]

pub mod canonical;
pub mod config;
pub mod text;

pub use config::{Config, ConfigError, ProviderTimeouts, ToolTimeouts};
