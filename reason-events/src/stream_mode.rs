//! Stream-mode resolution (§4.5, §9): which channel(s) an engine publishes
//! intermediate progress on.

use serde::{Deserialize, Serialize};

/// What an engine publishes while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    /// Publish nothing beyond the final result.
    #[default]
    None,
    /// Publish token fragments only (`on_token`).
    Tokens,
    /// Publish structured events only (`on_progress`).
    Events,
    /// Publish both tokens and events.
    Both,
}

impl StreamMode {
    /// Whether this mode calls `on_token`.
    #[must_use]
    pub fn wants_tokens(self) -> bool {
        matches!(self, Self::Tokens | Self::Both)
    }

    /// Whether this mode calls `on_progress` / records events.
    #[must_use]
    pub fn wants_events(self) -> bool {
        matches!(self, Self::Events | Self::Both)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Some(Self::None),
            "tokens" => Some(Self::Tokens),
            "events" => Some(Self::Events),
            "both" => Some(Self::Both),
            _ => None,
        }
    }
}

/// Resolve the effective [`StreamMode`] for a request.
///
/// Precedence (§4.5): explicit arg > legacy boolean arg > env var > default
/// `none`. The legacy boolean (a pre-stream-mode `stream: bool` flag) maps
/// `true` to [`StreamMode::Tokens`] — the only channel the boolean form ever
/// meant — and `false` falls through to the next tier rather than pinning
/// `None`, since an absent/false legacy flag carries no signal either way.
#[must_use]
pub fn resolve_stream_mode(
    explicit: Option<StreamMode>,
    legacy_bool: Option<bool>,
    env_var: &str,
) -> StreamMode {
    if let Some(mode) = explicit {
        return mode;
    }
    if let Some(true) = legacy_bool {
        return StreamMode::Tokens;
    }
    if let Ok(raw) = std::env::var(env_var) {
        if let Some(mode) = StreamMode::parse(&raw) {
            return mode;
        }
        tracing::warn!(env_var, value = %raw, "unrecognized stream mode, ignoring");
    }
    StreamMode::default()
}
