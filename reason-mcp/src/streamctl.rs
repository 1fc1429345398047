//! Shared `stream*…` request-field parsing (§6) used by every reasoning
//! tool's request struct.
//!
//! The outward tool-call RPC framing that would actually carry streamed
//! tokens/events to a caller is explicitly out of scope (§1): these fields
//! are parsed and resolved to a [`StreamMode`] so each engine call still
//! runs with the right internal [`StreamingManager`] behavior (token
//! callback vs. event recording), but `stderr_stream`/`logging`/`progress`
//! only select which secondary channel a caller's own client would read
//! that stream from and carry no further meaning inside this crate.

use reason_events::{resolve_stream_mode, StreamMode};
use serde::Deserialize;

/// The five `stream*…` fields common to every reasoning tool (§6).
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(default)]
pub struct StreamRequestFields {
    /// Legacy boolean form: `true` means "stream tokens".
    pub stream: Option<bool>,
    /// Explicit stream mode, taking priority over `stream`.
    pub stream_mode: Option<StreamMode>,
    /// Mirror the stream to stderr in addition to the protocol channel.
    pub stderr_stream: Option<bool>,
    /// Route the stream through MCP logging notifications.
    pub logging: Option<bool>,
    /// Route the stream through MCP progress notifications.
    pub progress: Option<bool>,
}

impl StreamRequestFields {
    /// Resolve the effective [`StreamMode`] for this request (§4.5):
    /// `stream_mode` > `stream` > `REASONING_STREAM` env >
    /// `REASONING_STREAM_MODE` env > `none`.
    #[must_use]
    pub fn resolve(&self) -> StreamMode {
        let legacy_env = std::env::var("REASONING_STREAM")
            .ok()
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"));
        resolve_stream_mode(self.stream_mode, self.stream.or(legacy_env), "REASONING_STREAM_MODE")
    }
}
