//! Streaming errors (§7 "parse error, stream-read error; does not trigger
//! HTTP retry").

/// Error terminating an in-progress stream decode.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum StreamError {
    /// The underlying byte stream itself errored (transport-level).
    #[error("stream read error: {0}")]
    Io(String),
}

impl From<String> for StreamError {
    fn from(s: String) -> Self {
        StreamError::Io(s)
    }
}
