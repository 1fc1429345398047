//! Server-sent-event decoder (§4.6).
//!
//! Line-buffered. A `data:` line carrying the sentinel `[DONE]` terminates
//! the stream. Other `data:` lines are expected to be JSON chunks; the
//! fragment is `choices[0].delta.content` if present, else
//! `choices[0].delta.reasoning_content` (providers whose non-final content
//! appears under that alternate key). Malformed individual records are
//! ignored and decoding continues (§4.6 "both ignore malformed individual
//! records and continue").

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::StreamError;
use crate::linebuf::LineBuffer;

const DONE_SENTINEL: &str = "[DONE]";

fn extract_fragment(json: &serde_json::Value) -> Option<&str> {
    let delta = json.get("choices")?.get(0)?.get("delta")?;
    delta
        .get("content")
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            delta
                .get("reasoning_content")
                .and_then(serde_json::Value::as_str)
        })
}

/// Decode an SSE byte stream, invoking `on_token` for each text fragment.
///
/// Returns the fully accumulated text. A transport-level read error
/// terminates decoding and is returned as [`StreamError`]; this never
/// triggers an HTTP-level retry (§4.3 streaming variant, §7).
pub async fn decode_sse<S>(
    mut stream: S,
    mut on_token: impl FnMut(&str) + Send,
) -> Result<String, StreamError>
where
    S: Stream<Item = Result<Bytes, StreamError>> + Unpin,
{
    let mut accumulated = String::new();
    let mut buf = LineBuffer::new();
    let mut done = false;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        buf.feed(&chunk, |line| {
            if done {
                return;
            }
            let Some(data) = line.strip_prefix("data:") else {
                return;
            };
            let data = data.trim_start();
            if data == DONE_SENTINEL {
                done = true;
                return;
            }
            match serde_json::from_str::<serde_json::Value>(data) {
                Ok(json) => {
                    if let Some(fragment) = extract_fragment(&json) {
                        accumulated.push_str(fragment);
                        on_token(fragment);
                    }
                }
                Err(_) => {
                    tracing::debug!(line = %data, "ignoring malformed SSE data line");
                }
            }
        });
        if done {
            break;
        }
    }

    Ok(accumulated)
}
