//! Anthropic-style SSE decoder (§4.6).
//!
//! Tracks the most recent `event:` label; only emits the `delta.text` of
//! `content_block_delta` events; stops on `message_stop`.

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::StreamError;
use crate::linebuf::LineBuffer;

/// Decode an Anthropic Messages-API SSE byte stream.
///
/// Returns the fully accumulated text. Malformed individual records are
/// ignored and decoding continues (§4.6).
pub async fn decode_anthropic_sse<S>(
    mut stream: S,
    mut on_token: impl FnMut(&str) + Send,
) -> Result<String, StreamError>
where
    S: Stream<Item = Result<Bytes, StreamError>> + Unpin,
{
    let mut accumulated = String::new();
    let mut buf = LineBuffer::new();
    let mut current_event: Option<String> = None;
    let mut done = false;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        buf.feed(&chunk, |line| {
            if done {
                return;
            }
            if let Some(event) = line.strip_prefix("event:") {
                current_event = Some(event.trim().to_string());
                return;
            }
            let Some(data) = line.strip_prefix("data:") else {
                return;
            };
            let data = data.trim_start();

            match current_event.as_deref() {
                Some("message_stop") => {
                    done = true;
                }
                Some("content_block_delta") => {
                    match serde_json::from_str::<serde_json::Value>(data) {
                        Ok(json) => {
                            if let Some(text) = json
                                .get("delta")
                                .and_then(|d| d.get("text"))
                                .and_then(serde_json::Value::as_str)
                            {
                                accumulated.push_str(text);
                                on_token(text);
                            }
                        }
                        Err(_) => {
                            tracing::debug!(line = %data, "ignoring malformed Anthropic SSE data");
                        }
                    }
                }
                _ => {}
            }
        });
        if done {
            break;
        }
    }

    Ok(accumulated)
}
