//! Newline-delimited-JSON decoder (§4.6), for Ollama-style `/api/chat`
//! streams: one JSON object per line, `message.content` (or the alternate
//! reasoning key) is the fragment, a record with `done: true` ends decoding.

use bytes::Bytes;
use futures::{Stream, StreamExt};

use crate::error::StreamError;
use crate::linebuf::LineBuffer;

fn extract_fragment(json: &serde_json::Value) -> Option<&str> {
    let message = json.get("message")?;
    message
        .get("content")
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            message
                .get("reasoning_content")
                .and_then(serde_json::Value::as_str)
        })
}

fn is_done(json: &serde_json::Value) -> bool {
    json.get("done").and_then(serde_json::Value::as_bool) == Some(true)
}

/// Decode an NDJSON byte stream, invoking `on_token` for each text fragment.
///
/// Returns the fully accumulated text. Malformed individual lines are
/// ignored and decoding continues (§4.6).
pub async fn decode_ndjson<S>(
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
            if done || line.trim().is_empty() {
                return;
            }
            match serde_json::from_str::<serde_json::Value>(line) {
                Ok(json) => {
                    if let Some(fragment) = extract_fragment(&json) {
                        accumulated.push_str(fragment);
                        on_token(fragment);
                    }
                    if is_done(&json) {
                        done = true;
                    }
                }
                Err(_) => {
                    tracing::debug!(line, "ignoring malformed NDJSON line");
                }
            }
        });
        if done {
            break;
        }
    }

    Ok(accumulated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(lines: &[&str]) -> impl Stream<Item = Result<Bytes, StreamError>> {
        let joined = lines.join("\n") + "\n";
        stream::iter(vec![Ok(Bytes::from(joined))])
    }

    #[tokio::test]
    async fn accumulates_message_content() {
        let s = chunks(&[
            r#"{"message":{"content":"Hel"},"done":false}"#,
            r#"{"message":{"content":"lo"},"done":false}"#,
            r#"{"message":{"content":""},"done":true}"#,
        ]);
        let mut tokens = Vec::new();
        let text = decode_ndjson(s, |t| tokens.push(t.to_string())).await.unwrap();
        assert_eq!(text, "Hello");
        assert_eq!(tokens, vec!["Hel", "lo"]);
    }

    #[tokio::test]
    async fn stops_at_done_true() {
        let s = chunks(&[
            r#"{"message":{"content":"a"},"done":false}"#,
            r#"{"message":{"content":"b"},"done":true}"#,
            r#"{"message":{"content":"c"},"done":false}"#,
        ]);
        let text = decode_ndjson(s, |_| {}).await.unwrap();
        assert_eq!(text, "ab");
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let s = chunks(&[
            "not json",
            r#"{"message":{"content":"ok"},"done":true}"#,
        ]);
        let text = decode_ndjson(s, |_| {}).await.unwrap();
        assert_eq!(text, "ok");
    }
}
