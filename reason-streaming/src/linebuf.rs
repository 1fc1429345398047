//! Shared line-buffering helper: accumulates byte chunks and yields complete
//! `\n`-terminated lines (with a trailing `\r` stripped), used by both the
//! SSE and NDJSON decoders (§4.6).

/// Accumulates bytes across chunks and extracts complete lines.
#[derive(Default)]
pub struct LineBuffer {
    buf: String,
}

impl LineBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes (assumed UTF-8; invalid bytes are replaced)
    /// and drain every complete line found so far via `on_line`.
    pub fn feed(&mut self, chunk: &[u8], mut on_line: impl FnMut(&str)) {
        self.buf.push_str(&String::from_utf8_lossy(chunk));
        while let Some(pos) = self.buf.find('\n') {
            let line: String = self.buf.drain(..=pos).collect();
            let trimmed = line.trim_end_matches(['\n', '\r']);
            on_line(trimmed);
        }
    }

    /// Flush any trailing partial line (no terminating `\n` was ever seen)
    /// once the stream ends.
    pub fn finish(self, mut on_line: impl FnMut(&str)) {
        let trimmed = self.buf.trim_end_matches(['\n', '\r']);
        if !trimmed.is_empty() {
            on_line(trimmed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_multiple_lines_in_one_chunk() {
        let mut lb = LineBuffer::new();
        let mut lines = Vec::new();
        lb.feed(b"a\nb\nc", |l| lines.push(l.to_string()));
        assert_eq!(lines, vec!["a", "b"]);
        lb.finish(|l| lines.push(l.to_string()));
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn handles_line_split_across_chunks() {
        let mut lb = LineBuffer::new();
        let mut lines = Vec::new();
        lb.feed(b"hel", |l| lines.push(l.to_string()));
        lb.feed(b"lo\nworld\n", |l| lines.push(l.to_string()));
        assert_eq!(lines, vec!["hello", "world"]);
    }

    #[test]
    fn strips_trailing_carriage_return() {
        let mut lb = LineBuffer::new();
        let mut lines = Vec::new();
        lb.feed(b"a\r\nb\r\n", |l| lines.push(l.to_string()));
        assert_eq!(lines, vec!["a", "b"]);
    }
}
