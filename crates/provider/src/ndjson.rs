use bytes::Bytes;
use futures::Stream;
use grok_bridge_core::error::ProxyError;
use grok_bridge_core::provider::LineStream;
use std::collections::VecDeque;
use std::pin::Pin;
use tokio_stream::StreamExt;

/// Reassembles newline-delimited lines from arbitrarily split byte chunks.
///
/// Bytes are buffered raw and only decoded once a full line is available, so
/// a chunk boundary falling inside a multi-byte UTF-8 sequence is harmless.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
    /// Leading bytes of `buffer` already known to hold no newline.
    scanned: usize,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete, non-blank line (trimmed).
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.buffer[from..].iter().position(|&b| b == b'\n') {
            let end = from + offset;
            if let Some(line) = decode_line(&self.buffer[start..end]) {
                lines.push(line);
            }
            start = end + 1;
            from = start;
        }
        self.buffer.drain(..start);
        self.scanned = self.buffer.len();
        lines
    }

    /// Take whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        decode_line(&rest)
    }

    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    (!line.is_empty()).then(|| line.to_string())
}

struct NdjsonState {
    stream: Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>,
    buffer: LineBuffer,
    ready: VecDeque<String>,
    finished: bool,
}

/// Turn an upstream byte stream into a stream of complete lines.
///
/// A transport error is yielded once and ends the stream.
pub fn parse_ndjson_stream(
    byte_stream: impl Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
) -> LineStream {
    let state = NdjsonState {
        stream: Box::pin(byte_stream),
        buffer: LineBuffer::new(),
        ready: VecDeque::new(),
        finished: false,
    };

    let lines = futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.ready.pop_front() {
                return Some((Ok(line), state));
            }
            if state.finished {
                return None;
            }

            match state.stream.next().await {
                Some(Ok(bytes)) => state.ready.extend(state.buffer.push(&bytes)),
                Some(Err(e)) => {
                    state.finished = true;
                    state.ready.clear();
                    return Some((Err(ProxyError::from(e)), state));
                }
                None => {
                    state.finished = true;
                    if let Some(line) = state.buffer.finish() {
                        tracing::debug!("upstream body ended without a trailing newline");
                        state.ready.push_back(line);
                    }
                }
            }
        }
    });

    Box::pin(lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_mid_line() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"{\"result\":").is_empty());
        assert_eq!(buf.pending_len(), 10);
        let lines = buf.push(b"{\"message\":\"a\"}}\n{\"res");
        assert_eq!(lines, vec![r#"{"result":{"message":"a"}}"#]);
        assert_eq!(buf.push(b"ult\":1}\n"), vec![r#"{"result":1}"#]);
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn test_long_line_in_small_chunks_is_scanned_once() {
        let mut buf = LineBuffer::new();
        let payload = "x".repeat(10_000);
        for piece in payload.as_bytes().chunks(7) {
            assert!(buf.push(piece).is_empty());
            assert_eq!(buf.scanned, buf.pending_len());
        }
        let lines = buf.push(b"\nnext");
        assert_eq!(lines, vec![payload]);
        assert_eq!(buf.pending_len(), 4);
        assert_eq!(buf.scanned, 4);
        assert_eq!(buf.push(b"\n"), vec!["next"]);
        assert_eq!(buf.scanned, 0);
    }

    #[test]
    fn test_multiple_lines_and_blank_lines() {
        let mut buf = LineBuffer::new();
        let lines = buf.push(b"a\n\n  \r\nb\r\nc\n");
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_multibyte_split_across_chunks() {
        let text = "{\"message\":\"héllo 思考\"}\n".as_bytes();
        let mut buf = LineBuffer::new();
        let mut lines = Vec::new();
        for byte in text {
            lines.extend(buf.push(std::slice::from_ref(byte)));
        }
        assert_eq!(lines, vec!["{\"message\":\"héllo 思考\"}"]);
    }

    #[test]
    fn test_finish_returns_trailing_line() {
        let mut buf = LineBuffer::new();
        buf.push(b"one\ntwo");
        assert_eq!(buf.finish().as_deref(), Some("two"));
        assert_eq!(buf.finish(), None);

        let mut blank = LineBuffer::new();
        blank.push(b"x\n   ");
        assert_eq!(blank.finish(), None);
    }

    #[tokio::test]
    async fn test_parse_stream() {
        let chunks: Vec<Result<Bytes, reqwest::Error>> = vec![
            Ok(Bytes::from_static(b"{\"a\":1}\n{\"b\"")),
            Ok(Bytes::from_static(b":2}\n\n")),
            Ok(Bytes::from_static(b"{\"c\":3}")),
        ];
        let lines: Vec<String> = parse_ndjson_stream(futures::stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(lines, vec!["{\"a\":1}", "{\"b\":2}", "{\"c\":3}"]);
    }
}
