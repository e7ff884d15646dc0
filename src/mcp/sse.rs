// Jaskier Shared Pattern -- mcp/sse
//! Incremental `text/event-stream` decoder.
//!
//! Frames are blank-line delimited; only `data:` lines carry payload and each
//! frame's payload is one JSON message. Comment lines (`: keep-alive`) become
//! [`SseEvent::KeepAlive`], and `data: [DONE]` ends the stream.
//!
//! Bytes are buffered raw so that a UTF-8 sequence split across two reads is
//! decoded only once the whole frame has arrived.

use futures_util::{Stream, StreamExt};
use serde_json::Value;

use super::types::STREAM_DONE_SENTINEL;

#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    Message(Value),
    KeepAlive,
    Done,
}

/// Largest frame the decoder will buffer. Bigger frames are dropped.
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a frame boundary.
    scanned: usize,
    /// Inside an oversized frame; bytes are dropped until its boundary.
    discarding: bool,
    max_frame: usize,
    finished: bool,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_frame(MAX_FRAME_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            discarding: false,
            max_frame,
            finished: false,
        }
    }

    /// True once the completion sentinel has been decoded. Further input is
    /// ignored.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Bytes received but not yet forming a complete frame.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }

    /// Append a chunk and return every event completed by it, in order.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        if self.finished {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        loop {
            // A boundary is at most three bytes long, so it can begin up to
            // two bytes before the end of the previous scan.
            let from = self.scanned.saturating_sub(2);
            let Some((frame_end, next_start)) = find_frame_boundary(&self.buffer, from) else {
                self.scanned = self.buffer.len();
                self.enforce_limit();
                break;
            };

            let frame: Vec<u8> = self.buffer.drain(..next_start).take(frame_end).collect();
            self.scanned = 0;

            if std::mem::take(&mut self.discarding) {
                continue;
            }
            if frame.len() > self.max_frame {
                tracing::warn!(bytes = frame.len(), limit = self.max_frame, "sse: skipping oversized frame");
                continue;
            }
            if let Some(event) = decode_frame(&frame) {
                let done = event == SseEvent::Done;
                events.push(event);
                if done {
                    self.finished = true;
                    self.buffer.clear();
                    break;
                }
            }
        }
        events
    }

    /// Drop the head of an unterminated frame that outgrew the limit, keeping
    /// the tail so a boundary split across reads is still recognised.
    fn enforce_limit(&mut self) {
        if self.buffer.len() <= self.max_frame {
            return;
        }
        if !self.discarding {
            tracing::warn!(limit = self.max_frame, "sse: frame exceeds size limit, skipping it");
            self.discarding = true;
        }
        let keep = self.buffer.len().min(2);
        self.buffer.drain(..self.buffer.len() - keep);
        self.scanned = self.buffer.len();
    }

    /// Discard whatever is left in the buffer. An incomplete trailing frame
    /// never produces an event; returns the number of bytes dropped.
    pub fn finish(&mut self) -> usize {
        let dropped = self.buffer.len();
        if dropped > 0 && !self.finished {
            tracing::debug!(bytes = dropped, "sse: discarding incomplete trailing frame");
        }
        self.buffer.clear();
        self.scanned = 0;
        self.discarding = false;
        dropped
    }
}

/// Locate the first blank line at or after `from`. Returns
/// `(end of frame, start of next frame)`.
fn find_frame_boundary(buf: &[u8], from: usize) -> Option<(usize, usize)> {
    let mut i = from;
    while i < buf.len() {
        if buf[i] == b'\n' {
            match buf.get(i + 1) {
                Some(b'\n') => return Some((i, i + 2)),
                Some(b'\r') if buf.get(i + 2) == Some(&b'\n') => return Some((i, i + 3)),
                _ => {}
            }
        }
        i += 1;
    }
    None
}

fn decode_frame(frame: &[u8]) -> Option<SseEvent> {
    let text = match std::str::from_utf8(frame) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!("sse: skipping frame with invalid UTF-8: {}", e);
            return None;
        }
    };

    let mut data_lines: Vec<&str> = Vec::new();
    let mut saw_comment = false;

    for line in text.split('\n') {
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        if line.starts_with(':') {
            saw_comment = true;
            continue;
        }
        if let Some(rest) = line.strip_prefix("data:") {
            data_lines.push(rest.strip_prefix(' ').unwrap_or(rest));
        }
        // `event:`, `id:` and `retry:` carry nothing we route on.
    }

    if data_lines.is_empty() {
        return saw_comment.then_some(SseEvent::KeepAlive);
    }

    let data = data_lines.join("\n");
    if data.trim() == STREAM_DONE_SENTINEL {
        return Some(SseEvent::Done);
    }

    match serde_json::from_str::<Value>(&data) {
        Ok(v) => Some(SseEvent::Message(v)),
        Err(e) => {
            tracing::warn!("sse: skipping malformed frame body: {}", e);
            None
        }
    }
}

/// Decode a chunked byte source into a lazy sequence of events.
///
/// The sequence ends right after [`SseEvent::Done`] (the source is not polled
/// again), when the source ends, or after the first source error.
pub fn decode_stream<S, B, E>(source: S) -> impl Stream<Item = Result<SseEvent, E>>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    async_stream::stream! {
        let mut decoder = SseDecoder::new();
        futures_util::pin_mut!(source);

        while let Some(chunk) = source.next().await {
            match chunk {
                Ok(bytes) => {
                    for event in decoder.feed(bytes.as_ref()) {
                        yield Ok(event);
                    }
                    if decoder.is_finished() {
                        return;
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        decoder.finish();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::convert::Infallible;

    #[test]
    fn decodes_single_frame() {
        let mut d = SseDecoder::new();
        let ev = d.feed(b"data: {\"jsonrpc\":\"2.0\"}\n\n");
        assert_eq!(ev, vec![SseEvent::Message(json!({ "jsonrpc": "2.0" }))]);
        assert_eq!(d.pending_bytes(), 0);
    }

    #[test]
    fn buffers_frame_split_across_reads() {
        let mut d = SseDecoder::new();
        assert!(d.feed(b"data: {\"a\"").is_empty());
        assert!(d.feed(b":1}\n").is_empty());
        assert_eq!(d.feed(b"\n"), vec![SseEvent::Message(json!({ "a": 1 }))]);
    }

    #[test]
    fn split_utf8_sequence_is_reassembled() {
        let bytes = "data: {\"s\":\"zażółć\"}\n\n".as_bytes();
        // Split inside the two-byte 'ż'.
        let split = bytes.iter().position(|&b| b == 0xC5).unwrap() + 1;
        let mut d = SseDecoder::new();
        assert!(d.feed(&bytes[..split]).is_empty());
        assert_eq!(
            d.feed(&bytes[split..]),
            vec![SseEvent::Message(json!({ "s": "zażółć" }))]
        );
    }

    #[test]
    fn comment_frames_are_keep_alives() {
        let mut d = SseDecoder::new();
        assert_eq!(d.feed(b": keep-alive\n\n"), vec![SseEvent::KeepAlive]);
        assert_eq!(d.feed(b":\n\n"), vec![SseEvent::KeepAlive]);
    }

    #[test]
    fn done_sentinel_finishes_and_ignores_rest() {
        let mut d = SseDecoder::new();
        let ev = d.feed(b"data: {\"n\":1}\n\ndata: [DONE]\n\ndata: {\"n\":2}\n\n");
        assert_eq!(ev, vec![SseEvent::Message(json!({ "n": 1 })), SseEvent::Done]);
        assert!(d.is_finished());
        assert!(d.feed(b"data: {\"n\":3}\n\n").is_empty());
    }

    #[test]
    fn malformed_frame_is_skipped() {
        let mut d = SseDecoder::new();
        let ev = d.feed(b"data: {not json\n\ndata: {\"ok\":true}\n\n");
        assert_eq!(ev, vec![SseEvent::Message(json!({ "ok": true }))]);
    }

    #[test]
    fn crlf_and_multiline_data() {
        let mut d = SseDecoder::new();
        let ev = d.feed(b"event: message\r\ndata: {\"a\":\r\ndata: 1}\r\n\r\n");
        assert_eq!(ev, vec![SseEvent::Message(json!({ "a": 1 }))]);
    }

    #[test]
    fn incomplete_trailing_frame_yields_nothing() {
        let mut d = SseDecoder::new();
        let ev = d.feed(b"data: {\"a\":1}\n\ndata: {\"b\":2}");
        assert_eq!(ev, vec![SseEvent::Message(json!({ "a": 1 }))]);
        assert_eq!(d.finish(), "data: {\"b\":2}".len());
    }

    #[test]
    fn oversized_frame_is_skipped_and_buffer_stays_bounded() {
        let mut d = SseDecoder::with_max_frame(32);
        assert!(d.feed(b"data: {\"big\":\"").is_empty());
        for _ in 0..100 {
            assert!(d.feed(&[b'x'; 16]).is_empty());
            assert!(d.pending_bytes() <= 32 + 16);
        }
        let ev = d.feed(b"\"}\n\ndata: {\"ok\":1}\n\n");
        assert_eq!(ev, vec![SseEvent::Message(json!({ "ok": 1 }))]);
        assert_eq!(d.pending_bytes(), 0);
    }

    #[test]
    fn complete_frame_over_limit_is_skipped() {
        let mut d = SseDecoder::with_max_frame(16);
        let ev = d.feed(b"data: {\"s\":\"0123456789abcdef\"}\n\ndata: {\"n\":2}\n\n");
        assert_eq!(ev, vec![SseEvent::Message(json!({ "n": 2 }))]);
    }

    #[test]
    fn boundary_split_after_limit_trim_is_found() {
        let mut d = SseDecoder::with_max_frame(16);
        assert!(d.feed(b"data: aaaaaaaaaaaaaaaa\r\n\r").is_empty());
        assert_eq!(d.feed(b"\ndata: {\"n\":3}\n\n"), vec![SseEvent::Message(json!({ "n": 3 }))]);
    }

    #[test]
    fn same_bytes_decode_identically_regardless_of_chunking() {
        let input = b"data: {\"i\":1}\n\n: ping\n\ndata: {\"i\":2}\n\ndata: [DONE]\n\n";
        let mut whole = SseDecoder::new();
        let expected = whole.feed(input);

        let mut bytewise = SseDecoder::new();
        let mut got = Vec::new();
        for b in input.iter() {
            got.extend(bytewise.feed(std::slice::from_ref(b)));
        }
        assert_eq!(got, expected);
        assert_eq!(expected.len(), 4);
    }

    #[tokio::test]
    async fn decode_stream_stops_after_done() {
        let chunks: Vec<Result<&[u8], Infallible>> = vec![
            Ok(&b"data: {\"i\":1}\n"[..]),
            Ok(&b"\ndata: [DONE]\n\n"[..]),
            Ok(&b"data: {\"i\":2}\n\n"[..]),
        ];
        let events: Vec<_> = decode_stream(futures_util::stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(events, vec![SseEvent::Message(json!({ "i": 1 })), SseEvent::Done]);
    }

    #[tokio::test]
    async fn decode_stream_forwards_source_error() {
        let chunks: Vec<Result<&[u8], &str>> = vec![Ok(&b"data: {\"i\":1}\n\n"[..]), Err("boom")];
        let events: Vec<_> = decode_stream(futures_util::stream::iter(chunks)).collect().await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], Err("boom"));
    }
}
