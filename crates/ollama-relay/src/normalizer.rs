//! NDJSON line buffering and decoding of upstream generation bodies.

use std::collections::VecDeque;
use std::fmt::Display;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures::stream::{FusedStream, Stream};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::event::StreamEvent;

/// One line of an upstream response body.
///
/// Ollama sends `{"message":{"content":..}}` from `/api/chat`,
/// `{"response":..}` from `/api/generate`, and `{"error":..}` when generation
/// fails after the status line was sent.
#[derive(Debug, Deserialize)]
struct UpstreamLine {
    #[serde(default)]
    message: Option<UpstreamMessage>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Deserialize)]
struct UpstreamMessage {
    #[serde(default)]
    content: Option<String>,
}

impl UpstreamLine {
    fn text(self) -> Option<String> {
        let chat = self
            .message
            .and_then(|message| message.content)
            .filter(|content| !content.is_empty());
        chat.or_else(|| self.response.filter(|response| !response.is_empty()))
    }
}

/// Longest line kept while waiting for its newline.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Incremental decoder from raw body fragments to [`StreamEvent`]s.
///
/// Fragments may split lines (and UTF-8 sequences) anywhere; incomplete
/// trailing bytes stay buffered until the next fragment. A partial line longer
/// than the configured maximum fails the stream. Once a terminal event has
/// been produced every further call returns no events.
#[derive(Debug)]
pub struct NdjsonNormalizer {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline.
    scanned: usize,
    max_line_bytes: usize,
    finished: bool,
}

impl Default for NdjsonNormalizer {
    fn default() -> Self {
        Self::with_max_line_bytes(MAX_LINE_BYTES)
    }
}

impl NdjsonNormalizer {
    /// Create an empty normalizer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a normalizer that rejects lines longer than `max_line_bytes`.
    pub fn with_max_line_bytes(max_line_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line_bytes,
            finished: false,
        }
    }

    /// Whether a terminal event has been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Feed one fragment and return the events of every line it completed.
    pub fn push(&mut self, fragment: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.finished {
            return events;
        }

        self.buffer.extend_from_slice(fragment);

        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.buffer[from..].iter().position(|&b| b == b'\n') {
            let end = from + offset;
            let terminal = decode_line(&self.buffer[start..end], &mut events);
            start = end + 1;

            if terminal {
                if start < self.buffer.len() {
                    debug!(
                        "Discarding {} bytes after terminal line",
                        self.buffer.len() - start
                    );
                }
                self.finished = true;
                self.buffer.clear();
                return events;
            }
            from = start;
        }

        self.buffer.drain(..start);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_line_bytes {
            warn!(
                "Upstream line exceeds {} bytes without a newline",
                self.max_line_bytes
            );
            events.extend(self.fail(format!(
                "Upstream line exceeded {} bytes",
                self.max_line_bytes
            )));
        }
        events
    }

    /// The upstream body ended without a terminal line.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        if !self.buffer.is_empty() {
            debug!(
                "Dropping {} bytes of unterminated trailing line",
                self.buffer.len()
            );
        }

        self.finished = true;
        self.buffer.clear();
        self.scanned = 0;
        vec![StreamEvent::chunk(""), StreamEvent::Done]
    }

    /// Reading the upstream body failed.
    pub fn fail(&mut self, message: impl Into<String>) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }

        self.finished = true;
        self.buffer.clear();
        self.scanned = 0;
        vec![StreamEvent::error(message)]
    }
}

/// Decode one raw line into `events`. Returns true if the line is terminal.
fn decode_line(raw: &[u8], events: &mut Vec<StreamEvent>) -> bool {
    let Ok(text) = std::str::from_utf8(raw) else {
        debug!("Skipping upstream line with invalid UTF-8");
        return false;
    };

    let line = text.trim();
    if line.is_empty() {
        return false;
    }

    let mut parsed: UpstreamLine = match serde_json::from_str(line) {
        Ok(parsed) => parsed,
        Err(e) => {
            debug!("Skipping malformed upstream line: {} ({})", line, e);
            return false;
        }
    };

    if let Some(message) = parsed.error.take() {
        warn!("Upstream reported an error mid-stream: {}", message);
        events.push(StreamEvent::error(message));
        return true;
    }

    let done = parsed.done;
    if let Some(text) = parsed.text() {
        events.push(StreamEvent::chunk(text));
    }

    if done {
        events.push(StreamEvent::Done);
    }
    done
}

/// A [`Stream`] of normalized events over an upstream byte stream.
///
/// The upstream source is dropped as soon as a terminal event is produced (or
/// when this stream is dropped), which releases the upstream connection. The
/// stream is fused: after the terminal event it yields `None` forever.
pub struct NormalizedStream<S> {
    source: Option<S>,
    normalizer: NdjsonNormalizer,
    pending: VecDeque<StreamEvent>,
}

impl<S> NormalizedStream<S> {
    /// Wrap an upstream byte stream.
    pub fn new(source: S) -> Self {
        Self {
            source: Some(source),
            normalizer: NdjsonNormalizer::new(),
            pending: VecDeque::new(),
        }
    }

    /// Whether the upstream source is still held open.
    pub fn is_upstream_open(&self) -> bool {
        self.source.is_some()
    }
}

impl<S, E> Stream for NormalizedStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(event));
            }

            let Some(source) = this.source.as_mut() else {
                return Poll::Ready(None);
            };

            match Pin::new(source).poll_next(cx) {
                Poll::Ready(Some(Ok(fragment))) => {
                    this.pending.extend(this.normalizer.push(&fragment));
                }
                Poll::Ready(Some(Err(e))) => {
                    warn!("Upstream stream error: {}", e);
                    this.pending
                        .extend(this.normalizer.fail(format!("Stream error occurred: {}", e)));
                }
                Poll::Ready(None) => {
                    debug!("Upstream body ended");
                    this.pending.extend(this.normalizer.finish());
                }
                Poll::Pending => return Poll::Pending,
            }

            if this.normalizer.is_finished() {
                this.source = None;
            }
        }
    }
}

impl<S, E> FusedStream for NormalizedStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    fn is_terminated(&self) -> bool {
        self.source.is_none() && self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    const BODY: &str = concat!(
        "{\"message\":{\"role\":\"assistant\",\"content\":\"Hal\"},\"done\":false}\n",
        "not json at all\n",
        "\n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"o dunia \u{1F30F}\"},\"done\":false}\n",
        "   {\"response\":\" apa kabar\"}  \n",
        "{\"message\":{\"role\":\"assistant\",\"content\":\"\"},\"done\":true}\n",
        "{\"message\":{\"content\":\"ignored\"}}\n",
    );

    fn expected() -> Vec<StreamEvent> {
        vec![
            StreamEvent::chunk("Hal"),
            StreamEvent::chunk("o dunia \u{1F30F}"),
            StreamEvent::chunk(" apa kabar"),
            StreamEvent::Done,
        ]
    }

    fn run(fragments: &[&[u8]]) -> Vec<StreamEvent> {
        let mut normalizer = NdjsonNormalizer::new();
        let mut events = Vec::new();
        for fragment in fragments {
            events.extend(normalizer.push(fragment));
        }
        events.extend(normalizer.finish());
        events
    }

    #[test]
    fn test_whole_body() {
        assert_eq!(run(&[BODY.as_bytes()]), expected());
    }

    #[test]
    fn test_every_single_split_point() {
        let bytes = BODY.as_bytes();
        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(run(&[a, b]), expected(), "split at {}", split);
        }
    }

    #[test]
    fn test_every_double_split_point() {
        let bytes = BODY.as_bytes();
        for first in (0..=bytes.len()).step_by(3) {
            for second in first..=bytes.len() {
                let fragments = [&bytes[..first], &bytes[first..second], &bytes[second..]];
                assert_eq!(run(&fragments), expected(), "splits {} {}", first, second);
            }
        }
    }

    #[test]
    fn test_byte_at_a_time() {
        let fragments: Vec<&[u8]> = BODY.as_bytes().chunks(1).collect();
        assert_eq!(run(&fragments), expected());
    }

    #[test]
    fn test_chat_line_yields_chunk() {
        let mut normalizer = NdjsonNormalizer::new();
        let events = normalizer.push(b"{\"message\":{\"content\":\"hi\"},\"done\":false}\n");
        assert_eq!(events, vec![StreamEvent::chunk("hi")]);
        assert!(!normalizer.is_finished());
    }

    #[test]
    fn test_done_line_without_content() {
        let mut normalizer = NdjsonNormalizer::new();
        let events = normalizer.push(b"{\"done\":true}\n");
        assert_eq!(events, vec![StreamEvent::Done]);
        assert!(normalizer.is_finished());
        assert!(normalizer.finish().is_empty());
    }

    #[test]
    fn test_done_line_with_content() {
        let mut normalizer = NdjsonNormalizer::new();
        let events = normalizer.push(b"{\"response\":\"bye\",\"done\":true}\n{\"response\":\"x\"}\n");
        assert_eq!(events, vec![StreamEvent::chunk("bye"), StreamEvent::Done]);
    }

    #[test]
    fn test_chat_content_wins_over_response() {
        let mut normalizer = NdjsonNormalizer::new();
        let events = normalizer.push(b"{\"message\":{\"content\":\"a\"},\"response\":\"b\"}\n");
        assert_eq!(events, vec![StreamEvent::chunk("a")]);
    }

    #[test]
    fn test_end_without_done() {
        let mut normalizer = NdjsonNormalizer::new();
        let mut events = normalizer.push(b"{\"response\":\"partial\"}\n{\"respo");
        events.extend(normalizer.finish());
        assert_eq!(
            events,
            vec![
                StreamEvent::chunk("partial"),
                StreamEvent::chunk(""),
                StreamEvent::Done
            ]
        );
    }

    #[test]
    fn test_upstream_error_line_is_terminal() {
        let mut normalizer = NdjsonNormalizer::new();
        let events = normalizer.push(b"{\"error\":\"model 'x' not found\"}\n{\"response\":\"y\"}\n");
        assert_eq!(events, vec![StreamEvent::error("model 'x' not found")]);
        assert!(normalizer.finish().is_empty());
    }

    #[test]
    fn test_fail_after_finish_is_ignored() {
        let mut normalizer = NdjsonNormalizer::new();
        normalizer.push(b"{\"done\":true}\n");
        assert!(normalizer.fail("late").is_empty());
        assert!(normalizer.push(b"{\"response\":\"late\"}\n").is_empty());
    }

    #[test]
    fn test_overlong_line_fails_stream() {
        let mut normalizer = NdjsonNormalizer::with_max_line_bytes(16);
        assert!(normalizer.push(b"{\"response\":").is_empty());

        let events = normalizer.push(b"\"aaaaaaaaaaaaaaaa");
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Error { message } => assert!(message.contains("16 bytes")),
            other => panic!("Expected error event, got {:?}", other),
        }
        assert!(normalizer.is_finished());
        assert!(normalizer.push(b"\"}\n").is_empty());
        assert!(normalizer.finish().is_empty());
    }

    #[test]
    fn test_line_limit_applies_to_partial_line_only() {
        let mut normalizer = NdjsonNormalizer::with_max_line_bytes(24);
        let events = normalizer.push(
            b"{\"response\":\"one\"}\n{\"response\":\"two\"}\n{\"response\":\"three\"}\n{\"resp",
        );
        assert_eq!(
            events,
            vec![
                StreamEvent::chunk("one"),
                StreamEvent::chunk("two"),
                StreamEvent::chunk("three")
            ]
        );
        assert!(!normalizer.is_finished());
    }

    #[test]
    fn test_partial_line_grows_across_fragments() {
        let mut normalizer = NdjsonNormalizer::new();
        let line = format!("{{\"response\":\"{}\"}}\n", "x".repeat(4096));
        let mut events = Vec::new();
        for piece in line.as_bytes().chunks(7) {
            events.extend(normalizer.push(piece));
        }
        assert_eq!(events, vec![StreamEvent::chunk("x".repeat(4096))]);
    }

    fn source(
        items: Vec<Result<&'static str, &'static str>>,
    ) -> impl Stream<Item = Result<Bytes, &'static str>> + Unpin {
        futures::stream::iter(
            items
                .into_iter()
                .map(|item| item.map(|s| Bytes::from_static(s.as_bytes()))),
        )
    }

    #[tokio::test]
    async fn test_stream_single_terminal() {
        let stream = NormalizedStream::new(source(vec![
            Ok("{\"response\":\"a\"}\n{\"resp"),
            Ok("onse\":\"b\"}\n"),
        ]));
        let events: Vec<_> = stream.collect().await;
        assert_eq!(
            events,
            vec![
                StreamEvent::chunk("a"),
                StreamEvent::chunk("b"),
                StreamEvent::chunk(""),
                StreamEvent::Done
            ]
        );
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_stream_transport_fault() {
        let mut stream = NormalizedStream::new(source(vec![
            Ok("{\"response\":\"a\"}\n"),
            Err("connection reset"),
            Ok("{\"response\":\"never read\"}\n"),
        ]));

        assert_eq!(stream.next().await, Some(StreamEvent::chunk("a")));
        match stream.next().await {
            Some(StreamEvent::Error { message }) => assert!(message.contains("connection reset")),
            other => panic!("Expected error event, got {:?}", other),
        }
        assert!(!stream.is_upstream_open());
        assert_eq!(stream.next().await, None);
        assert!(stream.is_terminated());
    }

    #[tokio::test]
    async fn test_stream_stops_reading_after_done() {
        let mut stream = NormalizedStream::new(source(vec![
            Ok("{\"response\":\"a\",\"done\":true}\n"),
            Ok("{\"response\":\"b\"}\n"),
        ]));

        assert_eq!(stream.next().await, Some(StreamEvent::chunk("a")));
        assert!(!stream.is_upstream_open());
        assert_eq!(stream.next().await, Some(StreamEvent::Done));
        assert_eq!(stream.next().await, None);
        assert_eq!(stream.next().await, None);
    }

    #[tokio::test]
    async fn test_drop_releases_upstream() {
        use std::time::Duration;
        use tokio::sync::mpsc;
        use tokio_stream::wrappers::ReceiverStream;

        let (tx, rx) = mpsc::channel::<Result<Bytes, String>>(4);
        let mut stream = NormalizedStream::new(ReceiverStream::new(rx));

        tx.send(Ok(Bytes::from_static(b"{\"response\":\"first\"}\n")))
            .await
            .unwrap();
        assert_eq!(stream.next().await, Some(StreamEvent::chunk("first")));

        drop(stream);

        tokio::time::timeout(Duration::from_millis(100), tx.closed())
            .await
            .expect("upstream should be released promptly after cancellation");
        assert!(tx
            .send(Ok(Bytes::from_static(b"{\"response\":\"late\"}\n")))
            .await
            .is_err());
    }
}
