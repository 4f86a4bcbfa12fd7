//! Incremental consumer for newline-delimited JSON chat streams.
//!
//! Bytes arrive in chunks with arbitrary boundaries. They are decoded with a
//! stream-aware UTF-8 decoder, accumulated in a [`LineBuffer`], and every
//! complete line is parsed into a [`ChatMessage`]. Lines that do not parse are
//! skipped; a trailing line with no newline when the stream ends is discarded.

use futures::Stream;
use serde_json::Value;
use std::collections::VecDeque;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tracing::{debug, warn};

use crate::error::ConsumerError;
use crate::ChatMessage;

/// UTF-8 decoder that carries an incomplete trailing sequence over to the next chunk.
///
/// Invalid bytes decode to U+FFFD instead of failing the stream.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);

        let mut out = String::with_capacity(self.pending.len());
        let mut rest: &[u8] = &self.pending;
        loop {
            match std::str::from_utf8(rest) {
                Ok(text) => {
                    out.push_str(text);
                    rest = &[];
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[len..];
                        }
                        // Incomplete sequence at the end: wait for more bytes.
                        None => {
                            rest = after;
                            break;
                        }
                    }
                }
            }
        }

        let tail = rest.to_vec();
        self.pending = tail;
        out
    }

    /// Bytes of an unfinished multi-byte character held back from the last chunk.
    pub fn pending(&self) -> &[u8] {
        &self.pending
    }
}

/// Text accumulated between reads. Holds at most one incomplete line.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `text` and returns every line completed by it, without the newline.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buffer.push_str(text);

        let Some(end) = self.buffer.rfind('\n') else {
            return Vec::new();
        };
        let rest = self.buffer.split_off(end + 1);
        let mut complete = std::mem::replace(&mut self.buffer, rest);
        complete.truncate(end);
        complete.split('\n').map(str::to_owned).collect()
    }

    /// The incomplete line still waiting for its newline.
    pub fn remainder(&self) -> &str {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

/// Parses one line; `None` for blank lines, malformed JSON, anything that is not
/// an object, or missing/empty fields.
pub fn parse_line(line: &str) -> Option<ChatMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value = match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value,
        Err(e) => {
            warn!(line = trimmed, error = %e, "Skipping malformed NDJSON line");
            return None;
        }
    };

    let field = |name: &str| {
        value
            .as_object()
            .and_then(|object| object.get(name))
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    };
    match (field("personaId"), field("message")) {
        (Some(persona_id), Some(message)) => Some(ChatMessage::new(persona_id, message)),
        _ => {
            debug!(line = trimmed, "Skipping line without personaId/message");
            None
        }
    }
}

/// Decoder plus line buffer: bytes in, parsed messages out.
#[derive(Debug, Default)]
pub struct NdjsonReader {
    decoder: Utf8Decoder,
    lines: LineBuffer,
}

impl NdjsonReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ChatMessage> {
        let text = self.decoder.decode(chunk);
        self.lines
            .push(&text)
            .iter()
            .filter_map(|line| parse_line(line))
            .collect()
    }

    /// Drops whatever is left once the stream has ended. Returns the discarded text.
    pub fn finish(&mut self) -> String {
        let leftover = self.lines.remainder().to_string();
        self.lines.clear();
        self.decoder = Utf8Decoder::new();
        if !leftover.trim().is_empty() {
            debug!(leftover = %leftover, "Discarding unterminated trailing line");
        }
        leftover
    }
}

/// Parses a fully buffered body, one chunk at a time.
pub fn decode_all<I, B>(chunks: I) -> Vec<ChatMessage>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut reader = NdjsonReader::new();
    let mut messages = Vec::new();
    for chunk in chunks {
        messages.extend(reader.feed(chunk.as_ref()));
    }
    reader.finish();
    messages
}

/// Lazy, ordered stream of messages read from a chunked byte stream.
///
/// Ends when the byte stream ends. A transport error is yielded once and
/// terminates the stream.
pub struct MessageStream<S> {
    inner: Pin<Box<S>>,
    reader: NdjsonReader,
    ready: VecDeque<ChatMessage>,
    finished: bool,
}

impl<S> MessageStream<S> {
    pub fn new(bytes: S) -> Self {
        Self {
            inner: Box::pin(bytes),
            reader: NdjsonReader::new(),
            ready: VecDeque::new(),
            finished: false,
        }
    }
}

impl<S, B, E> Stream for MessageStream<S>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<ConsumerError>,
{
    type Item = Result<ChatMessage, ConsumerError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if let Some(message) = this.ready.pop_front() {
                return Poll::Ready(Some(Ok(message)));
            }
            if this.finished {
                return Poll::Ready(None);
            }

            match ready!(this.inner.as_mut().poll_next(cx)) {
                Some(Ok(chunk)) => {
                    let parsed = this.reader.feed(chunk.as_ref());
                    this.ready.extend(parsed);
                }
                Some(Err(e)) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e.into())));
                }
                None => {
                    this.finished = true;
                    this.reader.finish();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt};

    const SAMPLE: &str = concat!(
        "{\"personaId\":\"skeleton\",\"message\":\"よう、骨休めしようぜ！\"}\n",
        "\n",
        "{\"personaId\":\"pumpkin\",\"message\":\"わぁ！お化け屋敷だよ！🎃\"}\n",
        "   \n",
        "{\"personaId\":\"witch\",\"message\":\"あら、騒がしいですわね。\"}\n",
    );

    fn ids(messages: &[ChatMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.persona_id.as_str()).collect()
    }

    #[test]
    fn test_single_chunk() {
        let messages = decode_all([SAMPLE]);
        assert_eq!(ids(&messages), vec!["skeleton", "pumpkin", "witch"]);
        assert_eq!(messages[1].message, "わぁ！お化け屋敷だよ！🎃");
    }

    #[test]
    fn test_chunk_boundary_independence_every_split_point() {
        let bytes = SAMPLE.as_bytes();
        let whole = decode_all([bytes]);
        for split in 0..=bytes.len() {
            let (a, b) = bytes.split_at(split);
            assert_eq!(decode_all([a, b]), whole, "split at byte {}", split);
        }
    }

    #[test]
    fn test_chunk_boundary_independence_byte_at_a_time() {
        let bytes = SAMPLE.as_bytes();
        let chunks: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(decode_all(chunks), decode_all([bytes]));

        let chunks: Vec<&[u8]> = bytes.chunks(7).collect();
        assert_eq!(decode_all(chunks), decode_all([bytes]));
    }

    #[test]
    fn test_malformed_line_between_valid_lines() {
        let input = "{\"personaId\":\"a\",\"message\":\"hi\"}\n{bad\n{\"personaId\":\"b\",\"message\":\"yo\"}\n";
        let messages = decode_all([input]);
        assert_eq!(
            messages,
            vec![ChatMessage::new("a", "hi"), ChatMessage::new("b", "yo")]
        );
    }

    #[test]
    fn test_whitespace_only_lines_are_skipped() {
        let messages = decode_all(["  \n\t\n\r\n{\"personaId\":\"a\",\"message\":\"hi\"}\r\n \n"]);
        assert_eq!(messages, vec![ChatMessage::new("a", "hi")]);
    }

    #[test]
    fn test_trailing_incomplete_line_is_never_emitted() {
        // The tail would parse on its own but has no newline.
        let input = "{\"personaId\":\"a\",\"message\":\"hi\"}\n{\"personaId\":\"b\",\"message\":\"yo\"}";
        let messages = decode_all([input]);
        assert_eq!(messages, vec![ChatMessage::new("a", "hi")]);
    }

    #[test]
    fn test_missing_or_empty_fields_are_dropped() {
        let input = concat!(
            "{\"personaId\":\"\",\"message\":\"hi\"}\n",
            "{\"personaId\":\"a\",\"message\":\"\"}\n",
            "{\"personaId\":\"a\"}\n",
            "{\"message\":\"hi\"}\n",
            "{\"personaId\":7,\"message\":\"hi\"}\n",
            "null\n",
            "[1,2]\n",
            "{\"personaId\":\"ok\",\"message\":\"kept\",\"extra\":true}\n",
        );
        assert_eq!(decode_all([input]), vec![ChatMessage::new("ok", "kept")]);
    }

    #[test]
    fn test_positional_array_is_not_a_message() {
        let input = "[\"skeleton\",\"hi\"]\n{\"personaId\":\"b\",\"message\":\"yo\"}\n";
        assert_eq!(decode_all([input]), vec![ChatMessage::new("b", "yo")]);
        assert_eq!(parse_line("[\"skeleton\",\"hi\"]"), None);
    }

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let line = "{\"personaId\":\"witch\",\"message\":\"魔女\"}\n".as_bytes();
        let start = line.iter().position(|&b| b >= 0x80).unwrap();
        // Split inside the first three-byte character.
        let (a, b) = line.split_at(start + 1);

        let mut decoder = Utf8Decoder::new();
        let first = decoder.decode(a);
        assert!(!first.contains(char::REPLACEMENT_CHARACTER));
        assert_eq!(decoder.pending().len(), 1);
        let second = decoder.decode(b);
        assert_eq!(format!("{}{}", first, second).as_bytes(), line);
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn test_invalid_utf8_becomes_replacement_character() {
        let mut decoder = Utf8Decoder::new();
        let text = decoder.decode(b"ab\xffcd");
        assert_eq!(text, "ab\u{FFFD}cd");
        assert!(decoder.pending().is_empty());
    }

    #[test]
    fn test_line_buffer_keeps_only_the_incomplete_tail() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push("abc").is_empty());
        assert_eq!(buffer.remainder(), "abc");
        assert_eq!(buffer.push("def\nghi\n\njk"), vec!["abcdef", "ghi", ""]);
        assert_eq!(buffer.remainder(), "jk");
        assert_eq!(buffer.push("\n"), vec!["jk"]);
        assert_eq!(buffer.remainder(), "");
    }

    #[tokio::test]
    async fn test_message_stream_yields_in_arrival_order() {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"{\"personaId\":\"a\",\"mess".to_vec()),
            Ok(b"age\":\"hi\"}\n{\"personaId\":\"b\",\"message\":\"yo\"}\n{\"perso".to_vec()),
            Ok(b"naId\":\"c\",\"message\":\"hey\"}\n".to_vec()),
        ];
        let messages: Vec<ChatMessage> = MessageStream::new(stream::iter(chunks))
            .map(|item| item.unwrap())
            .collect()
            .await;
        assert_eq!(ids(&messages), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_message_stream_reports_transport_error_once() {
        let chunks: Vec<Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"{\"personaId\":\"a\",\"message\":\"hi\"}\n".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
            Ok(b"{\"personaId\":\"b\",\"message\":\"never\"}\n".to_vec()),
        ];
        let items: Vec<Result<ChatMessage, ConsumerError>> =
            MessageStream::new(stream::iter(chunks)).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), &ChatMessage::new("a", "hi"));
        assert!(matches!(items[1], Err(ConsumerError::Transport(_))));
    }
}
