//! Upstream SSE decoding: raw body chunks in, typed fragments out.
//!
//! Lines are buffered across chunk boundaries, so an event split by the
//! network is still decoded once and intact. The byte buffer is only turned
//! into text one complete line at a time, which keeps multi-byte characters
//! that straddle two chunks in one piece.

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use tracing::warn;

use crate::error::{DeepClaudeError, Result};
use crate::types::{Fragment, FragmentKind};

/// In-band marker a reasoning model uses to close its thinking block.
pub const THINK_END_MARKER: &str = "</think>";

/// Splits a byte stream into lines, carrying partial lines between pushes.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete line, without its
    /// terminator. `\n`, `\r\n` and a bare `\r` all end a line.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        let mut start = 0;
        let mut pos = 0;
        while pos < self.pending.len() {
            let next = match self.pending[pos] {
                b'\n' => pos + 1,
                b'\r' => match self.pending.get(pos + 1) {
                    Some(b'\n') => pos + 2,
                    Some(_) => pos + 1,
                    // a trailing `\r` may be half of a `\r\n`
                    None => break,
                },
                _ => {
                    pos += 1;
                    continue;
                }
            };
            lines.push(String::from_utf8_lossy(&self.pending[start..pos]).into_owned());
            start = next;
            pos = next;
        }
        self.pending.drain(..start);
        lines
    }

    /// Take whatever is left once the body has ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&line).trim_end_matches('\r').to_string())
    }
}

/// What a single upstream line amounts to.
#[derive(Debug, PartialEq, Eq)]
enum LineEvent {
    Skip,
    Done,
    Fragments(Vec<String>),
}

fn classify_line(line: &str) -> LineEvent {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return LineEvent::Skip;
    }
    let (data, prefixed) = match line.strip_prefix("data:") {
        Some(data) => (data.trim(), true),
        None => (line, false),
    };
    if data == "[DONE]" {
        return LineEvent::Done;
    }
    // other SSE fields (event:, id:, retry:) carry nothing we use
    if data.is_empty() || (!prefixed && !data.starts_with('{')) {
        return LineEvent::Skip;
    }

    match serde_json::from_str::<UpstreamChunk>(data) {
        Ok(chunk) => {
            if let Some(error) = chunk.error {
                warn!(%error, "upstream sent an error event");
            }
            let texts = chunk
                .choices
                .into_iter()
                .filter_map(|choice| choice.delta.and_then(|d| d.content))
                .filter(|text| !text.is_empty())
                .collect();
            LineEvent::Fragments(texts)
        }
        Err(e) => {
            warn!(error = %e, line = %data, "skipping malformed upstream event");
            LineEvent::Skip
        }
    }
}

/// Incremental decoder for one upstream call.
///
/// Once [`is_finished`](Self::is_finished) is true every further push
/// yields nothing.
#[derive(Debug)]
pub struct FragmentDecoder {
    kind: FragmentKind,
    lines: LineBuffer,
    finished: bool,
}

impl FragmentDecoder {
    pub fn new(kind: FragmentKind) -> Self {
        Self {
            kind,
            lines: LineBuffer::new(),
            finished: false,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decode every complete line in `chunk`.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Fragment> {
        if self.finished {
            return Vec::new();
        }
        let lines = self.lines.push(chunk);
        self.decode_lines(lines)
    }

    /// Flush a trailing line that had no newline.
    pub fn finish(&mut self) -> Vec<Fragment> {
        if self.finished {
            return Vec::new();
        }
        let tail = self.lines.finish();
        let fragments = self.decode_lines(tail);
        self.finished = true;
        fragments
    }

    fn decode_lines(&mut self, lines: impl IntoIterator<Item = String>) -> Vec<Fragment> {
        let mut out = Vec::new();
        for line in lines {
            match classify_line(&line) {
                LineEvent::Skip => {}
                LineEvent::Done => {
                    self.finished = true;
                    break;
                }
                LineEvent::Fragments(texts) => {
                    for text in texts {
                        let ends_thinking = self.kind == FragmentKind::Thinking
                            && text.contains(THINK_END_MARKER);
                        out.push(Fragment {
                            kind: self.kind,
                            text,
                        });
                        if ends_thinking {
                            self.finished = true;
                            break;
                        }
                    }
                    if self.finished {
                        break;
                    }
                }
            }
        }
        out
    }
}

/// Drive a response body through a [`FragmentDecoder`].
///
/// The body is owned by the returned stream; dropping the stream drops the
/// body. A transport error ends the stream with one `Err`.
pub fn fragment_stream<S, E>(body: S, kind: FragmentKind) -> BoxStream<'static, Result<Fragment>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + 'static,
    E: Into<DeepClaudeError> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut decoder = FragmentDecoder::new(kind);
        let mut failed = false;
        futures::pin_mut!(body);

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(chunk) => {
                    for fragment in decoder.push(&chunk) {
                        yield Ok(fragment);
                    }
                    if decoder.is_finished() {
                        break;
                    }
                }
                Err(e) => {
                    failed = true;
                    yield Err(e.into());
                    break;
                }
            }
        }

        if !failed {
            for fragment in decoder.finish() {
                yield Ok(fragment);
            }
        }
    };
    Box::pin(stream)
}

// Upstream stream chunk shape (internal)

#[derive(Deserialize)]
struct UpstreamChunk {
    #[serde(default)]
    choices: Vec<UpstreamChoice>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct UpstreamChoice {
    #[serde(default)]
    delta: Option<UpstreamDelta>,
}

#[derive(Deserialize)]
struct UpstreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn event(text: &str) -> String {
        let json = serde_json::json!({"choices": [{"delta": {"content": text}}]});
        format!("data: {json}\n\n")
    }

    fn texts(fragments: &[Fragment]) -> Vec<&str> {
        fragments.iter().map(|f| f.text.as_str()).collect()
    }

    #[test]
    fn line_buffer_carries_partial_lines() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"data: {\"a\"").is_empty());
        assert_eq!(buf.push(b":1}\r\ndata: x\n"), vec!["data: {\"a\":1}", "data: x"]);
        assert_eq!(buf.finish(), None);
        buf.push(b"tail");
        assert_eq!(buf.finish().as_deref(), Some("tail"));
    }

    #[test]
    fn line_buffer_keeps_split_utf8_intact() {
        let bytes = "data: 你好\n".as_bytes();
        let mut buf = LineBuffer::new();
        assert!(buf.push(&bytes[..8]).is_empty());
        assert_eq!(buf.push(&bytes[8..]), vec!["data: 你好"]);
    }

    #[test]
    fn content_model_yields_content_fragments() {
        let mut decoder = FragmentDecoder::new(FragmentKind::Content);
        let raw = format!("{}{}", event("Hel"), event("lo"));
        let out = decoder.push(raw.as_bytes());
        assert_eq!(out, vec![Fragment::content("Hel"), Fragment::content("lo")]);
        assert!(!decoder.is_finished());
    }

    #[test]
    fn empty_and_missing_content_is_skipped() {
        let mut decoder = FragmentDecoder::new(FragmentKind::Content);
        let raw = concat!(
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":null}}]}\n\n",
            "data: {\"choices\":[]}\n\n",
            ": keep-alive\n\n",
        );
        assert!(decoder.push(raw.as_bytes()).is_empty());
    }

    #[test]
    fn done_stops_even_with_trailing_bytes_in_same_chunk() {
        let mut decoder = FragmentDecoder::new(FragmentKind::Content);
        let raw = format!("{}data: [DONE]\n\n{}", event("a"), event("b"));
        assert_eq!(texts(&decoder.push(raw.as_bytes())), vec!["a"]);
        assert!(decoder.is_finished());
        assert!(decoder.push(event("c").as_bytes()).is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn malformed_json_does_not_stop_later_lines() {
        let mut decoder = FragmentDecoder::new(FragmentKind::Content);
        let raw = format!("{}data: {{not json\n\n{}", event("a"), event("b"));
        assert_eq!(texts(&decoder.push(raw.as_bytes())), vec!["a", "b"]);
    }

    #[test]
    fn think_end_marker_ends_reasoning_stream() {
        let mut decoder = FragmentDecoder::new(FragmentKind::Thinking);
        let raw = format!("{}{}{}", event("Let"), event(" think</think>"), event("after"));
        let out = decoder.push(raw.as_bytes());
        assert_eq!(
            out,
            vec![Fragment::thinking("Let"), Fragment::thinking(" think</think>")]
        );
        assert!(decoder.is_finished());
    }

    #[test]
    fn think_end_marker_is_plain_text_for_answer_model() {
        let mut decoder = FragmentDecoder::new(FragmentKind::Content);
        let raw = format!("{}{}", event("a</think>"), event("b"));
        assert_eq!(texts(&decoder.push(raw.as_bytes())), vec!["a</think>", "b"]);
        assert!(!decoder.is_finished());
    }

    #[test]
    fn event_split_across_chunks_is_decoded_once() {
        let raw = event("split");
        let (head, tail) = raw.split_at(17);
        let mut decoder = FragmentDecoder::new(FragmentKind::Content);
        assert!(decoder.push(head.as_bytes()).is_empty());
        assert_eq!(texts(&decoder.push(tail.as_bytes())), vec!["split"]);
    }

    #[test]
    fn unterminated_last_line_is_flushed_on_finish() {
        let mut decoder = FragmentDecoder::new(FragmentKind::Content);
        let raw = event("last");
        assert!(decoder.push(raw.trim_end().as_bytes()).is_empty());
        assert_eq!(texts(&decoder.finish()), vec!["last"]);
    }

    #[test]
    fn bare_json_lines_without_data_prefix_are_accepted() {
        let mut decoder = FragmentDecoder::new(FragmentKind::Content);
        let out = decoder.push(b"{\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n");
        assert_eq!(texts(&out), vec!["x"]);
    }

    #[test]
    fn line_buffer_accepts_every_line_ending() {
        let mut buf = LineBuffer::new();
        assert_eq!(buf.push(b"a\nb\r\nc\rd"), vec!["a", "b", "c"]);
        assert_eq!(buf.finish().as_deref(), Some("d"));
    }

    #[test]
    fn line_buffer_holds_trailing_cr_until_next_chunk() {
        let mut buf = LineBuffer::new();
        assert!(buf.push(b"data: x\r").is_empty());
        assert_eq!(buf.push(b"\ndata: y\n"), vec!["data: x", "data: y"]);
        assert_eq!(buf.finish(), None);
    }

    #[test]
    fn cr_only_framing_is_decoded() {
        let mut decoder = FragmentDecoder::new(FragmentKind::Content);
        let raw = format!("{}{}", event("a"), event("b")).replace('\n', "\r");
        let mut out = decoder.push(raw.as_bytes());
        out.extend(decoder.finish());
        assert_eq!(texts(&out), vec!["a", "b"]);
    }

    #[test]
    fn bare_done_line_ends_the_stream() {
        let mut decoder = FragmentDecoder::new(FragmentKind::Content);
        let raw = format!("{}[DONE]\n{}", event("a"), event("b"));
        assert_eq!(texts(&decoder.push(raw.as_bytes())), vec!["a"]);
        assert!(decoder.is_finished());
    }

    #[test]
    fn many_lines_in_one_chunk_are_all_drained() {
        let mut decoder = FragmentDecoder::new(FragmentKind::Content);
        let raw: String = (0..500).map(|i| event(&i.to_string())).collect();
        let out = decoder.push(raw.as_bytes());
        assert_eq!(out.len(), 500);
        assert_eq!(out[499].text, "499");
    }

    #[test]
    fn other_sse_fields_are_ignored() {
        let mut decoder = FragmentDecoder::new(FragmentKind::Content);
        let raw = format!("event: message\nid: 7\nretry: 100\n{}", event("x"));
        assert_eq!(texts(&decoder.push(raw.as_bytes())), vec!["x"]);
    }

    #[tokio::test]
    async fn fragment_stream_decodes_chunked_body() {
        let raw = format!("{}{}data: [DONE]\n\n{}", event("a"), event("b"), event("c"));
        let bytes = raw.into_bytes();
        let chunks: Vec<std::result::Result<Bytes, DeepClaudeError>> = bytes
            .chunks(7)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let fragments: Vec<Fragment> = fragment_stream(futures::stream::iter(chunks), FragmentKind::Content)
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(texts(&fragments), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn fragment_stream_surfaces_transport_error() {
        let chunks: Vec<std::result::Result<Bytes, DeepClaudeError>> = vec![
            Ok(Bytes::from(event("a"))),
            Err(DeepClaudeError::Stream("connection reset".into())),
            Ok(Bytes::from(event("b"))),
        ];
        let items: Vec<Result<Fragment>> =
            fragment_stream(futures::stream::iter(chunks), FragmentKind::Content)
                .collect()
                .await;
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap().text, "a");
        assert!(matches!(items[1], Err(DeepClaudeError::Stream(_))));
    }
}
