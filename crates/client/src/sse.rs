//! Incremental decoder for the SSE-style progress stream.
//!
//! Wire format: UTF-8 text, frames separated by a blank line (`\n\n`),
//! payload carried on `data:` lines. Chunks arrive at arbitrary byte
//! boundaries, so both the UTF-8 decoding and the frame splitting keep
//! carry-over state between reads.

/// Streaming UTF-8 decoder. A multi-byte character split across two
/// chunks is held back until its remaining bytes arrive; genuinely
/// invalid sequences decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Accumulator {
    pending: Vec<u8>,
}

impl Utf8Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `bytes`, prepended with any held-back tail from the
    /// previous call.
    pub fn push(&mut self, bytes: &[u8]) -> String {
        let mut buf = std::mem::take(&mut self.pending);
        buf.extend_from_slice(bytes);

        let mut out = String::with_capacity(buf.len());
        let mut rest = buf.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let valid_len = err.valid_up_to();
                    if let Ok(valid) = std::str::from_utf8(&rest[..valid_len]) {
                        out.push_str(valid);
                    }
                    match err.error_len() {
                        // Invalid sequence: substitute and resume after it.
                        Some(skip) => {
                            out.push('\u{FFFD}');
                            rest = &rest[valid_len + skip..];
                        }
                        // Incomplete sequence at the end of the chunk:
                        // hold it for the next call.
                        None => {
                            self.pending = rest[valid_len..].to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }
}

/// Split off every complete `\n\n`-delimited frame, in order, leaving
/// the trailing partial frame (possibly empty) in `buffer`.
pub fn drain_frames(buffer: &mut String) -> Vec<String> {
    let mut frames = Vec::new();
    while let Some(boundary) = buffer.find("\n\n") {
        let frame = buffer[..boundary].to_string();
        *buffer = buffer[boundary + 2..].to_string();
        frames.push(frame);
    }
    frames
}

/// Reconstruct the payload of one frame: every `data:` line, prefix and
/// at most one following space stripped, joined with `\n`. Lines with
/// other prefixes (`event:`, `id:`, comments) are ignored. `None` when
/// the frame carries no payload.
pub fn frame_payload(frame: &str) -> Option<String> {
    let mut data_lines: Vec<&str> = Vec::new();
    for line in frame.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(value) = line.strip_prefix("data:") {
            data_lines.push(value.strip_prefix(' ').unwrap_or(value));
        }
    }
    if data_lines.is_empty() {
        return None;
    }
    let payload = data_lines.join("\n");
    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

/// Incremental frame parser: feed raw response chunks, get back the
/// payloads of every frame completed so far.
#[derive(Debug, Default)]
pub struct SseParser {
    utf8: Utf8Accumulator,
    buffer: String,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk from the response body. Returns the payloads of
    /// the frames this chunk completed, in order. Frames without a
    /// `data:` line (comments, keep-alives) yield nothing.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.push_str(&self.utf8.push(chunk));
        drain_frames(&mut self.buffer)
            .iter()
            .filter_map(|frame| frame_payload(frame))
            .collect()
    }

    /// Drain the trailing unterminated frame at end of stream, if it
    /// carries a payload. The source may close without a final
    /// delimiter; that frame still counts, exactly once.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        frame_payload(&rest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_frames() {
        let mut parser = SseParser::new();
        let payloads = parser.feed(b"data: hello\n\ndata: world\n\n");
        assert_eq!(payloads, vec!["hello", "world"]);
    }

    #[test]
    fn test_frame_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: hel").is_empty());
        assert_eq!(parser.feed(b"lo\n\n"), vec!["hello"]);
    }

    #[test]
    fn test_delimiter_split_across_chunks() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: a\n").is_empty());
        assert_eq!(parser.feed(b"\ndata: b\n\n"), vec!["a", "b"]);
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        // "é" is 0xC3 0xA9; cutting between the two bytes must not
        // produce a replacement character.
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: caf\xc3").is_empty());
        assert_eq!(parser.feed(b"\xa9\n\n"), vec!["café"]);
    }

    #[test]
    fn test_invalid_byte_decodes_to_replacement_char() {
        let mut parser = SseParser::new();
        let payloads = parser.feed(b"data: a\xffb\n\n");
        assert_eq!(payloads, vec!["a\u{FFFD}b"]);
    }

    #[test]
    fn test_multi_line_payload_joined_with_newline() {
        let mut parser = SseParser::new();
        let payloads = parser.feed(b"data: hello\ndata: world\n\n");
        assert_eq!(payloads, vec!["hello\nworld"]);
    }

    #[test]
    fn test_non_data_lines_ignored() {
        let mut parser = SseParser::new();
        let payloads = parser.feed(b"event: progress\nid: 7\n: keep-alive\ndata: ok\n\n");
        assert_eq!(payloads, vec!["ok"]);
    }

    #[test]
    fn test_comment_only_frame_yields_nothing() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b": ping\n\n").is_empty());
    }

    #[test]
    fn test_carriage_return_line_endings() {
        let mut parser = SseParser::new();
        let payloads = parser.feed(b"data: a\r\ndata: b\n\n");
        assert_eq!(payloads, vec!["a\nb"]);
    }

    #[test]
    fn test_prefix_space_stripping() {
        let mut parser = SseParser::new();
        assert_eq!(parser.feed(b"data:tight\n\n"), vec!["tight"]);
        // Only one space after the prefix is stripped.
        assert_eq!(parser.feed(b"data:  padded\n\n"), vec![" padded"]);
    }

    #[test]
    fn test_empty_payload_produces_nothing() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data:\n\n").is_empty());
        // A bare "data" line without the colon is not a payload line.
        assert!(parser.feed(b"data\n\n").is_empty());
    }

    #[test]
    fn test_two_empty_data_lines_produce_newline_payload() {
        let mut parser = SseParser::new();
        assert_eq!(parser.feed(b"data:\ndata:\n\n"), vec!["\n"]);
    }

    #[test]
    fn test_no_delimiter_keeps_buffer() {
        let mut buffer = "data: partial".to_string();
        assert!(drain_frames(&mut buffer).is_empty());
        assert_eq!(buffer, "data: partial");
    }

    #[test]
    fn test_finish_flushes_unterminated_frame_once() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"data: {\"stage\":\"x\"}").is_empty());
        assert_eq!(parser.finish().as_deref(), Some("{\"stage\":\"x\"}"));
        assert_eq!(parser.finish(), None);
    }

    #[test]
    fn test_finish_without_remainder() {
        let mut parser = SseParser::new();
        parser.feed(b"data: done\n\n");
        assert_eq!(parser.finish(), None);
    }

    #[test]
    fn test_finish_ignores_remainder_without_data_lines() {
        let mut parser = SseParser::new();
        assert!(parser.feed(b"{\"stage\":\"x\"}").is_empty());
        assert_eq!(parser.finish(), None);
    }
}
