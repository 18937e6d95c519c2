//! Incremental Server-Sent Events decoder
//!
//! Used on both sides of the gateway: to read the upstream completion API
//! and, in the client, to read the generation stream. Input may be split at
//! arbitrary byte offsets, including inside a multi-byte character.

use tracing::debug;

/// Incremental parser turning raw bytes into `data:` payloads
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Feed bytes and drain the payloads of every complete event
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer
            .extend(bytes.iter().copied().filter(|byte| *byte != b'\r'));

        let mut payloads = Vec::new();
        while let Some(split) = find_event_boundary(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..split + 2).collect();
            if let Some(payload) = data_payload(&frame[..split]) {
                payloads.push(payload);
            }
        }
        payloads
    }

    /// Flush a trailing event that was not terminated by a blank line
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let frame = std::mem::take(&mut self.buffer);
        data_payload(&frame)
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

fn find_event_boundary(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|window| window == b"\n\n")
}

fn data_payload(frame: &[u8]) -> Option<String> {
    let frame = String::from_utf8_lossy(frame);
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if data_lines.is_empty() {
        if !frame.trim().is_empty() {
            debug!("Skipping SSE frame without data: {}", frame.trim());
        }
        return None;
    }

    let payload = data_lines.join("\n");
    if payload.is_empty() { None } else { Some(payload) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_split_across_feeds() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.feed(b"data: {\"a\"").is_empty());
        assert!(decoder.feed(b":1}\n").is_empty());
        assert_eq!(decoder.feed(b"\ndata: [DONE]\n\n"), vec!["{\"a\":1}", "[DONE]"]);
        assert!(decoder.is_empty_buffer());
    }

    #[test]
    fn test_crlf_and_comments() {
        let mut decoder = SseDecoder::default();
        let payloads = decoder.feed(b": keep-alive\r\n\r\nevent: message\r\ndata: hello\r\n\r\n");
        assert_eq!(payloads, vec!["hello"]);
    }

    #[test]
    fn test_multi_line_data_is_joined() {
        let mut decoder = SseDecoder::default();
        let payloads = decoder.feed(b"data: first\ndata: second\n\n");
        assert_eq!(payloads, vec!["first\nsecond"]);
    }

    #[test]
    fn test_multibyte_character_split_between_feeds() {
        let bytes = "data: caf\u{e9}\n\n".as_bytes();
        let (head, tail) = bytes.split_at(10);
        let mut decoder = SseDecoder::default();
        assert!(decoder.feed(head).is_empty());
        assert_eq!(decoder.feed(tail), vec!["caf\u{e9}"]);
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.feed(b"data: tail").is_empty());
        assert_eq!(decoder.finish(), Some("tail".to_string()));
        assert_eq!(decoder.finish(), None);
    }
}
