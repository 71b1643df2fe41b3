//! Incremental decoder for the `text/event-stream` format.
//!
//! The subscriber endpoint writes one `data: <payload>\n\n` event per pushed
//! message and periodic `:` comment lines as keep-alives. [`SseDecoder`]
//! turns arbitrary byte chunks back into whole payloads.

use bytes::{Buf, BytesMut};

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: BytesMut,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every event payload completed by it.
    ///
    /// Multi-line `data` fields are joined with `\n`. Events without any
    /// `data` field (keep-alives, `event:`-only blocks) are skipped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(line) = self.next_line() {
            if line.is_empty() {
                if !self.data_lines.is_empty() {
                    events.push(self.data_lines.join("\n"));
                    self.data_lines.clear();
                }
                continue;
            }

            if line.first() == Some(&b':') {
                continue;
            }

            let line = String::from_utf8_lossy(&line);
            let (field, value) = match line.split_once(':') {
                Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
                None => (line.as_ref(), ""),
            };
            if field == "data" {
                self.data_lines.push(value.to_string());
            }
        }

        events
    }

    /// Split off the next complete line without its terminator.
    ///
    /// Lines end at `\r\n`, `\n` or a lone `\r`. A `\r` at the very end of
    /// the buffer is held back until the next byte shows whether a `\n`
    /// follows.
    fn next_line(&mut self) -> Option<BytesMut> {
        let end = self.buffer.iter().position(|b| *b == b'\n' || *b == b'\r')?;
        let terminator_len = match (self.buffer[end], self.buffer.get(end + 1).copied()) {
            (b'\n', _) => 1,
            (_, Some(b'\n')) => 2,
            (_, Some(_)) => 1,
            (_, None) => return None,
        };
        let mut line = self.buffer.split_to(end + terminator_len);
        line.truncate(end);
        Some(line)
    }

    /// Bytes received but not yet terminated by a newline.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.remaining()
    }
}
