//! Incremental line decoder for `text/event-stream` style bodies.
//!
//! Network reads split the body at arbitrary byte offsets, including inside
//! a multi-byte UTF-8 sequence. The decoder only converts bytes to text once a
//! full line (terminated by `\n`) is buffered; `\n` never occurs inside a
//! multi-byte sequence, so completed lines are always whole characters.

use tracing::warn;

const DATA_PREFIX: &str = "data:";

/// Longest line the decoder buffers. Anything longer is dropped up to its
/// terminator.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Buffers partial lines across chunks and extracts `data:` payloads.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
    /// Prefix of `buf` already known to contain no `\n`.
    scanned: usize,
    /// Inside an oversized line; skip through its terminator.
    discarding: bool,
}

impl SseDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the payloads of every line it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        let mut start = 0;
        let mut from = self.scanned;
        while let Some(offset) = self.buf[from..].iter().position(|&b| b == b'\n') {
            let end = from + offset;
            if !self.discarding {
                if let Some(payload) = data_payload(&self.buf[start..end]) {
                    payloads.push(payload);
                }
            }
            self.discarding = false;
            start = end + 1;
            from = start;
        }
        self.buf.drain(..start);
        self.scanned = self.buf.len();

        if self.buf.len() > MAX_LINE_BYTES {
            warn!(bytes = self.buf.len(), limit = MAX_LINE_BYTES, "dropping oversized stream line");
            self.buf.clear();
            self.scanned = 0;
            self.discarding = true;
        }
        payloads
    }

    /// Flush a trailing line the server did not terminate with `\n`.
    pub fn finish(&mut self) -> Option<String> {
        self.scanned = 0;
        if std::mem::take(&mut self.discarding) || self.buf.is_empty() {
            self.buf.clear();
            return None;
        }
        let line = std::mem::take(&mut self.buf);
        data_payload(&line)
    }

/// Bytes held back waiting for a line terminator.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

/// Extract the payload of a `data:` line. Other SSE fields (`event:`, `id:`,
/// comments) and blank separator lines yield `None`.
fn data_payload(line: &[u8]) -> Option<String> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let text = String::from_utf8_lossy(line);
    let rest = text.strip_prefix(DATA_PREFIX)?;
    let payload = rest.strip_prefix(' ').unwrap_or(rest).trim_end();
    if payload.is_empty() {
        return None;
    }
    Some(payload.to_string())
}

#[cfg(test)]
#[path = "decoder_test.rs"]
mod tests;
