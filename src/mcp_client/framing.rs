//! Newline framing for the stdio protocol.
//!
//! Child stdout arrives in arbitrary chunks. `LineFramer` accumulates raw
//! bytes and yields one message per complete line, keeping any trailing
//! partial line for the next chunk. Splitting happens on bytes, so a
//! multi-byte UTF-8 sequence cut across two chunks is reassembled before
//! decoding.

/// Accumulation buffer that splits a byte stream into lines.
#[derive(Debug, Default)]
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Feed one chunk and return every line it completed.
    ///
    /// Blank lines are skipped. A trailing `\r` is stripped.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            if let Some(line) = decode_line(&self.buffer[start..end]) {
                lines.push(line);
            }
            start = end + 1;
        }
        self.buffer.drain(..start);
        lines
    }

    /// Bytes of the incomplete trailing line.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Take whatever partial line remains (used at EOF for diagnostics).
    pub fn take_remainder(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest)
    }
}

fn decode_line(raw: &[u8]) -> Option<String> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let text = String::from_utf8_lossy(raw);
    if text.trim().is_empty() {
        None
    } else {
        Some(text.into_owned())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
