// src/io/serial/framer.rs
//
// Delimiter-based framing for the marquee byte stream.
//
// Serial reads are arbitrary byte windows: one message may arrive split
// across several reads, and several messages may arrive in one read. The
// framer accumulates bytes and yields one payload per complete
// `___`-terminated frame, with the delimiter stripped.

use crate::io::marquee::codec::MESSAGE_TERMINATOR;

/// Default cap on a single frame before a forced split. Marquee messages
/// are short; anything this long is a peer that never sends the terminator.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 4096;

/// Incremental splitter over the message terminator.
pub struct DelimiterFramer {
    buffer: Vec<u8>,
    delimiter: &'static [u8],
    max_length: usize,
}

impl DelimiterFramer {
    pub fn new(max_length: usize) -> Self {
        DelimiterFramer {
            buffer: Vec::new(),
            delimiter: MESSAGE_TERMINATOR.as_bytes(),
            max_length,
        }
    }

    /// Feed a window of received bytes; returns the payload of every frame
    /// completed by this window, in arrival order. Empty frames (delimiter
    /// immediately following a delimiter) are discarded.
    pub fn feed(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();

        for &byte in data {
            self.buffer.push(byte);

            // Check for delimiter match at end of buffer
            if self.buffer.len() >= self.delimiter.len() {
                let start = self.buffer.len() - self.delimiter.len();
                if &self.buffer[start..] == self.delimiter {
                    let frame: Vec<u8> = self.buffer.drain(..start).collect();
                    self.buffer.clear(); // Clear delimiter
                    if !frame.is_empty() {
                        frames.push(frame);
                    }
                    continue;
                }
            }

            // Force split on max length
            if self.buffer.len() >= self.max_length {
                frames.push(self.buffer.drain(..).collect());
            }
        }

        frames
    }

    /// Return any unterminated residue. Called at end of stream; the
    /// residue may be an incomplete frame and decodes best-effort.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.drain(..).collect())
        }
    }

    /// Bytes currently buffered awaiting a terminator
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }
}

impl Default for DelimiterFramer {
    fn default() -> Self {
        DelimiterFramer::new(DEFAULT_MAX_FRAME_LENGTH)
    }
}
