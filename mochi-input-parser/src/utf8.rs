//! Incremental UTF-8 decoding
//!
//! Bytes arrive one at a time and codepoints may straddle read boundaries.
//! Assembly is structural: any `110xxxxx`, `1110xxxx` or `11110xxx` byte
//! opens a sequence and any `10xxxxxx` byte continues it. The value is
//! checked only once the sequence is complete, so an overlong form, a
//! surrogate or a value beyond U+10FFFF is one invalid unit of its full
//! length. A byte that breaks the structure ends the run and is retried.

use crate::classify::{classify, ByteClass};

/// Unicode replacement character, substituted for invalid input
pub const REPLACEMENT_CHAR: char = '\u{FFFD}';

/// Decoder state for the codepoint currently being assembled
#[derive(Debug, Clone, Default)]
pub struct Utf8Decoder {
    /// High bits accumulated so far
    pending_codepoint: u32,
    /// Continuation bytes announced by the lead byte (0 when idle)
    bytes_expected: u8,
    /// Continuation bytes received so far
    bytes_received: u8,
    /// Raw bytes of the current sequence, lead byte first
    raw_bytes: [u8; 4],
}

/// Result of feeding a byte to the decoder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Utf8Result {
    /// Need more bytes
    NeedMore,
    /// Successfully decoded a codepoint spanning `len` bytes
    Complete { ch: char, len: u8 },
    /// An invalid run of `len` bytes ended.
    ///
    /// When `retry` is set the byte just fed is not part of the run and must
    /// be processed again from a clean state.
    Invalid { len: u8, retry: bool },
}

impl Utf8Decoder {
    /// Create a new decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the decoder state
    pub fn reset(&mut self) {
        self.pending_codepoint = 0;
        self.bytes_expected = 0;
        self.bytes_received = 0;
    }

    /// Check if decoder is in the middle of a sequence
    pub fn is_pending(&self) -> bool {
        self.bytes_expected > 0
    }

    /// Raw bytes of the incomplete sequence
    pub fn pending_bytes(&self) -> &[u8] {
        if self.is_pending() {
            &self.raw_bytes[..=self.bytes_received as usize]
        } else {
            &[]
        }
    }

    /// Feed a byte to the decoder
    pub fn feed(&mut self, byte: u8) -> Utf8Result {
        if !self.is_pending() {
            return self.start(byte);
        }

        if classify(byte) != ByteClass::Continuation {
            let len = self.bytes_received + 1;
            self.reset();
            return Utf8Result::Invalid { len, retry: true };
        }

        self.bytes_received += 1;
        self.raw_bytes[self.bytes_received as usize] = byte;
        self.pending_codepoint = (self.pending_codepoint << 6) | u32::from(byte & 0x3F);

        if self.bytes_received < self.bytes_expected {
            return Utf8Result::NeedMore;
        }

        let len = self.bytes_expected + 1;
        let codepoint = self.pending_codepoint;
        self.reset();

        if codepoint < min_codepoint(len) {
            return Utf8Result::Invalid { len, retry: false };
        }
        // from_u32 rejects surrogates and values beyond U+10FFFF
        match char::from_u32(codepoint) {
            Some(ch) => Utf8Result::Complete { ch, len },
            None => Utf8Result::Invalid { len, retry: false },
        }
    }

    /// End of input: report an incomplete sequence as one invalid run
    pub fn finish(&mut self) -> Option<Utf8Result> {
        if !self.is_pending() {
            return None;
        }
        let len = self.bytes_received + 1;
        self.reset();
        Some(Utf8Result::Invalid { len, retry: false })
    }

    fn start(&mut self, byte: u8) -> Utf8Result {
        match classify(byte) {
            ByteClass::Control | ByteClass::Printable | ByteClass::Delete => Utf8Result::Complete {
                ch: char::from(byte),
                len: 1,
            },
            ByteClass::Lead(continuations) => {
                let mask = match continuations {
                    1 => 0x1F,
                    2 => 0x0F,
                    _ => 0x07,
                };
                self.raw_bytes[0] = byte;
                self.pending_codepoint = u32::from(byte & mask);
                self.bytes_expected = continuations;
                self.bytes_received = 0;
                Utf8Result::NeedMore
            }
            ByteClass::Continuation | ByteClass::Invalid => {
                Utf8Result::Invalid { len: 1, retry: false }
            }
        }
    }
}

/// Smallest codepoint that legitimately needs `len` bytes
fn min_codepoint(len: u8) -> u32 {
    match len {
        2 => 0x80,
        3 => 0x800,
        4 => 0x1_0000,
        _ => 0,
    }
}
