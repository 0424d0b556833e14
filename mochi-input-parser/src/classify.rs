//! Byte classification
//!
//! Stateless lookup used by the decoder and the state machine to decide
//! which path a raw input byte takes.

/// Escape
pub const ESC: u8 = 0x1B;
/// Bell, terminates OSC strings
pub const BEL: u8 = 0x07;
/// Delete, sent by most terminals for Backspace
pub const DEL: u8 = 0x7F;

/// Class of a single raw input byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteClass {
    /// C0 control (0x00-0x1F), ESC included
    Control,
    /// Printable ASCII (0x20-0x7E)
    Printable,
    /// DEL (0x7F)
    Delete,
    /// UTF-8 continuation byte (10xxxxxx)
    Continuation,
    /// UTF-8 lead byte announcing this many continuation bytes (1..=3)
    Lead(u8),
    /// Byte with no UTF-8 lead pattern (0xF8-0xFF)
    Invalid,
}

impl ByteClass {
    /// Whether the byte is handled by the key recognizer rather than the text path
    pub fn is_control(self) -> bool {
        matches!(self, ByteClass::Control | ByteClass::Delete)
    }
}

/// Classify a raw byte
pub const fn classify(byte: u8) -> ByteClass {
    match byte {
        0x00..=0x1F => ByteClass::Control,
        0x20..=0x7E => ByteClass::Printable,
        0x7F => ByteClass::Delete,
        0x80..=0xBF => ByteClass::Continuation,
        0xC0..=0xDF => ByteClass::Lead(1),
        0xE0..=0xEF => ByteClass::Lead(2),
        0xF0..=0xF7 => ByteClass::Lead(3),
        0xF8..=0xFF => ByteClass::Invalid,
    }
}

/// CSI parameter byte: digits and `;` (plus `:` sub-parameter separator)
pub const fn is_csi_param(byte: u8) -> bool {
    matches!(byte, b'0'..=b'9' | b';' | b':')
}

/// CSI private marker, only valid as the first byte after `ESC [`
pub const fn is_csi_marker(byte: u8) -> bool {
    matches!(byte, b'<' | b'=' | b'>' | b'?')
}

/// Intermediate byte (0x20-0x2F)
pub const fn is_intermediate(byte: u8) -> bool {
    matches!(byte, 0x20..=0x2F)
}

/// Final byte of a CSI sequence (0x40-0x7E)
pub const fn is_final(byte: u8) -> bool {
    matches!(byte, 0x40..=0x7E)
}
