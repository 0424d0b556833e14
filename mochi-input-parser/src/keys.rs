//! Key sequence table and recognizer
//!
//! Maps exact byte sequences to logical keys. The table is sorted, so
//! "is this a prefix of something longer" is a single range lookup.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::classify::{DEL, ESC};
use crate::error::{ConfigError, Result};
use crate::event::{LogicalKey, Modifiers};

/// What a table entry produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyBinding {
    pub key: LogicalKey,
    pub modifiers: Modifiers,
}

impl KeyBinding {
    pub const fn new(key: LogicalKey, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    pub const fn plain(key: LogicalKey) -> Self {
        Self::new(key, Modifiers::empty())
    }
}

/// Classification of a byte sequence against the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Complete match, nothing longer starts with it
    Exact(KeyBinding),
    /// Strict prefix of at least one entry, no match yet
    Prefix,
    /// Complete match that is also a prefix of a longer entry
    Ambiguous(KeyBinding),
    /// Neither a match nor a viable prefix
    None,
}

/// Read-only mapping from byte sequences to keys
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeySequenceTable {
    entries: BTreeMap<Vec<u8>, KeyBinding>,
}

impl KeySequenceTable {
    /// A table with no entries
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> KeyTableBuilder {
        KeyTableBuilder::default()
    }

    /// Continue building on top of this table
    pub fn into_builder(self) -> KeyTableBuilder {
        KeyTableBuilder { table: self }
    }

    /// Exact lookup
    pub fn get(&self, sequence: &[u8]) -> Option<KeyBinding> {
        self.entries.get(sequence).copied()
    }

    /// Whether a strictly longer entry starts with `sequence`
    pub fn has_extension(&self, sequence: &[u8]) -> bool {
        self.entries
            .range::<[u8], _>((Bound::Excluded(sequence), Bound::Unbounded))
            .next()
            .is_some_and(|(key, _)| key.starts_with(sequence))
    }

    pub fn classify(&self, sequence: &[u8]) -> MatchKind {
        match (self.get(sequence), self.has_extension(sequence)) {
            (Some(binding), false) => MatchKind::Exact(binding),
            (Some(binding), true) => MatchKind::Ambiguous(binding),
            (None, true) => MatchKind::Prefix,
            (None, false) => MatchKind::None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], KeyBinding)> {
        self.entries.iter().map(|(seq, binding)| (seq.as_slice(), *binding))
    }

    /// The xterm / VT220 / rxvt dialect most terminals speak
    pub fn xterm() -> Self {
        use LogicalKey::*;

        let mut builder = Self::builder();
        let mut add = |seq: &[u8], key: LogicalKey, modifiers: Modifiers| {
            builder.entries_mut().insert(seq.to_vec(), KeyBinding::new(key, modifiers));
        };
        let none = Modifiers::empty();

        add(b"\r", Enter, none);
        add(b"\t", Tab, none);
        add(b"\x1b", Escape, none);
        add(&[DEL], Backspace, none);

        // Cursor keys, normal and application mode
        for (letter, key) in [
            (b'A', Up),
            (b'B', Down),
            (b'C', Right),
            (b'D', Left),
            (b'H', Home),
            (b'F', End),
            (b'E', Begin),
        ] {
            add(&[ESC, b'[', letter], key, none);
            add(&[ESC, b'O', letter], key, none);
        }

        // rxvt shifted / ctrl cursor keys
        for (letter, key) in [(b'a', Up), (b'b', Down), (b'c', Right), (b'd', Left)] {
            add(&[ESC, b'[', letter], key, Modifiers::SHIFT);
            add(&[ESC, b'O', letter], key, Modifiers::CTRL);
        }

        add(b"\x1b[Z", BackTab, none);
        add(b"\x1b[I", FocusIn, none);
        add(b"\x1b[O", FocusOut, none);

        // F1-F4 as SS3
        for (letter, n) in [(b'P', 1), (b'Q', 2), (b'R', 3), (b'S', 4)] {
            add(&[ESC, b'O', letter], F(n), none);
        }

        // VT220 editing keypad and function keys
        let tilde: &[(u32, LogicalKey)] = &[
            (1, Home),
            (2, Insert),
            (3, Delete),
            (4, End),
            (5, PageUp),
            (6, PageDown),
            (7, Home),
            (8, End),
            (11, F(1)),
            (12, F(2)),
            (13, F(3)),
            (14, F(4)),
            (15, F(5)),
            (17, F(6)),
            (18, F(7)),
            (19, F(8)),
            (20, F(9)),
            (21, F(10)),
            (23, F(11)),
            (24, F(12)),
            (25, F(13)),
            (26, F(14)),
            (28, F(15)),
            (29, F(16)),
            (31, F(17)),
            (32, F(18)),
            (33, F(19)),
            (34, F(20)),
            (200, PasteStart),
            (201, PasteEnd),
        ];
        for &(code, key) in tilde {
            add(format!("\x1b[{code}~").as_bytes(), key, none);
        }

        // rxvt editing keys: `$` is Shift, `^` is Ctrl
        for (code, key) in [
            (2, Insert),
            (3, Delete),
            (5, PageUp),
            (6, PageDown),
            (7, Home),
            (8, End),
        ] {
            add(format!("\x1b[{code}$").as_bytes(), key, Modifiers::SHIFT);
            add(format!("\x1b[{code}^").as_bytes(), key, Modifiers::CTRL);
        }

        // Linux console F1-F5
        for (letter, n) in [(b'A', 1), (b'B', 2), (b'C', 3), (b'D', 4), (b'E', 5)] {
            add(&[ESC, b'[', b'[', letter], F(n), none);
        }

        // Application keypad
        add(b"\x1bOM", KeypadEnter, none);
        for (letter, c) in [
            (b'j', '*'),
            (b'k', '+'),
            (b'l', ','),
            (b'm', '-'),
            (b'n', '.'),
            (b'o', '/'),
            (b'X', '='),
        ] {
            add(&[ESC, b'O', letter], Keypad(c), none);
        }
        for (offset, c) in ('0'..='9').enumerate() {
            add(&[ESC, b'O', b'p' + offset as u8], Keypad(c), none);
        }

        builder.build()
    }
}

/// Builder that validates entries before they reach a table
#[derive(Debug, Clone, Default)]
pub struct KeyTableBuilder {
    table: KeySequenceTable,
}

impl KeyTableBuilder {
    fn entries_mut(&mut self) -> &mut BTreeMap<Vec<u8>, KeyBinding> {
        &mut self.table.entries
    }

    /// Add or replace an entry
    pub fn bind(&mut self, sequence: &[u8], binding: KeyBinding) -> Result<&mut Self> {
        validate_sequence(sequence)?;
        self.table.entries.insert(sequence.to_vec(), binding);
        Ok(self)
    }

    /// Add an entry given in config notation (`\e[1;5A` = `ctrl-up`)
    pub fn bind_spec(&mut self, notation: &str, spec: &str) -> Result<&mut Self> {
        let sequence = parse_sequence(notation)?;
        let binding = parse_key_spec(spec)?;
        self.bind(&sequence, binding)
    }

    /// Remove an entry
    pub fn unbind(&mut self, sequence: &[u8]) -> &mut Self {
        self.table.entries.remove(sequence);
        self
    }

    pub fn build(self) -> KeySequenceTable {
        self.table
    }
}

fn validate_sequence(sequence: &[u8]) -> Result<()> {
    let reject = |reason: &str| {
        Err(ConfigError::KeySequence {
            sequence: format_sequence(sequence),
            reason: reason.to_string(),
        })
    };
    match sequence {
        [] => reject("empty sequence"),
        [byte] if *byte < 0x20 || *byte == DEL => Ok(()),
        [_] => reject("single byte must be a control character"),
        [ESC, ESC, ..] => reject("ESC ESC is the Alt prefix"),
        [ESC, b']' | b'P', ..] => reject("OSC and DCS strings are not keys"),
        [ESC, ..] => Ok(()),
        _ => reject("multi-byte sequence must start with ESC"),
    }
}

/// Parse a key spec such as `ctrl-alt-up`, `shift-f5` or `char:-`
pub fn parse_key_spec(spec: &str) -> Result<KeyBinding> {
    let mut modifiers = Modifiers::empty();
    let mut rest = spec.trim();
    loop {
        let lower = rest.to_ascii_lowercase();
        let (flag, len) = if lower.starts_with("ctrl-") {
            (Modifiers::CTRL, 5)
        } else if lower.starts_with("alt-") {
            (Modifiers::ALT, 4)
        } else if lower.starts_with("shift-") {
            (Modifiers::SHIFT, 6)
        } else if lower.starts_with("meta-") {
            (Modifiers::META, 5)
        } else {
            break;
        };
        // "alt--" binds Alt+'-'
        if rest.len() == len {
            break;
        }
        modifiers |= flag;
        rest = &rest[len..];
    }
    LogicalKey::from_name(rest)
        .map(|key| KeyBinding::new(key, modifiers))
        .ok_or_else(|| ConfigError::KeySpec(spec.to_string()))
}

/// Parse sequence notation: `\e` / `\E` / `^[` for ESC, `^X` for controls,
/// `\xNN` for raw bytes, `\\`, `\t`, `\r`, `\n`; anything else is literal.
pub fn parse_sequence(notation: &str) -> Result<Vec<u8>> {
    let invalid = |reason: &str| ConfigError::KeySequence {
        sequence: notation.to_string(),
        reason: reason.to_string(),
    };

    let mut out = Vec::new();
    let mut chars = notation.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('e' | 'E') => out.push(ESC),
                Some('\\') => out.push(b'\\'),
                Some('t') => out.push(b'\t'),
                Some('r') => out.push(b'\r'),
                Some('n') => out.push(b'\n'),
                Some('x') => {
                    let hex: String = chars.by_ref().take(2).collect();
                    let byte = u8::from_str_radix(&hex, 16)
                        .ok()
                        .filter(|_| hex.len() == 2)
                        .ok_or_else(|| invalid("\\x needs two hex digits"))?;
                    out.push(byte);
                }
                Some(other) => return Err(invalid(&format!("unknown escape \\{other}"))),
                None => return Err(invalid("trailing backslash")),
            },
            '^' => match chars.peek().copied() {
                Some('?') => {
                    chars.next();
                    out.push(DEL);
                }
                Some(n @ '@'..='_') | Some(n @ 'a'..='z') => {
                    chars.next();
                    out.push(n.to_ascii_uppercase() as u8 & 0x1F);
                }
                _ => out.push(b'^'),
            },
            other => {
                let mut buf = [0u8; 4];
                out.extend_from_slice(other.encode_utf8(&mut buf).as_bytes());
            }
        }
    }
    if out.is_empty() {
        return Err(invalid("empty sequence"));
    }
    Ok(out)
}

/// Render bytes in the notation accepted by [`parse_sequence`]
pub fn format_sequence(sequence: &[u8]) -> String {
    let mut out = String::new();
    for &byte in sequence {
        match byte {
            ESC => out.push_str("\\e"),
            b'\\' => out.push_str("\\\\"),
            b'^' => out.push_str("\\x5e"),
            0x20..=0x7E => out.push(byte as char),
            _ => out.push_str(&format!("\\x{byte:02x}")),
        }
    }
    out
}
