//! Events produced by the input parser
//!
//! Every byte of input ends up in exactly one of these: a decoded
//! codepoint, a key press, a mouse report, or a diagnostic describing
//! bytes that could not be interpreted any better.

use std::fmt;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

bitflags! {
    /// Modifier keys, laid out like the xterm modifier parameter (value - 1)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const ALT   = 0b0010;
        const CTRL  = 0b0100;
        const META  = 0b1000;
    }
}

impl Modifiers {
    /// Decode an xterm modifier parameter (`CSI 1 ; 5 A` carries 5 = 1 + Ctrl)
    pub fn from_xterm_param(value: u32) -> Self {
        let bits = value.saturating_sub(1).min(0xFF) as u8;
        Self::from_bits_truncate(bits)
    }
}

/// Logical key identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogicalKey {
    /// A character key, possibly combined with modifiers
    Char(char),
    Enter,
    Tab,
    /// Shift+Tab as sent by most terminals (`CSI Z`)
    BackTab,
    Backspace,
    Escape,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    Insert,
    Delete,
    /// Keypad 5 with NumLock off
    Begin,
    /// Function key F1..F20
    F(u8),
    KeypadEnter,
    /// Keypad digit or operator in application keypad mode
    Keypad(char),
    FocusIn,
    FocusOut,
    /// Bracketed paste start marker (`CSI 200 ~`)
    PasteStart,
    /// Bracketed paste end marker (`CSI 201 ~`)
    PasteEnd,
}

impl LogicalKey {
    /// Parse a key name as used in config files (`up`, `f5`, `kp-enter`, `x`)
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(rest) = name.strip_prefix("char:") {
            let mut chars = rest.chars();
            return match (chars.next(), chars.next()) {
                (Some(c), None) => Some(LogicalKey::Char(c)),
                _ => None,
            };
        }
        let mut chars = name.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            return Some(LogicalKey::Char(c));
        }

        let lower = name.to_ascii_lowercase();
        if let Some(rest) = lower.strip_prefix("kp-") {
            return match rest {
                "enter" => Some(LogicalKey::KeypadEnter),
                _ => {
                    let mut chars = rest.chars();
                    match (chars.next(), chars.next()) {
                        (Some(c), None) => Some(LogicalKey::Keypad(c)),
                        _ => None,
                    }
                }
            };
        }
        if let Some(number) = lower.strip_prefix('f') {
            if let Ok(n @ 1..=20) = number.parse::<u8>() {
                return Some(LogicalKey::F(n));
            }
        }

        let key = match lower.as_str() {
            "space" => LogicalKey::Char(' '),
            "enter" | "return" => LogicalKey::Enter,
            "tab" => LogicalKey::Tab,
            "backtab" => LogicalKey::BackTab,
            "backspace" => LogicalKey::Backspace,
            "escape" | "esc" => LogicalKey::Escape,
            "up" => LogicalKey::Up,
            "down" => LogicalKey::Down,
            "left" => LogicalKey::Left,
            "right" => LogicalKey::Right,
            "home" => LogicalKey::Home,
            "end" => LogicalKey::End,
            "pageup" => LogicalKey::PageUp,
            "pagedown" => LogicalKey::PageDown,
            "insert" => LogicalKey::Insert,
            "delete" => LogicalKey::Delete,
            "begin" => LogicalKey::Begin,
            "focus-in" => LogicalKey::FocusIn,
            "focus-out" => LogicalKey::FocusOut,
            "paste-start" => LogicalKey::PasteStart,
            "paste-end" => LogicalKey::PasteEnd,
            _ => return None,
        };
        Some(key)
    }
}

impl fmt::Display for LogicalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalKey::Char(' ') => f.write_str("space"),
            LogicalKey::Char(c) => write!(f, "{c}"),
            LogicalKey::Enter => f.write_str("enter"),
            LogicalKey::Tab => f.write_str("tab"),
            LogicalKey::BackTab => f.write_str("backtab"),
            LogicalKey::Backspace => f.write_str("backspace"),
            LogicalKey::Escape => f.write_str("escape"),
            LogicalKey::Up => f.write_str("up"),
            LogicalKey::Down => f.write_str("down"),
            LogicalKey::Left => f.write_str("left"),
            LogicalKey::Right => f.write_str("right"),
            LogicalKey::Home => f.write_str("home"),
            LogicalKey::End => f.write_str("end"),
            LogicalKey::PageUp => f.write_str("pageup"),
            LogicalKey::PageDown => f.write_str("pagedown"),
            LogicalKey::Insert => f.write_str("insert"),
            LogicalKey::Delete => f.write_str("delete"),
            LogicalKey::Begin => f.write_str("begin"),
            LogicalKey::F(n) => write!(f, "f{n}"),
            LogicalKey::KeypadEnter => f.write_str("kp-enter"),
            LogicalKey::Keypad(c) => write!(f, "kp-{c}"),
            LogicalKey::FocusIn => f.write_str("focus-in"),
            LogicalKey::FocusOut => f.write_str("focus-out"),
            LogicalKey::PasteStart => f.write_str("paste-start"),
            LogicalKey::PasteEnd => f.write_str("paste-end"),
        }
    }
}

/// Mouse button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
    WheelUp,
    WheelDown,
    WheelLeft,
    WheelRight,
    /// Buttons 8-11 (back/forward and friends)
    Extra(u8),
    /// Legacy release and button-less motion carry no button
    None,
}

/// Mouse event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MouseEventKind {
    Press,
    Release,
    /// Motion with a button held
    Drag,
    /// Motion with no button held
    Move,
    Wheel,
}

/// A decoded mouse report; coordinates are 0-based cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    pub button: MouseButton,
    pub x: u16,
    pub y: u16,
    pub modifiers: Modifiers,
}

/// What a diagnostic event reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticKind {
    /// A CSI sequence contained a byte outside its grammar
    MalformedSequence,
    /// Invalid UTF-8 was replaced with U+FFFD
    InvalidUtf8,
    /// The sequence buffer overflowed; its bytes were replayed as text
    SequenceTooLong,
    /// An ambiguous key was committed because no further bytes arrived
    AmbiguousKeyTimeout,
    /// An incomplete sequence exceeded its time budget and was discarded
    ParseTimeout,
    /// A mouse report could not be decoded
    InvalidMouseSequence,
    /// The parser found itself in a state it cannot process from
    InvalidParserState,
    /// A complete OSC or DCS string (terminal reply), payload in `detail`
    TerminalResponse,
    /// A well-formed sequence no key table entry names
    UnrecognizedSequence,
}

impl DiagnosticKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DiagnosticKind::MalformedSequence => "malformed-sequence",
            DiagnosticKind::InvalidUtf8 => "invalid-utf8",
            DiagnosticKind::SequenceTooLong => "sequence-too-long",
            DiagnosticKind::AmbiguousKeyTimeout => "ambiguous-key-timeout",
            DiagnosticKind::ParseTimeout => "parse-timeout",
            DiagnosticKind::InvalidMouseSequence => "invalid-mouse-sequence",
            DiagnosticKind::InvalidParserState => "invalid-parser-state",
            DiagnosticKind::TerminalResponse => "terminal-response",
            DiagnosticKind::UnrecognizedSequence => "unrecognized-sequence",
        }
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of parser output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ParsedInputEvent {
    /// A decoded text codepoint (U+FFFD for invalid input)
    TextCodepoint {
        codepoint: char,
        byte_length: u8,
        visual_width: u8,
    },
    /// A key press
    KeyPress {
        logical_key: LogicalKey,
        modifiers: Modifiers,
        raw_bytes: Vec<u8>,
    },
    /// A mouse report
    MouseEvent(MouseEvent),
    /// Informational report about input that was recovered from
    Diagnostic { kind: DiagnosticKind, detail: Vec<u8> },
}

impl ParsedInputEvent {
    pub fn text(codepoint: char, byte_length: u8) -> Self {
        let visual_width = codepoint.width().unwrap_or(0).min(u8::MAX as usize) as u8;
        ParsedInputEvent::TextCodepoint {
            codepoint,
            byte_length,
            visual_width,
        }
    }

    pub fn key(logical_key: LogicalKey, modifiers: Modifiers, raw_bytes: impl Into<Vec<u8>>) -> Self {
        ParsedInputEvent::KeyPress {
            logical_key,
            modifiers,
            raw_bytes: raw_bytes.into(),
        }
    }

    pub fn diagnostic(kind: DiagnosticKind, detail: impl Into<Vec<u8>>) -> Self {
        ParsedInputEvent::Diagnostic {
            kind,
            detail: detail.into(),
        }
    }

    pub fn is_diagnostic(&self) -> bool {
        matches!(self, ParsedInputEvent::Diagnostic { .. })
    }
}
