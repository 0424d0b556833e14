//! Mochi Input Parser - terminal input decoder
//!
//! Converts the raw byte stream read from a terminal into ordered input
//! events: text codepoints, key presses, mouse reports and diagnostics.
//!
//! The parser is designed to:
//! - Handle arbitrary chunk boundaries (streaming)
//! - Never lose input: bad bytes degrade to their most literal reading
//! - Resolve ambiguous sequences (`ESC`, `ESC O`) by an injected clock
//! - Decode X10, UTF-8 extended, SGR and urxvt mouse reports
//!
//! Reference: https://invisible-island.net/xterm/ctlseqs/ctlseqs.html

mod buffer;
pub mod classify;
mod clock;
mod config;
mod error;
mod event;
pub mod keys;
pub mod mouse;
mod params;
mod parser;
mod stats;
mod utf8;

pub use buffer::{Overflow, SequenceBuffer};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ParserConfig, DEFAULT_AMBIGUOUS_KEY_TIMEOUT, DEFAULT_MAX_SEQUENCE_LEN,
    DEFAULT_SEQUENCE_TIMEOUT, MIN_SEQUENCE_LEN,
};
pub use error::{ConfigError, Result};
pub use event::{
    DiagnosticKind, LogicalKey, Modifiers, MouseButton, MouseEvent, MouseEventKind,
    ParsedInputEvent,
};
pub use keys::{KeyBinding, KeySequenceTable, KeyTableBuilder, MatchKind};
pub use mouse::MouseTrackingMode;
pub use params::{CsiError, CsiParameters};
pub use parser::{Feed, Parser, ParserState};
pub use stats::ParserStats;
pub use utf8::{Utf8Decoder, Utf8Result, REPLACEMENT_CHAR};
