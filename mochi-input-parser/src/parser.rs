//! Terminal input state machine
//!
//! Turns the raw byte stream read from a terminal into [`ParsedInputEvent`]s.
//! One byte is processed at a time and chunk boundaries never matter: the
//! parser keeps every partial codepoint and partial escape sequence itself.
//!
//! States:
//! - `Normal`: text goes through the UTF-8 decoder, C0 controls become keys
//! - `Escape`: after ESC, matching the key table (SS3 forms, Alt+key)
//! - `Csi`: after `ESC [`, collecting parameters up to the final byte; key
//!   table entries are matched first, so non-CSI forms such as `ESC [ [ A`
//!   still resolve to keys
//! - `Osc` / `Dcs`: collecting a terminal reply up to BEL or `ESC \`
//! - `StringTerminator`: ESC seen inside an OSC/DCS string
//!
//! Time only matters where the input is genuinely ambiguous. A lone ESC,
//! `ESC O` or a table entry that is also a prefix of a longer one waits for
//! the ambiguous-key timeout; any other incomplete sequence is dropped after
//! the sequence timeout. Expiry is never checked while bytes are arriving:
//! the reader calls [`Parser::poll_timeout`] when a read waited and came back
//! empty, so a slow consumer cannot split a sequence.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::buffer::{Overflow, SequenceBuffer};
use crate::classify::{
    classify, is_csi_marker, is_csi_param, is_final, is_intermediate, BEL, DEL, ESC,
};
use crate::clock::{Clock, SystemClock};
use crate::config::{ParserConfig, MIN_SEQUENCE_LEN};
use crate::event::{DiagnosticKind, LogicalKey, Modifiers, MouseEvent, ParsedInputEvent};
use crate::keys::{format_sequence, KeyBinding, KeySequenceTable, MatchKind};
use crate::mouse::{self, Collect, LegacyReport, MouseError, MouseTrackingMode};
use crate::params::{CsiError, CsiParameters};
use crate::stats::ParserStats;
use crate::utf8::{Utf8Decoder, Utf8Result, REPLACEMENT_CHAR};

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    /// Text and single control bytes
    Normal,
    /// After ESC
    Escape,
    /// After ESC [
    Csi,
    /// After ESC ]
    Osc,
    /// After ESC P
    Dcs,
    /// ESC inside an OSC/DCS string, expecting `\`
    StringTerminator,
    /// Recovering from bad input; never observable between calls
    Error,
}

/// How far the CSI grammar got while a table entry kept the sequence open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CsiProgress {
    /// Still collecting parameters
    Open,
    /// The final byte arrived; `len` bytes form the CSI sequence
    Complete { len: usize, final_byte: u8 },
    /// The bytes stopped being a CSI sequence
    Broken,
}

/// Outcome of feeding a single byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// The byte was absorbed into a pending unit
    NeedMore,
    /// One or more units completed, diagnostics included
    Emit(Vec<ParsedInputEvent>),
}

/// The input parser
#[derive(Debug)]
pub struct Parser<C: Clock = SystemClock> {
    table: Arc<KeySequenceTable>,
    config: ParserConfig,
    clock: C,
    state: ParserState,
    utf8: Utf8Decoder,
    /// Raw bytes of the sequence being assembled, ESC included
    buffer: SequenceBuffer,
    params: CsiParameters,
    /// Payload collection after `ESC [ M`
    legacy_mouse: Option<LegacyReport>,
    /// Longest complete table match seen so far, as (length, binding)
    best_match: Option<(usize, KeyBinding)>,
    csi_progress: CsiProgress,
    /// The sequence was introduced by ESC ESC
    alt_prefix: bool,
    /// Escape bytes waiting for the codepoint they modify
    alt_text: Option<Vec<u8>>,
    started_at: Option<Instant>,
    last_byte_at: Option<Instant>,
    text_started_at: Option<Instant>,
    /// Bytes to process again after a sequence was abandoned
    replay: VecDeque<u8>,
    out: Vec<ParsedInputEvent>,
    stats: ParserStats,
}

impl Parser<SystemClock> {
    /// Create a parser reading the system monotonic clock
    pub fn new(table: Arc<KeySequenceTable>, config: ParserConfig) -> Self {
        Self::with_clock(table, config, SystemClock)
    }
}

impl Default for Parser<SystemClock> {
    fn default() -> Self {
        Self::new(Arc::new(KeySequenceTable::xterm()), ParserConfig::default())
    }
}

impl<C: Clock> Parser<C> {
    /// Create a parser with an injected clock
    pub fn with_clock(table: Arc<KeySequenceTable>, config: ParserConfig, clock: C) -> Self {
        let limit = config.max_sequence_len.max(MIN_SEQUENCE_LEN);
        Self {
            table,
            config,
            clock,
            state: ParserState::Normal,
            utf8: Utf8Decoder::new(),
            buffer: SequenceBuffer::new(limit),
            params: CsiParameters::new(),
            legacy_mouse: None,
            best_match: None,
            csi_progress: CsiProgress::Open,
            alt_prefix: false,
            alt_text: None,
            started_at: None,
            last_byte_at: None,
            text_started_at: None,
            replay: VecDeque::new(),
            out: Vec::new(),
            stats: ParserStats::default(),
        }
    }

    /// Get current parser state
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Counters since creation or the last [`reset`](Self::reset)
    pub fn stats(&self) -> &ParserStats {
        &self.stats
    }

    /// Active configuration, including the current mouse mode
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Key table in use
    pub fn table(&self) -> &Arc<KeySequenceTable> {
        &self.table
    }

    /// Clock that timestamps bytes and deadlines
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Switch the mouse protocol, e.g. after the application enabled 1006
    pub fn set_mouse_mode(&mut self, mode: MouseTrackingMode) {
        self.config.mouse_mode = mode;
    }

    /// Replace the key table; takes effect from the next sequence
    pub fn set_table(&mut self, table: Arc<KeySequenceTable>) {
        self.table = table;
    }

    /// Nothing is pending: no partial codepoint and no partial sequence
    pub fn is_idle(&self) -> bool {
        self.state == ParserState::Normal && !self.utf8.is_pending() && self.replay.is_empty()
    }

    /// Feed one byte
    pub fn feed(&mut self, byte: u8) -> Feed {
        self.advance(byte);
        if self.out.is_empty() {
            Feed::NeedMore
        } else {
            Feed::Emit(std::mem::take(&mut self.out))
        }
    }

    /// Parse a chunk of bytes, calling the callback for each event
    pub fn parse<F>(&mut self, data: &[u8], mut callback: F)
    where
        F: FnMut(ParsedInputEvent),
    {
        for &byte in data {
            self.advance(byte);
            self.deliver(&mut callback);
        }
    }

    /// Parse a chunk and collect events into a vector
    pub fn parse_collect(&mut self, data: &[u8]) -> Vec<ParsedInputEvent> {
        let mut events = Vec::new();
        self.parse(data, |event| events.push(event));
        events
    }

    /// When the pending unit must be resolved if no further byte arrives
    pub fn next_deadline(&self) -> Option<Instant> {
        let ambiguous = self.config.ambiguous_key_timeout;
        let sequence = self.config.sequence_timeout;
        match self.state {
            ParserState::Normal => {
                if self.utf8.is_pending() {
                    self.text_started_at.map(|t| t + sequence)
                } else {
                    None
                }
            }
            ParserState::Escape | ParserState::StringTerminator => {
                self.last_byte_at.map(|t| t + ambiguous)
            }
            ParserState::Csi if self.table_pending() => self.last_byte_at.map(|t| t + ambiguous),
            ParserState::Csi | ParserState::Osc | ParserState::Dcs => {
                if self.has_body() {
                    self.started_at.map(|t| t + sequence)
                } else {
                    self.last_byte_at.map(|t| t + ambiguous)
                }
            }
            ParserState::Error => self.last_byte_at.or(self.started_at),
        }
    }

    /// Time left before [`next_deadline`](Self::next_deadline), zero if passed
    pub fn time_to_deadline(&self) -> Option<Duration> {
        self.next_deadline()
            .map(|deadline| deadline.saturating_duration_since(self.clock.now()))
    }

    /// Resolve the pending unit if its deadline has passed.
    ///
    /// Call this when waiting for input timed out. Returns whether anything
    /// was resolved.
    pub fn poll_timeout<F>(&mut self, mut callback: F) -> bool
    where
        F: FnMut(ParsedInputEvent),
    {
        let expired = self
            .next_deadline()
            .is_some_and(|deadline| self.clock.now() >= deadline);
        if expired {
            self.expire();
            self.drain_replay();
            self.deliver(&mut callback);
        }
        expired
    }

    /// [`poll_timeout`](Self::poll_timeout) collecting into a vector
    pub fn poll_timeout_collect(&mut self) -> Vec<ParsedInputEvent> {
        let mut events = Vec::new();
        self.poll_timeout(|event| events.push(event));
        events
    }

    /// End of input: commit everything pending as if its timeout expired
    pub fn flush<F>(&mut self, mut callback: F)
    where
        F: FnMut(ParsedInputEvent),
    {
        while !self.is_idle() {
            self.expire();
            self.drain_replay();
        }
        self.deliver(&mut callback);
    }

    /// [`flush`](Self::flush) collecting into a vector
    pub fn flush_collect(&mut self) -> Vec<ParsedInputEvent> {
        let mut events = Vec::new();
        self.flush(|event| events.push(event));
        events
    }

    /// Abort any partial unit without emitting anything for it
    pub fn cancel(&mut self) {
        if !self.is_idle() {
            debug!(
                "cancelled in {:?} with {} buffered bytes",
                self.state,
                self.buffer.len()
            );
        }
        self.resync();
        self.utf8.reset();
        self.alt_text = None;
        self.text_started_at = None;
        self.replay.clear();
        self.out.clear();
    }

    /// Cancel and clear statistics
    pub fn reset(&mut self) {
        self.cancel();
        self.stats = ParserStats::default();
    }

    fn advance(&mut self, byte: u8) {
        self.stats.bytes_processed += 1;
        self.step(byte);
        self.drain_replay();
    }

    fn drain_replay(&mut self) {
        // Every replayed byte was consumed once already and each pass
        // commits at least one of them, so this terminates.
        while let Some(byte) = self.replay.pop_front() {
            self.step(byte);
        }
    }

    fn deliver<F>(&mut self, callback: &mut F)
    where
        F: FnMut(ParsedInputEvent),
    {
        for event in self.out.drain(..) {
            callback(event);
        }
    }

    fn step(&mut self, byte: u8) {
        match self.state {
            ParserState::Normal => self.normal(byte),
            ParserState::Escape => self.escape(byte),
            ParserState::Csi => self.csi(byte),
            ParserState::Osc | ParserState::Dcs => self.string(byte),
            ParserState::StringTerminator => self.string_terminator(byte),
            ParserState::Error => {
                let raw = self.buffer.take();
                self.fail(DiagnosticKind::InvalidParserState, raw);
                self.normal(byte);
            }
        }
    }

    // Normal

    fn normal(&mut self, byte: u8) {
        if classify(byte).is_control() {
            self.close_text();
            if byte == ESC {
                self.begin_escape();
            } else {
                let binding = self.control_key(byte);
                self.emit_key(binding, vec![byte]);
            }
        } else {
            self.decode_text(byte);
        }
    }

    fn decode_text(&mut self, byte: u8) {
        let mut pending = [0u8; 4];
        let pending_len = self.utf8.pending_bytes().len();
        pending[..pending_len].copy_from_slice(self.utf8.pending_bytes());

        match self.utf8.feed(byte) {
            Utf8Result::NeedMore => {
                if pending_len == 0 {
                    self.text_started_at = Some(self.clock.now());
                }
            }
            Utf8Result::Complete { ch, len } => {
                self.text_started_at = None;
                self.emit_char(ch, len);
            }
            Utf8Result::Invalid { len, retry } => {
                self.text_started_at = None;
                let mut detail = pending[..pending_len].to_vec();
                if !retry {
                    detail.push(byte);
                }
                self.emit_invalid(len, detail);
                if retry {
                    // A fresh decoder never asks for a retry
                    self.decode_text(byte);
                }
            }
        }
    }

    /// Close an incomplete codepoint as one invalid run
    fn close_text(&mut self) {
        if !self.utf8.is_pending() {
            return;
        }
        let detail = self.utf8.pending_bytes().to_vec();
        if let Some(Utf8Result::Invalid { len, .. }) = self.utf8.finish() {
            self.emit_invalid(len, detail);
        }
        self.text_started_at = None;
    }

    fn emit_char(&mut self, ch: char, len: u8) {
        match self.alt_text.take() {
            Some(mut raw) => {
                let mut encoded = [0u8; 4];
                raw.extend_from_slice(ch.encode_utf8(&mut encoded).as_bytes());
                self.emit_key(KeyBinding::new(LogicalKey::Char(ch), Modifiers::ALT), raw);
            }
            None => self.emit(ParsedInputEvent::text(ch, len)),
        }
    }

    fn emit_invalid(&mut self, len: u8, detail: Vec<u8>) {
        if let Some(raw) = self.alt_text.take() {
            let binding = self.lone_escape(raw.len() > 1);
            self.emit_key(binding, raw);
        }
        self.emit(ParsedInputEvent::text(REPLACEMENT_CHAR, len));
        self.note(DiagnosticKind::InvalidUtf8, detail);
    }

    fn control_key(&self, byte: u8) -> KeyBinding {
        self.table
            .get(&[byte])
            .unwrap_or_else(|| default_control_key(byte))
    }

    // Escape

    fn begin_escape(&mut self) {
        self.resync();
        self.state = ParserState::Escape;
        let now = self.clock.now();
        self.started_at = Some(now);
        self.last_byte_at = Some(now);
        let pushed = self.buffer.push(ESC);
        debug_assert!(pushed.is_ok());
    }

    fn escape(&mut self, byte: u8) {
        let start = self.seq_start();

        if self.buffer.len() == start + 1 {
            match byte {
                ESC if !self.alt_prefix => {
                    if self.accept(byte) {
                        self.alt_prefix = true;
                    }
                    return;
                }
                ESC => {
                    // Third ESC: the first two were Alt+Escape
                    let raw = self.buffer.take();
                    let binding = self.lone_escape(true);
                    self.emit_key(binding, raw);
                    self.begin_escape();
                    return;
                }
                b'[' | b']' | b'P' => {
                    if self.accept(byte) {
                        self.state = match byte {
                            b'[' => ParserState::Csi,
                            b']' => ParserState::Osc,
                            _ => ParserState::Dcs,
                        };
                    }
                    return;
                }
                _ => {}
            }
        }

        if !self.accept(byte) {
            return;
        }
        let len = self.buffer.len() - start;
        match self.table.classify(&self.buffer.as_slice()[start..]) {
            MatchKind::Exact(binding) => {
                let raw = self.buffer.take();
                let binding = self.with_alt(binding);
                self.emit_key(binding, raw);
                self.resync();
            }
            MatchKind::Ambiguous(binding) => self.best_match = Some((len, binding)),
            MatchKind::Prefix => {}
            MatchKind::None => self.resolve_escape(false),
        }
    }

    /// Commit the longest known key and replay whatever followed it.
    ///
    /// Without a complete match the byte after ESC is taken as an
    /// Alt-modified key.
    fn resolve_escape(&mut self, timed_out: bool) {
        let start = self.seq_start();
        let alt_prefix = self.alt_prefix;
        let best = self.best_match;
        let raw = self.buffer.take();
        self.resync();

        let committed = if let Some((len, mut binding)) = best {
            if alt_prefix {
                binding.modifiers |= Modifiers::ALT;
            }
            self.emit_key(binding, raw[..start + len].to_vec());
            start + len
        } else if raw.len() <= start + 1 {
            let binding = self.lone_escape(alt_prefix);
            self.emit_key(binding, raw.clone());
            raw.len()
        } else {
            let byte = raw[start + 1];
            if byte >= 0x80 {
                self.alt_text = Some(raw[..=start].to_vec());
                start + 1
            } else {
                let binding = self.alt_key(byte);
                self.emit_key(binding, raw[..start + 2].to_vec());
                start + 2
            }
        };

        if timed_out {
            debug!("committed {} after timeout", format_sequence(&raw[..committed]));
            self.note(DiagnosticKind::AmbiguousKeyTimeout, raw[..committed].to_vec());
        }
        self.replay_front(&raw[committed..]);
    }

    fn lone_escape(&self, alt: bool) -> KeyBinding {
        let mut binding = self
            .table
            .get(&[ESC])
            .unwrap_or(KeyBinding::plain(LogicalKey::Escape));
        if alt {
            binding.modifiers |= Modifiers::ALT;
        }
        binding
    }

    fn alt_key(&self, byte: u8) -> KeyBinding {
        let mut binding = if classify(byte).is_control() {
            self.control_key(byte)
        } else {
            KeyBinding::plain(LogicalKey::Char(char::from(byte)))
        };
        binding.modifiers |= Modifiers::ALT;
        binding
    }

    fn with_alt(&self, mut binding: KeyBinding) -> KeyBinding {
        if self.alt_prefix {
            binding.modifiers |= Modifiers::ALT;
        }
        binding
    }

    // CSI

    fn csi(&mut self, byte: u8) {
        if self.legacy_mouse.is_some() {
            self.legacy_mouse_byte(byte);
            return;
        }

        if byte == ESC || !(0x20..=0x7E).contains(&byte) {
            // Settle what was collected, then take the byte afresh
            self.replay.push_front(byte);
            if self.table_pending() {
                self.resolve_csi(false);
            } else if self.has_body() {
                self.malformed_csi();
            } else {
                self.abandon_intro();
            }
            return;
        }

        if !self.accept(byte) {
            return;
        }

        // Table entries win over the CSI grammar, so dialects such as the
        // Linux console `ESC [ [ A` or rxvt `ESC [ 2 $` are reachable.
        let start = self.seq_start();
        let len = self.buffer.len() - start;
        let matched = self.table.classify(&self.buffer.as_slice()[start..]);
        let extends = match matched {
            MatchKind::Exact(binding) => {
                let raw = self.buffer.take();
                let binding = self.with_alt(binding);
                self.emit_key(binding, raw);
                self.resync();
                return;
            }
            MatchKind::Ambiguous(binding) => {
                self.best_match = Some((len, binding));
                true
            }
            MatchKind::Prefix => true,
            MatchKind::None => false,
        };

        if self.csi_progress != CsiProgress::Open {
            if !extends {
                self.resolve_csi(false);
            }
            return;
        }

        match self.csi_grammar(byte) {
            Ok(false) => {}
            Ok(true) if extends => {
                self.csi_progress = CsiProgress::Complete {
                    len: self.buffer.len(),
                    final_byte: byte,
                };
            }
            Ok(true) => self.dispatch_csi(byte),
            Err(err) => {
                debug!("malformed CSI: {err}");
                if extends {
                    self.csi_progress = CsiProgress::Broken;
                } else {
                    self.resolve_csi(false);
                }
            }
        }
    }

    /// Advance the CSI grammar by one byte; `Ok(true)` once the final byte is in
    fn csi_grammar(&mut self, byte: u8) -> Result<bool, CsiError> {
        if is_csi_marker(byte) && !self.params.has_body() {
            self.params.set_marker(byte);
        } else if is_csi_param(byte) {
            self.params.push_param_byte(byte)?;
        } else if is_intermediate(byte) {
            self.params.push_intermediate(byte)?;
        } else if is_final(byte) {
            self.params.finish(byte)?;
            return Ok(true);
        } else {
            return Err(CsiError::MisplacedMarker);
        }
        Ok(false)
    }

    /// The key table, not the CSI grammar, is what keeps this sequence open
    fn table_pending(&self) -> bool {
        self.best_match.is_some() || self.csi_progress != CsiProgress::Open
    }

    /// Settle a CSI sequence once the key table stops matching.
    ///
    /// The longest table entry wins, then a complete CSI sequence. Bytes
    /// after the committed part are processed again.
    fn resolve_csi(&mut self, timed_out: bool) {
        let start = self.seq_start();
        if let Some((len, binding)) = self.best_match {
            let raw = self.buffer.take();
            let end = start + len;
            let binding = self.with_alt(binding);
            self.emit_key(binding, raw[..end].to_vec());
            if timed_out {
                self.note(DiagnosticKind::AmbiguousKeyTimeout, raw[..end].to_vec());
            }
            self.resync();
            self.replay_front(&raw[end..]);
            return;
        }
        match self.csi_progress {
            CsiProgress::Complete { len, final_byte } => {
                let rest = self.buffer.split_off(len);
                self.dispatch_csi(final_byte);
                self.replay_front(&rest);
            }
            CsiProgress::Open | CsiProgress::Broken => self.malformed_csi(),
        }
    }

    /// Report a broken CSI, then read `ESC [` as Alt+`[` and replay the rest
    fn malformed_csi(&mut self) {
        let raw = self.buffer.take();
        let intro = (self.seq_start() + 2).min(raw.len());
        self.fail(DiagnosticKind::MalformedSequence, raw.clone());
        let binding = KeyBinding::new(LogicalKey::Char('['), Modifiers::ALT);
        self.emit_key(binding, raw[..intro].to_vec());
        self.replay_front(&raw[intro..]);
    }

    fn dispatch_csi(&mut self, final_byte: u8) {
        let mode = self.config.mouse_mode;

        if self.params.marker() == Some(b'<')
            && self.params.intermediates().is_empty()
            && matches!(final_byte, b'M' | b'm')
        {
            let result = mouse::decode_sgr(self.params.params(), final_byte == b'm');
            self.finish_mouse(result);
            return;
        }
        if final_byte == b'M' && !self.params.has_body() {
            // The payload bytes belong to the report, not to a table entry
            self.best_match = None;
            self.csi_progress = CsiProgress::Open;
            self.legacy_mouse = Some(LegacyReport::new(mode == MouseTrackingMode::Utf8Extended));
            return;
        }
        if final_byte == b'M'
            && mode == MouseTrackingMode::Urxvt
            && self.params.is_plain()
            && self.params.len() == 3
        {
            let result = mouse::decode_urxvt(self.params.params());
            self.finish_mouse(result);
            return;
        }

        let start = self.seq_start();
        let binding = self
            .table
            .get(&self.buffer.as_slice()[start..])
            .or_else(|| self.modified_key(final_byte));
        let raw = self.buffer.take();
        match binding {
            Some(binding) => {
                let binding = self.with_alt(binding);
                self.emit_key(binding, raw);
                self.resync();
            }
            None => {
                self.diagnose(DiagnosticKind::UnrecognizedSequence, raw);
                self.resync();
            }
        }
    }

    /// xterm modifier form: `CSI 1 ; m X` and `CSI n ; m ~`
    fn modified_key(&self, final_byte: u8) -> Option<KeyBinding> {
        if !self.params.is_plain() || self.params.len() != 2 {
            return None;
        }
        let code = self.params.get(0)?;
        let modifiers = Modifiers::from_xterm_param(self.params.get(1)?);
        let base = if final_byte == b'~' {
            self.table.get(format!("\x1b[{code}~").as_bytes())
        } else if code <= 1 {
            self.table
                .get(&[ESC, b'[', final_byte])
                .or_else(|| self.table.get(&[ESC, b'O', final_byte]))
        } else {
            None
        }?;
        Some(KeyBinding::new(base.key, base.modifiers | modifiers))
    }

    fn legacy_mouse_byte(&mut self, byte: u8) {
        if !self.accept(byte) {
            return;
        }
        let Some(report) = self.legacy_mouse.as_mut() else {
            return;
        };
        match report.push(byte) {
            Collect::NeedMore => {}
            Collect::Complete(values) => self.finish_mouse(mouse::decode_legacy(values)),
            Collect::Invalid { retry } => {
                if retry {
                    self.buffer.pop();
                }
                let raw = self.buffer.take();
                self.fail(DiagnosticKind::InvalidMouseSequence, raw);
                if retry {
                    self.replay.push_front(byte);
                }
            }
        }
    }

    fn finish_mouse(&mut self, result: Result<MouseEvent, MouseError>) {
        let raw = self.buffer.take();
        match result {
            Ok(event) => {
                self.emit(ParsedInputEvent::MouseEvent(event));
                self.resync();
            }
            Err(err) => {
                debug!("mouse report rejected: {err}");
                self.fail(DiagnosticKind::InvalidMouseSequence, raw);
            }
        }
    }

    // OSC / DCS

    fn string(&mut self, byte: u8) {
        match byte {
            BEL => self.finish_string(),
            ESC if !self.has_body() => {
                self.abandon_intro();
                self.begin_escape();
            }
            ESC => {
                self.touch();
                self.state = ParserState::StringTerminator;
            }
            _ => {
                self.accept(byte);
            }
        }
    }

    fn string_terminator(&mut self, byte: u8) {
        self.finish_string();
        if byte != b'\\' {
            // The ESC ended the string and starts whatever comes next
            self.begin_escape();
            self.replay.push_front(byte);
        }
    }

    fn finish_string(&mut self) {
        let start = self.seq_start() + 2;
        let raw = self.buffer.take();
        let payload = raw.get(start..).map(<[u8]>::to_vec).unwrap_or_default();
        self.diagnose(DiagnosticKind::TerminalResponse, payload);
        self.resync();
    }

    /// `ESC [`, `ESC ]` or `ESC P` with nothing after it: Alt+`[` etc
    fn abandon_intro(&mut self) {
        let raw = self.buffer.take();
        let intro = raw.last().copied().unwrap_or(b'[');
        let binding = KeyBinding::new(LogicalKey::Char(char::from(intro)), Modifiers::ALT);
        self.emit_key(binding, raw);
        self.resync();
    }

    // Shared

    fn expire(&mut self) {
        match self.state {
            ParserState::Normal => self.close_text(),
            ParserState::Escape => self.resolve_escape(true),
            ParserState::Csi if self.table_pending() => self.resolve_csi(true),
            ParserState::Csi | ParserState::Osc | ParserState::Dcs if !self.has_body() => {
                let raw = self.buffer.as_slice().to_vec();
                self.abandon_intro();
                self.note(DiagnosticKind::AmbiguousKeyTimeout, raw);
            }
            ParserState::Csi | ParserState::Osc | ParserState::Dcs => {
                debug!("sequence timed out after {} bytes", self.buffer.len());
                let raw = self.buffer.take();
                self.fail(DiagnosticKind::ParseTimeout, raw);
            }
            ParserState::StringTerminator => self.finish_string(),
            ParserState::Error => {
                let raw = self.buffer.take();
                self.fail(DiagnosticKind::InvalidParserState, raw);
            }
        }
    }

    fn seq_start(&self) -> usize {
        usize::from(self.alt_prefix)
    }

    fn has_body(&self) -> bool {
        match self.state {
            ParserState::Csi => self.params.has_body() || self.legacy_mouse.is_some(),
            ParserState::Osc | ParserState::Dcs | ParserState::StringTerminator => {
                self.buffer.len() > self.seq_start() + 2
            }
            _ => false,
        }
    }

    fn touch(&mut self) {
        self.last_byte_at = Some(self.clock.now());
    }

    /// Append to the sequence buffer; on overflow the sequence is given up
    fn accept(&mut self, byte: u8) -> bool {
        self.touch();
        match self.buffer.push(byte) {
            Ok(()) => true,
            Err(overflow) => {
                self.overflow(byte, overflow);
                false
            }
        }
    }

    /// Report the overflow, then replay the buffered bytes as literal text
    fn overflow(&mut self, byte: u8, overflow: Overflow) {
        debug!("{overflow}; flushing as text");
        let raw = self.buffer.take();
        self.fail(DiagnosticKind::SequenceTooLong, raw.clone());
        for &literal in &raw {
            self.decode_text(literal);
        }
        self.replay.push_front(byte);
    }

    fn replay_front(&mut self, bytes: &[u8]) {
        for &byte in bytes.iter().rev() {
            self.replay.push_front(byte);
        }
    }

    /// Report a recovery and fall back to `Normal`
    fn fail(&mut self, kind: DiagnosticKind, detail: Vec<u8>) {
        self.state = ParserState::Error;
        self.diagnose(kind, detail);
        self.resync();
    }

    fn diagnose(&mut self, kind: DiagnosticKind, detail: Vec<u8>) {
        self.stats.record(kind);
        if kind != DiagnosticKind::TerminalResponse {
            debug!("{kind}: {}", format_sequence(&detail));
        }
        self.emit(ParsedInputEvent::diagnostic(kind, detail));
    }

    /// Count always, report only when verbose
    fn note(&mut self, kind: DiagnosticKind, detail: Vec<u8>) {
        if self.config.verbose_diagnostics {
            self.diagnose(kind, detail);
        } else {
            self.stats.record(kind);
        }
    }

    fn emit_key(&mut self, binding: KeyBinding, raw: Vec<u8>) {
        self.emit(ParsedInputEvent::key(binding.key, binding.modifiers, raw));
    }

    fn emit(&mut self, event: ParsedInputEvent) {
        trace!("emit {:?}", event);
        self.stats.events_emitted += 1;
        self.out.push(event);
    }

    /// Drop all sequence state and return to `Normal`
    fn resync(&mut self) {
        self.state = ParserState::Normal;
        self.buffer.clear();
        self.params.clear();
        self.legacy_mouse = None;
        self.best_match = None;
        self.csi_progress = CsiProgress::Open;
        self.alt_prefix = false;
        self.started_at = None;
        self.last_byte_at = None;
    }
}

/// Key for a control byte the table does not name
fn default_control_key(byte: u8) -> KeyBinding {
    match byte {
        0x00 => KeyBinding::new(LogicalKey::Char(' '), Modifiers::CTRL),
        ESC => KeyBinding::plain(LogicalKey::Escape),
        DEL => KeyBinding::plain(LogicalKey::Backspace),
        0x01..=0x1A => KeyBinding::new(LogicalKey::Char(char::from(byte - 1 + b'a')), Modifiers::CTRL),
        _ => KeyBinding::new(LogicalKey::Char(char::from(byte + 0x40)), Modifiers::CTRL),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::event::{MouseButton, MouseEventKind};

    const TICK: Duration = Duration::from_millis(1);

    fn parser_with(table: KeySequenceTable, config: ParserConfig) -> (Parser<ManualClock>, ManualClock) {
        let clock = ManualClock::new();
        let parser = Parser::with_clock(Arc::new(table), config, clock.clone());
        (parser, clock)
    }

    fn xterm() -> (Parser<ManualClock>, ManualClock) {
        parser_with(KeySequenceTable::xterm(), ParserConfig::default())
    }

    fn key(key: LogicalKey, modifiers: Modifiers, raw: &[u8]) -> ParsedInputEvent {
        ParsedInputEvent::key(key, modifiers, raw.to_vec())
    }

    fn diag(kind: DiagnosticKind, detail: &[u8]) -> ParsedInputEvent {
        ParsedInputEvent::diagnostic(kind, detail.to_vec())
    }

    fn expire(parser: &mut Parser<ManualClock>, clock: &ManualClock) -> Vec<ParsedInputEvent> {
        let remaining = parser.time_to_deadline().expect("nothing pending");
        clock.advance(remaining);
        parser.poll_timeout_collect()
    }

    #[test]
    fn test_ascii_text() {
        let (mut parser, _) = xterm();
        let events = parser.parse_collect(b"a");
        assert_eq!(events, vec![ParsedInputEvent::text('a', 1)]);
        assert!(parser.is_idle());
    }

    #[test]
    fn test_csi_up_arrow() {
        let (mut parser, _) = xterm();
        let events = parser.parse_collect(b"\x1b[A");
        assert_eq!(events, vec![key(LogicalKey::Up, Modifiers::empty(), b"\x1b[A")]);
    }

    #[test]
    fn test_two_byte_utf8() {
        let (mut parser, _) = xterm();
        let events = parser.parse_collect(&[0xC3, 0xA9]);
        assert_eq!(
            events,
            vec![ParsedInputEvent::TextCodepoint {
                codepoint: 'é',
                byte_length: 2,
                visual_width: 1
            }]
        );
    }

    #[test]
    fn test_invalid_byte_counted() {
        let (mut parser, _) = xterm();
        let events = parser.parse_collect(&[0xFF]);
        assert_eq!(events, vec![ParsedInputEvent::text(REPLACEMENT_CHAR, 1)]);
        assert_eq!(parser.stats().invalid_utf8, 1);
    }

    #[test]
    fn test_legacy_mouse_press() {
        let (mut parser, _) = xterm();
        let events = parser.parse_collect(&[0x1B, 0x5B, 0x4D, 0x20, 0x21, 0x21]);
        assert_eq!(
            events,
            vec![ParsedInputEvent::MouseEvent(MouseEvent {
                kind: MouseEventKind::Press,
                button: MouseButton::Left,
                x: 0,
                y: 0,
                modifiers: Modifiers::empty(),
            })]
        );
        assert!(parser.is_idle());
    }

    #[test]
    fn test_feed_reports_need_more() {
        let (mut parser, _) = xterm();
        assert_eq!(parser.feed(0x1B), Feed::NeedMore);
        assert_eq!(parser.feed(b'['), Feed::NeedMore);
        assert_eq!(parser.state(), ParserState::Csi);
        assert_eq!(
            parser.feed(b'B'),
            Feed::Emit(vec![key(LogicalKey::Down, Modifiers::empty(), b"\x1b[B")])
        );
        assert_eq!(parser.state(), ParserState::Normal);
    }

    #[test]
    fn test_split_codepoint_across_chunks() {
        let (mut parser, _) = xterm();
        assert!(parser.parse_collect(&[0xF0, 0x9F]).is_empty());
        assert!(parser.parse_collect(&[0x98]).is_empty());
        assert_eq!(
            parser.parse_collect(&[0x80]),
            vec![ParsedInputEvent::text('😀', 4)]
        );
    }

    #[test]
    fn test_control_keys() {
        let (mut parser, _) = xterm();
        let events = parser.parse_collect(b"\r\t\x01\x7f\x00\x1f");
        assert_eq!(
            events,
            vec![
                key(LogicalKey::Enter, Modifiers::empty(), b"\r"),
                key(LogicalKey::Tab, Modifiers::empty(), b"\t"),
                key(LogicalKey::Char('a'), Modifiers::CTRL, b"\x01"),
                key(LogicalKey::Backspace, Modifiers::empty(), b"\x7f"),
                key(LogicalKey::Char(' '), Modifiers::CTRL, b"\x00"),
                key(LogicalKey::Char('_'), Modifiers::CTRL, b"\x1f"),
            ]
        );
    }

    #[test]
    fn test_xterm_modifier_forms() {
        let (mut parser, _) = xterm();
        let events = parser.parse_collect(b"\x1b[1;5A\x1b[3;2~\x1b[1;3P");
        assert_eq!(
            events,
            vec![
                key(LogicalKey::Up, Modifiers::CTRL, b"\x1b[1;5A"),
                key(LogicalKey::Delete, Modifiers::SHIFT, b"\x1b[3;2~"),
                key(LogicalKey::F(1), Modifiers::ALT, b"\x1b[1;3P"),
            ]
        );
    }

    #[test]
    fn test_lone_escape_waits_for_timeout() {
        let (mut parser, clock) = xterm();
        assert_eq!(parser.feed(0x1B), Feed::NeedMore);
        assert_eq!(
            parser.next_deadline(),
            Some(clock.now() + Duration::from_millis(100))
        );

        clock.advance(Duration::from_millis(99));
        assert!(parser.poll_timeout_collect().is_empty());
        assert_eq!(parser.state(), ParserState::Escape);

        clock.advance(TICK);
        assert_eq!(
            parser.poll_timeout_collect(),
            vec![key(LogicalKey::Escape, Modifiers::empty(), b"\x1b")]
        );
        assert!(parser.is_idle());
        assert_eq!(parser.stats().ambiguous_timeouts, 1);
    }

    #[test]
    fn test_ambiguous_entry_resolution() {
        let mut builder = KeySequenceTable::builder();
        builder
            .bind(b"\x1bO", KeyBinding::plain(LogicalKey::F(1)))
            .unwrap()
            .bind(b"\x1bOP", KeyBinding::plain(LogicalKey::F(2)))
            .unwrap();
        let table = builder.build();

        // Silence: commit the shorter match
        let (mut parser, clock) = parser_with(table.clone(), ParserConfig::default());
        assert!(parser.parse_collect(b"\x1bO").is_empty());
        assert_eq!(
            expire(&mut parser, &clock),
            vec![key(LogicalKey::F(1), Modifiers::empty(), b"\x1bO")]
        );

        // More bytes in time: the longer match wins
        let (mut parser, clock) = parser_with(table, ParserConfig::default());
        assert!(parser.parse_collect(b"\x1bO").is_empty());
        clock.advance(Duration::from_millis(50));
        assert_eq!(
            parser.parse_collect(b"P"),
            vec![key(LogicalKey::F(2), Modifiers::empty(), b"\x1bOP")]
        );
    }

    #[test]
    fn test_ambiguous_entry_then_mismatch() {
        let mut builder = KeySequenceTable::builder();
        builder
            .bind(b"\x1bO", KeyBinding::plain(LogicalKey::F(1)))
            .unwrap()
            .bind(b"\x1bOP", KeyBinding::plain(LogicalKey::F(2)))
            .unwrap();
        let (mut parser, _) = parser_with(builder.build(), ParserConfig::default());
        assert_eq!(
            parser.parse_collect(b"\x1bOx"),
            vec![
                key(LogicalKey::F(1), Modifiers::empty(), b"\x1bO"),
                ParsedInputEvent::text('x', 1),
            ]
        );
    }

    #[test]
    fn test_window_restarts_on_each_byte() {
        let (mut parser, clock) = xterm();
        parser.feed(0x1B);
        clock.advance(Duration::from_millis(80));
        parser.feed(b'O');
        assert_eq!(
            parser.next_deadline(),
            Some(clock.now() + Duration::from_millis(100))
        );
    }

    #[test]
    fn test_alt_keys() {
        let (mut parser, _) = xterm();
        let events = parser.parse_collect(b"\x1bx\x1b\r\x1b\x7f");
        assert_eq!(
            events,
            vec![
                key(LogicalKey::Char('x'), Modifiers::ALT, b"\x1bx"),
                key(LogicalKey::Enter, Modifiers::ALT, b"\x1b\r"),
                key(LogicalKey::Backspace, Modifiers::ALT, b"\x1b\x7f"),
            ]
        );
    }

    #[test]
    fn test_escape_o_alone_is_alt_o() {
        let (mut parser, clock) = xterm();
        assert!(parser.parse_collect(b"\x1bO").is_empty());
        assert_eq!(
            expire(&mut parser, &clock),
            vec![key(LogicalKey::Char('O'), Modifiers::ALT, b"\x1bO")]
        );
    }

    #[test]
    fn test_ss3_function_key() {
        let (mut parser, _) = xterm();
        assert_eq!(
            parser.parse_collect(b"\x1bOQ"),
            vec![key(LogicalKey::F(2), Modifiers::empty(), b"\x1bOQ")]
        );
    }

    #[test]
    fn test_double_escape_prefix() {
        let (mut parser, clock) = xterm();
        assert_eq!(
            parser.parse_collect(b"\x1b\x1b[A"),
            vec![key(LogicalKey::Up, Modifiers::ALT, b"\x1b\x1b[A")]
        );

        assert!(parser.parse_collect(b"\x1b\x1b").is_empty());
        assert_eq!(
            expire(&mut parser, &clock),
            vec![key(LogicalKey::Escape, Modifiers::ALT, b"\x1b\x1b")]
        );
    }

    #[test]
    fn test_alt_with_utf8_char() {
        let (mut parser, _) = xterm();
        assert_eq!(
            parser.parse_collect(&[0x1B, 0xC3, 0xA9]),
            vec![key(LogicalKey::Char('é'), Modifiers::ALT, &[0x1B, 0xC3, 0xA9])]
        );
    }

    #[test]
    fn test_empty_csi_times_out_as_alt_bracket() {
        let (mut parser, clock) = xterm();
        assert!(parser.parse_collect(b"\x1b[").is_empty());
        assert_eq!(
            parser.next_deadline(),
            Some(clock.now() + Duration::from_millis(100))
        );
        assert_eq!(
            expire(&mut parser, &clock),
            vec![key(LogicalKey::Char('['), Modifiers::ALT, b"\x1b[")]
        );
    }

    #[test]
    fn test_incomplete_csi_times_out() {
        let (mut parser, clock) = xterm();
        assert!(parser.parse_collect(b"\x1b[1;5").is_empty());
        assert_eq!(
            parser.next_deadline(),
            Some(clock.now() + Duration::from_millis(500))
        );
        assert_eq!(
            expire(&mut parser, &clock),
            vec![diag(DiagnosticKind::ParseTimeout, b"\x1b[1;5")]
        );
        assert_eq!(parser.state(), ParserState::Normal);
        assert_eq!(parser.stats().parse_timeouts, 1);
    }

    #[test]
    fn test_malformed_csi_replays_offending_byte() {
        let (mut parser, _) = xterm();
        assert_eq!(
            parser.parse_collect(b"\x1b[1\rz"),
            vec![
                diag(DiagnosticKind::MalformedSequence, b"\x1b[1"),
                key(LogicalKey::Char('['), Modifiers::ALT, b"\x1b["),
                ParsedInputEvent::text('1', 1),
                key(LogicalKey::Enter, Modifiers::empty(), b"\r"),
                ParsedInputEvent::text('z', 1),
            ]
        );
        assert_eq!(parser.stats().malformed_sequences, 1);
    }

    #[test]
    fn test_escape_inside_csi_starts_over() {
        let (mut parser, _) = xterm();
        assert_eq!(
            parser.parse_collect(b"\x1b[12\x1b[B"),
            vec![
                diag(DiagnosticKind::MalformedSequence, b"\x1b[12"),
                key(LogicalKey::Char('['), Modifiers::ALT, b"\x1b["),
                ParsedInputEvent::text('1', 1),
                ParsedInputEvent::text('2', 1),
                key(LogicalKey::Down, Modifiers::empty(), b"\x1b[B"),
            ]
        );
    }

    #[test]
    fn test_misplaced_marker() {
        let (mut parser, _) = xterm();
        assert_eq!(
            parser.parse_collect(b"\x1b[1?hx"),
            vec![
                diag(DiagnosticKind::MalformedSequence, b"\x1b[1?"),
                key(LogicalKey::Char('['), Modifiers::ALT, b"\x1b["),
                ParsedInputEvent::text('1', 1),
                ParsedInputEvent::text('?', 1),
                ParsedInputEvent::text('h', 1),
                ParsedInputEvent::text('x', 1),
            ]
        );
        assert!(parser.is_idle());
    }

    #[test]
    fn test_malformed_csi_keeps_alt_prefix_bytes() {
        let (mut parser, _) = xterm();
        assert_eq!(
            parser.parse_collect(b"\x1b\x1b[5<a"),
            vec![
                diag(DiagnosticKind::MalformedSequence, b"\x1b\x1b[5<"),
                key(LogicalKey::Char('['), Modifiers::ALT, b"\x1b\x1b["),
                ParsedInputEvent::text('5', 1),
                ParsedInputEvent::text('<', 1),
                ParsedInputEvent::text('a', 1),
            ]
        );
        let stats = parser.stats();
        assert_eq!(stats.malformed_sequences, 1);
        assert_eq!(stats.events_emitted, 5);
    }

    #[test]
    fn test_table_entries_outside_csi_grammar() {
        let (mut parser, _) = xterm();
        assert_eq!(
            parser.parse_collect(b"\x1b[[A\x1b[[E\x1b[2$\x1b[8^"),
            vec![
                key(LogicalKey::F(1), Modifiers::empty(), b"\x1b[[A"),
                key(LogicalKey::F(5), Modifiers::empty(), b"\x1b[[E"),
                key(LogicalKey::Insert, Modifiers::SHIFT, b"\x1b[2$"),
                key(LogicalKey::End, Modifiers::CTRL, b"\x1b[8^"),
            ]
        );
        assert!(parser.is_idle());
        assert_eq!(
            parser.parse_collect(b"\x1b\x1b[[B"),
            vec![key(LogicalKey::F(2), Modifiers::ALT, b"\x1b\x1b[[B")]
        );
    }

    #[test]
    fn test_table_prefix_falls_back_to_csi() {
        let (mut parser, clock) = xterm();
        // `ESC [ [` is a complete CSI but also starts the Linux F-keys
        assert!(parser.parse_collect(b"\x1b[[").is_empty());
        assert_eq!(
            parser.next_deadline(),
            Some(clock.now() + Duration::from_millis(100))
        );
        assert_eq!(
            parser.parse_collect(b"x"),
            vec![
                diag(DiagnosticKind::UnrecognizedSequence, b"\x1b[["),
                ParsedInputEvent::text('x', 1),
            ]
        );

        assert!(parser.parse_collect(b"\x1b[[").is_empty());
        assert_eq!(
            expire(&mut parser, &clock),
            vec![diag(DiagnosticKind::UnrecognizedSequence, b"\x1b[[")]
        );
        assert!(parser.is_idle());
    }

    #[test]
    fn test_ambiguous_csi_entry() {
        let mut builder = KeySequenceTable::builder();
        builder
            .bind(b"\x1b[2$", KeyBinding::new(LogicalKey::Insert, Modifiers::SHIFT))
            .unwrap()
            .bind(b"\x1b[2$x", KeyBinding::plain(LogicalKey::F(13)))
            .unwrap();
        let (mut parser, clock) = parser_with(builder.build(), ParserConfig::default());

        assert!(parser.parse_collect(b"\x1b[2$").is_empty());
        assert_eq!(
            parser.next_deadline(),
            Some(clock.now() + Duration::from_millis(100))
        );
        assert_eq!(
            expire(&mut parser, &clock),
            vec![key(LogicalKey::Insert, Modifiers::SHIFT, b"\x1b[2$")]
        );
        assert_eq!(parser.stats().ambiguous_timeouts, 1);

        assert_eq!(
            parser.parse_collect(b"\x1b[2$x\x1b[2$1"),
            vec![
                key(LogicalKey::F(13), Modifiers::empty(), b"\x1b[2$x"),
                key(LogicalKey::Insert, Modifiers::SHIFT, b"\x1b[2$"),
                ParsedInputEvent::text('1', 1),
            ]
        );

        // A complete CSI sequence is still dispatched whole
        assert_eq!(
            parser.parse_collect(b"\x1b[2$q"),
            vec![diag(DiagnosticKind::UnrecognizedSequence, b"\x1b[2$q")]
        );
    }

    #[test]
    fn test_broken_csi_interrupted_while_table_matches() {
        let (mut parser, _) = xterm();
        // `ESC [ [` completes the grammar; the `\r` settles it as a CSI
        assert_eq!(
            parser.parse_collect(b"\x1b[[\r"),
            vec![
                diag(DiagnosticKind::UnrecognizedSequence, b"\x1b[["),
                key(LogicalKey::Enter, Modifiers::empty(), b"\r"),
            ]
        );
        assert!(parser.is_idle());
    }

    #[test]
    fn test_unrecognized_sequence() {
        let (mut parser, _) = xterm();
        assert_eq!(
            parser.parse_collect(b"\x1b[?1;2c"),
            vec![diag(DiagnosticKind::UnrecognizedSequence, b"\x1b[?1;2c")]
        );
        assert_eq!(parser.stats().unrecognized, 1);
    }

    #[test]
    fn test_osc_reply() {
        let (mut parser, _) = xterm();
        assert_eq!(
            parser.parse_collect(b"\x1b]11;rgb:0000/0000/0000\x07"),
            vec![diag(DiagnosticKind::TerminalResponse, b"11;rgb:0000/0000/0000")]
        );
        assert_eq!(
            parser.parse_collect(b"\x1bP1$r0m\x1b\\a"),
            vec![
                diag(DiagnosticKind::TerminalResponse, b"1$r0m"),
                ParsedInputEvent::text('a', 1),
            ]
        );
    }

    #[test]
    fn test_string_ended_by_other_escape() {
        let (mut parser, _) = xterm();
        assert_eq!(
            parser.parse_collect(b"\x1b]0;x\x1b[A"),
            vec![
                diag(DiagnosticKind::TerminalResponse, b"0;x"),
                key(LogicalKey::Up, Modifiers::empty(), b"\x1b[A"),
            ]
        );
    }

    #[test]
    fn test_sequence_too_long_flushes_text() {
        let config = ParserConfig {
            max_sequence_len: 8,
            ..Default::default()
        };
        let (mut parser, _) = parser_with(KeySequenceTable::xterm(), config);
        let events = parser.parse_collect(b"\x1b]abcdef7");
        let mut expected = vec![diag(DiagnosticKind::SequenceTooLong, b"\x1b]abcdef")];
        expected.extend("\u{1b}]abcdef7".chars().map(|c| ParsedInputEvent::text(c, 1)));
        assert_eq!(events, expected);
        assert!(parser.is_idle());
        assert_eq!(parser.stats().sequences_too_long, 1);
    }

    #[test]
    fn test_sgr_mouse() {
        let (mut parser, _) = xterm();
        let events = parser.parse_collect(b"\x1b[<0;10;20M\x1b[<0;10;20m");
        let kinds: Vec<_> = events
            .iter()
            .map(|e| match e {
                ParsedInputEvent::MouseEvent(m) => (m.kind, m.x, m.y),
                other => panic!("unexpected {other:?}"),
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                (MouseEventKind::Press, 9, 19),
                (MouseEventKind::Release, 9, 19)
            ]
        );
    }

    #[test]
    fn test_invalid_mouse_reports() {
        let (mut parser, _) = xterm();
        assert_eq!(
            parser.parse_collect(b"\x1b[<0;10M"),
            vec![diag(DiagnosticKind::InvalidMouseSequence, b"\x1b[<0;10M")]
        );
        assert_eq!(
            parser.parse_collect(b"\x1b[M \rq"),
            vec![
                diag(DiagnosticKind::InvalidMouseSequence, b"\x1b[M "),
                key(LogicalKey::Enter, Modifiers::empty(), b"\r"),
                ParsedInputEvent::text('q', 1),
            ]
        );
        assert_eq!(parser.stats().invalid_mouse, 2);
    }

    #[test]
    fn test_sgr_and_legacy_reports_in_every_mode() {
        let (mut parser, _) = xterm();
        for mode in [
            MouseTrackingMode::None,
            MouseTrackingMode::X10,
            MouseTrackingMode::Sgr,
            MouseTrackingMode::Urxvt,
        ] {
            parser.set_mouse_mode(mode);
            let events = parser.parse_collect(b"\x1b[<2;3;4M\x1b[M\x20\x23\x24");
            assert!(
                matches!(
                    events.as_slice(),
                    [
                        ParsedInputEvent::MouseEvent(MouseEvent { button: MouseButton::Right, x: 2, y: 3, .. }),
                        ParsedInputEvent::MouseEvent(MouseEvent { button: MouseButton::Left, x: 2, y: 3, .. }),
                    ]
                ),
                "{mode}: {events:?}"
            );
        }
    }

    #[test]
    fn test_urxvt_mouse_needs_mode() {
        let (mut parser, _) = xterm();
        assert_eq!(
            parser.parse_collect(b"\x1b[32;5;7M"),
            vec![diag(DiagnosticKind::UnrecognizedSequence, b"\x1b[32;5;7M")]
        );

        parser.set_mouse_mode(MouseTrackingMode::Urxvt);
        let events = parser.parse_collect(b"\x1b[32;5;7M");
        assert!(matches!(
            events.as_slice(),
            [ParsedInputEvent::MouseEvent(MouseEvent { button: MouseButton::Left, x: 4, y: 6, .. })]
        ));
    }

    #[test]
    fn test_utf8_extended_mouse() {
        let config = ParserConfig {
            mouse_mode: MouseTrackingMode::Utf8Extended,
            ..Default::default()
        };
        let (mut parser, _) = parser_with(KeySequenceTable::xterm(), config);
        let events = parser.parse_collect(&[0x1B, b'[', b'M', 0x20, 0xC5, 0x8D, 0x22]);
        assert!(matches!(
            events.as_slice(),
            [ParsedInputEvent::MouseEvent(MouseEvent { x: 300, y: 1, .. })]
        ));
    }

    #[test]
    fn test_incomplete_utf8_closed_by_escape() {
        let (mut parser, _) = xterm();
        assert_eq!(
            parser.parse_collect(&[0xE4, 0xB8, 0x1B, b'[', b'C']),
            vec![
                ParsedInputEvent::text(REPLACEMENT_CHAR, 2),
                key(LogicalKey::Right, Modifiers::empty(), b"\x1b[C"),
            ]
        );
    }

    #[test]
    fn test_incomplete_utf8_times_out() {
        let (mut parser, clock) = xterm();
        assert!(parser.parse_collect(&[0xE4]).is_empty());
        assert_eq!(
            parser.next_deadline(),
            Some(clock.now() + Duration::from_millis(500))
        );
        assert_eq!(
            expire(&mut parser, &clock),
            vec![ParsedInputEvent::text(REPLACEMENT_CHAR, 1)]
        );
    }

    #[test]
    fn test_verbose_diagnostics() {
        let config = ParserConfig {
            verbose_diagnostics: true,
            ..Default::default()
        };
        let (mut parser, clock) = parser_with(KeySequenceTable::xterm(), config);
        assert_eq!(
            parser.parse_collect(&[0xC3, b'a']),
            vec![
                ParsedInputEvent::text(REPLACEMENT_CHAR, 1),
                diag(DiagnosticKind::InvalidUtf8, &[0xC3]),
                ParsedInputEvent::text('a', 1),
            ]
        );

        parser.feed(0x1B);
        assert_eq!(
            expire(&mut parser, &clock),
            vec![
                key(LogicalKey::Escape, Modifiers::empty(), b"\x1b"),
                diag(DiagnosticKind::AmbiguousKeyTimeout, b"\x1b"),
            ]
        );
    }

    #[test]
    fn test_paste_markers() {
        let (mut parser, _) = xterm();
        let events = parser.parse_collect(b"\x1b[200~hi\x1b[201~");
        assert_eq!(
            events,
            vec![
                key(LogicalKey::PasteStart, Modifiers::empty(), b"\x1b[200~"),
                ParsedInputEvent::text('h', 1),
                ParsedInputEvent::text('i', 1),
                key(LogicalKey::PasteEnd, Modifiers::empty(), b"\x1b[201~"),
            ]
        );
    }

    #[test]
    fn test_flush_commits_pending() {
        let (mut parser, _) = xterm();
        assert!(parser.parse_collect(b"\x1bO").is_empty());
        assert_eq!(
            parser.flush_collect(),
            vec![key(LogicalKey::Char('O'), Modifiers::ALT, b"\x1bO")]
        );
        assert!(parser.is_idle());

        assert!(parser.parse_collect(&[0x1B, 0xC3]).is_empty());
        assert_eq!(
            parser.flush_collect(),
            vec![
                key(LogicalKey::Escape, Modifiers::empty(), b"\x1b"),
                ParsedInputEvent::text(REPLACEMENT_CHAR, 1),
            ]
        );
    }

    #[test]
    fn test_cancel_is_silent() {
        let (mut parser, _) = xterm();
        assert!(parser.parse_collect(b"\x1b[1;").is_empty());
        parser.cancel();
        assert!(parser.is_idle());
        assert!(parser.flush_collect().is_empty());
        assert_eq!(parser.next_deadline(), None);
        assert_eq!(
            parser.parse_collect(b"a"),
            vec![ParsedInputEvent::text('a', 1)]
        );
    }

    #[test]
    fn test_stats() {
        let (mut parser, _) = xterm();
        parser.parse_collect(b"ab\x1b[A\xff");
        let stats = parser.stats();
        assert_eq!(stats.bytes_processed, 6);
        assert_eq!(stats.events_emitted, 4);
        assert_eq!(stats.invalid_utf8, 1);

        parser.reset();
        assert_eq!(parser.stats(), &ParserStats::default());
    }

    #[test]
    fn test_no_deadline_when_idle() {
        let (mut parser, _) = xterm();
        parser.parse_collect(b"hello");
        assert_eq!(parser.next_deadline(), None);
        assert!(parser.poll_timeout_collect().is_empty());
    }
}
