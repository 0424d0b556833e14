//! Parser counters

use serde::Serialize;

use crate::event::DiagnosticKind;

/// Counters kept by a parser instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParserStats {
    /// Input bytes accepted (replayed bytes are not counted twice)
    pub bytes_processed: u64,
    /// Events handed to the consumer, diagnostics included
    pub events_emitted: u64,
    /// Replacement characters produced
    pub invalid_utf8: u64,
    pub malformed_sequences: u64,
    pub sequences_too_long: u64,
    pub parse_timeouts: u64,
    /// Ambiguous keys committed by timeout
    pub ambiguous_timeouts: u64,
    pub invalid_mouse: u64,
    pub unrecognized: u64,
    pub invalid_state: u64,
}

impl ParserStats {
    /// Count a diagnostic of the given kind
    pub fn record(&mut self, kind: DiagnosticKind) {
        match kind {
            DiagnosticKind::MalformedSequence => self.malformed_sequences += 1,
            DiagnosticKind::InvalidUtf8 => self.invalid_utf8 += 1,
            DiagnosticKind::SequenceTooLong => self.sequences_too_long += 1,
            DiagnosticKind::AmbiguousKeyTimeout => self.ambiguous_timeouts += 1,
            DiagnosticKind::ParseTimeout => self.parse_timeouts += 1,
            DiagnosticKind::InvalidMouseSequence => self.invalid_mouse += 1,
            DiagnosticKind::InvalidParserState => self.invalid_state += 1,
            DiagnosticKind::UnrecognizedSequence => self.unrecognized += 1,
            DiagnosticKind::TerminalResponse => {}
        }
    }

    /// Total recoveries of any kind
    pub fn errors(&self) -> u64 {
        self.invalid_utf8
            + self.malformed_sequences
            + self.sequences_too_long
            + self.parse_timeouts
            + self.invalid_mouse
            + self.invalid_state
    }
}
