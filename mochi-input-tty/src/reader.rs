//! The input reader thread
//!
//! Owns a byte source and a parser, and forwards every event to the
//! consumer through the bounded queue. Waiting for input doubles as the
//! parser's timer: each wait is capped by the parser's next deadline so
//! a lone ESC resolves on time even when no more bytes arrive.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, info, warn};
use mochi_input_parser::{Clock, ParsedInputEvent, Parser, ParserStats, SystemClock};

use crate::error::{Error, Result};
use crate::queue::EventSender;
use crate::source::{ByteSource, ReadOutcome};

/// Default size of the read buffer
pub const DEFAULT_READ_BUFFER: usize = 4096;

/// Default interval at which a blocked reader checks for shutdown
pub const DEFAULT_SHUTDOWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Reader thread settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderConfig {
    /// Bytes requested per read
    pub read_buffer: usize,
    /// Longest a single wait may block before shutdown is checked
    pub shutdown_poll_interval: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            read_buffer: DEFAULT_READ_BUFFER,
            shutdown_poll_interval: DEFAULT_SHUTDOWN_POLL_INTERVAL,
        }
    }
}

/// Cooperative stop request shared with a reader
#[derive(Debug, Clone, Default)]
pub struct ShutdownSignal(Arc<AtomicBool>);

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why the reader stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The source reached end of input; pending input was flushed
    Eof,
    /// Shutdown was requested; pending input was discarded
    Shutdown,
    /// The consumer dropped the receiver
    ConsumerGone,
}

/// What a finished reader hands back
#[derive(Debug)]
pub struct ReaderExit<S> {
    pub source: S,
    pub stats: ParserStats,
    pub reason: ExitReason,
}

/// Drives a parser from a byte source
pub struct InputReader<S, C: Clock = SystemClock> {
    source: S,
    parser: Parser<C>,
    sender: EventSender,
    config: ReaderConfig,
    shutdown: ShutdownSignal,
}

impl<S: ByteSource, C: Clock> InputReader<S, C> {
    pub fn new(source: S, parser: Parser<C>, sender: EventSender, config: ReaderConfig) -> Self {
        Self {
            source,
            parser,
            sender,
            config,
            shutdown: ShutdownSignal::new(),
        }
    }

    /// Handle that stops this reader
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Read and parse until end of input, shutdown, or a closed queue
    pub fn run(mut self) -> Result<ReaderExit<S>> {
        let mut buf = vec![0u8; self.config.read_buffer.max(1)];
        let mut pending = Vec::new();

        let reason = loop {
            if self.shutdown.is_triggered() {
                self.parser.cancel();
                break ExitReason::Shutdown;
            }

            let interval = self.config.shutdown_poll_interval;
            let wait = self
                .parser
                .time_to_deadline()
                .map_or(interval, |left| left.min(interval));

            let outcome = match self.source.read_timeout(&mut buf, Some(wait)) {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!("Input read failed: {}", e);
                    return Err(e);
                }
            };

            let eof = match outcome {
                ReadOutcome::Data(n) => {
                    self.parser.parse(&buf[..n], |event| pending.push(event));
                    false
                }
                ReadOutcome::TimedOut => {
                    self.parser.poll_timeout(|event| pending.push(event));
                    false
                }
                ReadOutcome::Eof => {
                    self.parser.flush(|event| pending.push(event));
                    true
                }
            };

            if !self.forward(&mut pending) {
                break ExitReason::ConsumerGone;
            }
            if eof {
                break ExitReason::Eof;
            }
        };

        let stats = *self.parser.stats();
        info!(
            "Input reader stopped ({:?}): {} bytes, {} events, {} errors",
            reason,
            stats.bytes_processed,
            stats.events_emitted,
            stats.errors()
        );
        Ok(ReaderExit {
            source: self.source,
            stats,
            reason,
        })
    }

    /// Send pending events in order; false once the consumer is gone
    fn forward(&mut self, pending: &mut Vec<ParsedInputEvent>) -> bool {
        for event in pending.drain(..) {
            if self.sender.send(event).is_err() {
                debug!("Event queue closed; stopping reader");
                return false;
            }
        }
        true
    }
}

impl<S, C> InputReader<S, C>
where
    S: ByteSource + 'static,
    C: Clock + Send + 'static,
{
    /// Run the reader on its own thread
    pub fn spawn(self) -> Result<ReaderHandle<S>> {
        let shutdown = self.shutdown_signal();
        let handle = thread::Builder::new()
            .name("mochi-input-reader".to_string())
            .spawn(move || self.run())
            .map_err(|e| Error::SpawnFailed(e.to_string()))?;
        Ok(ReaderHandle { handle, shutdown })
    }
}

/// A reader running on a background thread
pub struct ReaderHandle<S> {
    handle: JoinHandle<Result<ReaderExit<S>>>,
    shutdown: ShutdownSignal,
}

impl<S> ReaderHandle<S> {
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Ask the reader to stop and wait for it
    pub fn shutdown(self) -> Result<ReaderExit<S>> {
        self.shutdown.trigger();
        self.join()
    }

    /// Wait for the reader to stop on its own
    pub fn join(self) -> Result<ReaderExit<S>> {
        self.handle.join().map_err(|_| Error::ReaderPanicked)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::event_queue;
    use mochi_input_parser::{
        KeySequenceTable, LogicalKey, ManualClock, Modifiers, ParserConfig,
    };
    use std::collections::VecDeque;

    enum Step {
        Data(&'static [u8]),
        /// Let the requested wait elapse with no input
        Idle,
        /// Trigger shutdown, then time out
        Stop(ShutdownSignal),
    }

    struct Scripted {
        steps: VecDeque<Step>,
        clock: ManualClock,
        waits: Vec<Option<Duration>>,
    }

    impl ByteSource for Scripted {
        fn read_timeout(
            &mut self,
            buf: &mut [u8],
            timeout: Option<Duration>,
        ) -> Result<ReadOutcome> {
            self.waits.push(timeout);
            match self.steps.pop_front() {
                Some(Step::Data(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(bytes);
                    Ok(ReadOutcome::Data(bytes.len()))
                }
                Some(Step::Idle) => {
                    self.clock.advance(timeout.unwrap_or(Duration::from_secs(1)));
                    Ok(ReadOutcome::TimedOut)
                }
                Some(Step::Stop(signal)) => {
                    signal.trigger();
                    Ok(ReadOutcome::TimedOut)
                }
                None => Ok(ReadOutcome::Eof),
            }
        }
    }

    fn reader(
        steps: Vec<Step>,
    ) -> (InputReader<Scripted, ManualClock>, crate::queue::EventReceiver) {
        let clock = ManualClock::new();
        let parser = Parser::with_clock(
            Arc::new(KeySequenceTable::xterm()),
            ParserConfig::default(),
            clock.clone(),
        );
        let source = Scripted {
            steps: steps.into(),
            clock,
            waits: Vec::new(),
        };
        let (tx, rx) = event_queue(64);
        (InputReader::new(source, parser, tx, ReaderConfig::default()), rx)
    }

    fn key(logical_key: LogicalKey, modifiers: Modifiers, raw: &[u8]) -> ParsedInputEvent {
        ParsedInputEvent::key(logical_key, modifiers, raw)
    }

    #[test]
    fn test_idle_wait_resolves_lone_escape() {
        let (reader, rx) = reader(vec![
            Step::Data(b"\x1b"),
            Step::Idle,
            Step::Idle,
            Step::Data(b"a"),
        ]);
        let exit = reader.run().unwrap();
        assert_eq!(exit.reason, ExitReason::Eof);
        assert_eq!(
            rx.iter().collect::<Vec<_>>(),
            vec![
                key(LogicalKey::Escape, Modifiers::empty(), b"\x1b"),
                ParsedInputEvent::text('a', 1),
            ]
        );
        // Waits are capped by the shutdown interval, then by the deadline
        assert_eq!(exit.source.waits[0], Some(DEFAULT_SHUTDOWN_POLL_INTERVAL));
        assert_eq!(exit.source.waits[1], Some(Duration::from_millis(50)));
        assert_eq!(exit.source.waits[2], Some(Duration::from_millis(50)));
    }

    #[test]
    fn test_byte_before_deadline_extends_escape() {
        let (reader, rx) = reader(vec![Step::Data(b"\x1b"), Step::Idle, Step::Data(b"a")]);
        reader.run().unwrap();
        assert_eq!(
            rx.iter().collect::<Vec<_>>(),
            vec![key(LogicalKey::Char('a'), Modifiers::ALT, b"\x1ba")]
        );
    }

    #[test]
    fn test_eof_flushes_pending_input() {
        let (reader, rx) = reader(vec![Step::Data(b"x\x1b")]);
        let exit = reader.run().unwrap();
        assert_eq!(exit.reason, ExitReason::Eof);
        assert_eq!(
            rx.iter().collect::<Vec<_>>(),
            vec![
                ParsedInputEvent::text('x', 1),
                key(LogicalKey::Escape, Modifiers::empty(), b"\x1b"),
            ]
        );
    }

    #[test]
    fn test_shutdown_discards_partial_sequence() {
        let signal = ShutdownSignal::new();
        let (mut reader, rx) = reader(vec![]);
        reader.shutdown = signal.clone();
        reader.source.steps = vec![
            Step::Data(b"q"),
            Step::Data(b"\x1b[1"),
            Step::Stop(signal),
            Step::Data(b"~"),
        ]
        .into();

        let exit = reader.run().unwrap();
        assert_eq!(exit.reason, ExitReason::Shutdown);
        assert_eq!(rx.iter().collect::<Vec<_>>(), vec![ParsedInputEvent::text('q', 1)]);
        assert_eq!(exit.source.steps.len(), 1);
    }

    #[test]
    fn test_consumer_gone() {
        let (reader, rx) = reader(vec![Step::Data(b"abc"), Step::Data(b"def")]);
        drop(rx);
        let exit = reader.run().unwrap();
        assert_eq!(exit.reason, ExitReason::ConsumerGone);
        assert_eq!(exit.source.steps.len(), 1);
    }

    #[test]
    fn test_spawned_reader_joins() {
        let (reader, rx) = reader(vec![Step::Data(b"\x1b[A")]);
        let handle = reader.spawn().unwrap();
        assert_eq!(
            rx.recv(),
            Some(key(LogicalKey::Up, Modifiers::empty(), b"\x1b[A"))
        );
        let exit = handle.join().unwrap();
        assert_eq!(exit.reason, ExitReason::Eof);
        assert_eq!(exit.stats.bytes_processed, 3);
    }

    #[test]
    fn test_shutdown_signal_is_shared() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();
        assert!(!other.is_triggered());
        signal.trigger();
        assert!(other.is_triggered());
    }
}
