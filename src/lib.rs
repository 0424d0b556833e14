//! Mochi Input - terminal input parsing engine
//!
//! Turns the raw byte stream of a terminal into text, key and mouse events.
//! This crate ties the pieces together:
//!
//! - [`parser`]: the streaming decoder (`mochi-input-parser`)
//! - [`tty`]: raw mode, byte sources and the reader thread (`mochi-input-tty`)
//! - [`config`]: layered configuration (file, environment, CLI)
//!
//! ```no_run
//! use std::sync::Arc;
//! use mochi_input::config::InputConfig;
//! use mochi_input::parser::Parser;
//! use mochi_input::tty::{event_queue, FdSource, InputReader};
//!
//! let config = InputConfig::default();
//! let parser = Parser::new(Arc::new(config.build_table()?), config.parser.clone());
//! let (tx, rx) = event_queue(config.reader.queue_capacity);
//! let stdin = std::fs::File::open("/dev/tty")?;
//! let reader = InputReader::new(FdSource::new(stdin), parser, tx, config.reader.reader_config());
//! let handle = reader.spawn()?;
//! if let Some(event) = rx.recv() {
//!     println!("{event:?}");
//! }
//! handle.shutdown()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;

pub use mochi_input_parser as parser;
pub use mochi_input_tty as tty;

pub use config::{CliArgs, ConfigError, InputConfig, ReaderSettings};
pub use mochi_input_parser::{
    DiagnosticKind, KeySequenceTable, LogicalKey, Modifiers, MouseEvent, MouseTrackingMode,
    ParsedInputEvent, Parser, ParserConfig, ParserStats,
};
pub use mochi_input_tty::{event_queue, EventReceiver, InputReader, ReaderHandle, ShutdownSignal};
