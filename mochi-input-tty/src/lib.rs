//! Mochi Input TTY - terminal plumbing for the input parser
//!
//! This crate connects a [`mochi_input_parser::Parser`] to a real
//! terminal and hands parsed events to the rest of the program.
//!
//! Key features:
//! - Raw mode with restore-on-drop
//! - Byte sources that wait with a timeout (poll(2))
//! - A reader thread that drives parser timeouts from its waits
//! - A bounded, ordered event queue with backpressure
//!
//! Reference: https://www.man7.org/linux/man-pages/man3/termios.3.html

mod error;
mod queue;
mod raw;
mod reader;
mod source;

pub use error::{Error, Result};
pub use queue::{event_queue, EventReceiver, EventSender};
pub use raw::RawMode;
pub use reader::{
    ExitReason, InputReader, ReaderConfig, ReaderExit, ReaderHandle, ShutdownSignal,
    DEFAULT_READ_BUFFER, DEFAULT_SHUTDOWN_POLL_INTERVAL,
};
pub use source::{ByteSource, FdSource, ReadOutcome};
