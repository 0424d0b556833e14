//! Error types for the input reader

use std::io;
use thiserror::Error;

/// Input reader error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Nix error
    #[error("System error: {0}")]
    Nix(#[from] nix::Error),

    /// The descriptor is not a terminal
    #[error("Not a terminal")]
    NotATerminal,

    /// The consumer dropped its end of the event queue
    #[error("Event queue closed")]
    QueueClosed,

    /// The reader thread could not be started
    #[error("Failed to spawn reader thread: {0}")]
    SpawnFailed(String),

    /// The reader thread panicked
    #[error("Reader thread panicked")]
    ReaderPanicked,
}

/// Result type for reader operations
pub type Result<T> = std::result::Result<T, Error>;
