//! Error types for parser configuration
//!
//! Problems in the input stream itself are never errors; they surface as
//! diagnostic events. These cover configuration handed to the parser.

use thiserror::Error;

/// Configuration error
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A timeout is out of range
    #[error("Invalid {field}: {reason}")]
    Timeout { field: &'static str, reason: String },

    /// Maximum sequence length is out of range
    #[error("max_sequence_len must be between {min} and {max}, got {value}")]
    SequenceLength { value: usize, min: usize, max: usize },

    /// A key table entry has an unusable byte sequence
    #[error("Invalid key sequence {sequence:?}: {reason}")]
    KeySequence { sequence: String, reason: String },

    /// A key specification could not be parsed
    #[error("Invalid key spec '{0}'")]
    KeySpec(String),
}

/// Result type for configuration
pub type Result<T> = std::result::Result<T, ConfigError>;
