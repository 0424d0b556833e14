//! Parser configuration
//!
//! Values normally come from the terminal-capability layer or a config
//! file; durations are written in milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};
use crate::mouse::MouseTrackingMode;

/// Default wait before an ambiguous key (lone ESC, `ESC O`) is committed
pub const DEFAULT_AMBIGUOUS_KEY_TIMEOUT: Duration = Duration::from_millis(100);
/// Default budget for an incomplete CSI/OSC/DCS sequence
pub const DEFAULT_SEQUENCE_TIMEOUT: Duration = Duration::from_millis(500);
/// Default capacity of the sequence buffer
pub const DEFAULT_MAX_SEQUENCE_LEN: usize = 256;

/// Smallest sequence buffer the parser will run with
pub const MIN_SEQUENCE_LEN: usize = 8;
const MAX_SEQUENCE_LEN: usize = 65536;
const MAX_TIMEOUT: Duration = Duration::from_secs(10);

/// Parser configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParserConfig {
    /// How long an ambiguous match waits for more bytes
    #[serde(rename = "ambiguous_key_timeout_ms", with = "millis")]
    pub ambiguous_key_timeout: Duration,
    /// How long any other sequence may stay incomplete
    #[serde(rename = "sequence_timeout_ms", with = "millis")]
    pub sequence_timeout: Duration,
    /// Capacity of the sequence buffer
    pub max_sequence_len: usize,
    /// Active mouse protocol
    pub mouse_mode: MouseTrackingMode,
    /// Also emit `InvalidUtf8` and `AmbiguousKeyTimeout` diagnostics
    pub verbose_diagnostics: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            ambiguous_key_timeout: DEFAULT_AMBIGUOUS_KEY_TIMEOUT,
            sequence_timeout: DEFAULT_SEQUENCE_TIMEOUT,
            max_sequence_len: DEFAULT_MAX_SEQUENCE_LEN,
            mouse_mode: MouseTrackingMode::default(),
            verbose_diagnostics: false,
        }
    }
}

impl ParserConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.ambiguous_key_timeout.is_zero() {
            return Err(ConfigError::Timeout {
                field: "ambiguous_key_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.sequence_timeout < self.ambiguous_key_timeout {
            return Err(ConfigError::Timeout {
                field: "sequence_timeout",
                reason: format!(
                    "must be at least the ambiguous key timeout ({} ms)",
                    self.ambiguous_key_timeout.as_millis()
                ),
            });
        }
        if self.sequence_timeout > MAX_TIMEOUT {
            return Err(ConfigError::Timeout {
                field: "sequence_timeout",
                reason: format!("must be at most {} ms", MAX_TIMEOUT.as_millis()),
            });
        }
        if !(MIN_SEQUENCE_LEN..=MAX_SEQUENCE_LEN).contains(&self.max_sequence_len) {
            return Err(ConfigError::SequenceLength {
                value: self.max_sequence_len,
                min: MIN_SEQUENCE_LEN,
                max: MAX_SEQUENCE_LEN,
            });
        }
        Ok(())
    }
}

/// Serialize a `Duration` as whole milliseconds
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let ms = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(ms)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
