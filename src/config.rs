//! Configuration for the Mochi input engine
//!
//! Settings are layered with the precedence CLI > environment > config
//! file > defaults. The file lives at `$XDG_CONFIG_HOME/mochi/input.toml`:
//!
//! ```toml
//! [parser]
//! ambiguous_key_timeout_ms = 50
//! mouse_mode = "sgr"
//!
//! [reader]
//! queue_capacity = 512
//!
//! [keys]
//! '\e[1;5A' = "ctrl-up"
//! '\eOM' = "none"
//! ```

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use log::warn;
use mochi_input_parser::keys::parse_sequence;
use mochi_input_parser::{KeySequenceTable, MouseTrackingMode, ParserConfig};
use mochi_input_tty::{ReaderConfig, DEFAULT_READ_BUFFER, DEFAULT_SHUTDOWN_POLL_INTERVAL};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable overriding the ambiguous key timeout (ms)
pub const ENV_ESC_TIMEOUT: &str = "MOCHI_ESC_TIMEOUT_MS";
/// Environment variable overriding the sequence timeout (ms)
pub const ENV_SEQUENCE_TIMEOUT: &str = "MOCHI_SEQUENCE_TIMEOUT_MS";
/// Environment variable selecting the mouse protocol
pub const ENV_MOUSE_MODE: &str = "MOCHI_MOUSE_MODE";

/// Default number of undelivered events the queue holds
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Key spec that removes a built-in entry
const UNBIND: &str = "none";

/// CLI arguments for mochi-keys
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "mochi-keys")]
#[command(author = "Mochi Team")]
#[command(version)]
#[command(about = "Print the input events decoded from this terminal", long_about = None)]
pub struct CliArgs {
    /// Path to custom config file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Wait before a lone ESC is committed, in milliseconds
    #[arg(long, value_name = "MS")]
    pub esc_timeout: Option<u64>,

    /// Budget for an incomplete escape sequence, in milliseconds
    #[arg(long, value_name = "MS")]
    pub sequence_timeout: Option<u64>,

    /// Longest escape sequence accepted
    #[arg(long, value_name = "BYTES")]
    pub max_sequence_len: Option<usize>,

    /// Mouse protocol (none, x10, utf8, sgr, urxvt)
    #[arg(short, long, value_name = "MODE")]
    pub mouse: Option<MouseTrackingMode>,

    /// Also report invalid UTF-8 and ambiguous-key timeouts
    #[arg(long)]
    pub verbose_diagnostics: bool,

    /// Print events as JSON lines
    #[arg(long)]
    pub json: bool,

    /// Exit after this many events
    #[arg(short = 'n', long, value_name = "N")]
    pub count: Option<u64>,

    /// Print the effective configuration and exit
    #[arg(long)]
    pub dump_config: bool,
}

/// Reader thread and queue settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderSettings {
    /// Undelivered events held before the reader blocks
    pub queue_capacity: usize,
    /// Bytes requested per read
    pub read_buffer: usize,
    /// How often a blocked reader checks for shutdown
    pub shutdown_poll_interval_ms: u64,
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            read_buffer: DEFAULT_READ_BUFFER,
            shutdown_poll_interval_ms: DEFAULT_SHUTDOWN_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

impl ReaderSettings {
    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            read_buffer: self.read_buffer,
            shutdown_poll_interval: Duration::from_millis(self.shutdown_poll_interval_ms),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    pub parser: ParserConfig,
    pub reader: ReaderSettings,
    /// Extra key table entries: sequence notation to key spec
    pub keys: BTreeMap<String, String>,
}

/// Configuration error
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("Failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Config error in '{field}': {reason}")]
    Invalid { field: String, reason: String },

    #[error(transparent)]
    Parser(#[from] mochi_input_parser::ConfigError),
}

impl InputConfig {
    /// Load configuration with full precedence:
    /// CLI args > environment variables > config file > defaults
    pub fn load_with_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = match &args.config {
            // An explicitly named file must load
            Some(path) => Self::load_from_file(path)?,
            None => Self::default_config_path()
                .filter(|path| path.exists())
                .map(|path| {
                    Self::load_from_file(&path).unwrap_or_else(|e| {
                        warn!("{}; using defaults", e);
                        Self::default()
                    })
                })
                .unwrap_or_default(),
        };

        config.apply_env_vars();
        config.apply_cli_args(args);
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("mochi").join("input.toml"))
    }

    fn apply_env_vars(&mut self) {
        self.apply_env_with(|name| env::var(name).ok());
    }

    /// Apply overrides from an environment lookup; bad values are ignored
    fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup(ENV_ESC_TIMEOUT) {
            match val.trim().parse() {
                Ok(ms) => self.parser.ambiguous_key_timeout = Duration::from_millis(ms),
                Err(_) => warn!("Ignoring {}={:?}: not a number", ENV_ESC_TIMEOUT, val),
            }
        }
        if let Some(val) = lookup(ENV_SEQUENCE_TIMEOUT) {
            match val.trim().parse() {
                Ok(ms) => self.parser.sequence_timeout = Duration::from_millis(ms),
                Err(_) => warn!("Ignoring {}={:?}: not a number", ENV_SEQUENCE_TIMEOUT, val),
            }
        }
        if let Some(val) = lookup(ENV_MOUSE_MODE) {
            match val.trim().parse() {
                Ok(mode) => self.parser.mouse_mode = mode,
                Err(e) => warn!("Ignoring {}: {}", ENV_MOUSE_MODE, e),
            }
        }
    }

    fn apply_cli_args(&mut self, args: &CliArgs) {
        if let Some(ms) = args.esc_timeout {
            self.parser.ambiguous_key_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = args.sequence_timeout {
            self.parser.sequence_timeout = Duration::from_millis(ms);
        }
        if let Some(len) = args.max_sequence_len {
            self.parser.max_sequence_len = len;
        }
        if let Some(mode) = args.mouse {
            self.parser.mouse_mode = mode;
        }
        if args.verbose_diagnostics {
            self.parser.verbose_diagnostics = true;
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parser.validate()?;

        if self.reader.queue_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "reader.queue_capacity".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.reader.read_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "reader.read_buffer".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.reader.shutdown_poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "reader.shutdown_poll_interval_ms".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        self.build_table().map(|_| ())
    }

    /// The xterm table with the `keys` entries applied
    pub fn build_table(&self) -> Result<KeySequenceTable, ConfigError> {
        let mut builder = KeySequenceTable::xterm().into_builder();
        for (notation, spec) in &self.keys {
            if spec.trim().eq_ignore_ascii_case(UNBIND) {
                builder.unbind(&parse_sequence(notation)?);
            } else {
                builder.bind_spec(notation, spec)?;
            }
        }
        Ok(builder.build())
    }
}
