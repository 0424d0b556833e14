//! Mochi key viewer
//!
//! Puts the terminal into raw mode and prints every input event decoded
//! from it. Press Ctrl-D to quit.

use std::io::{self, Write};
use std::os::fd::AsFd;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser as _;
use mochi_input::config::{CliArgs, InputConfig};
use mochi_input::parser::{MouseTrackingMode, ParsedInputEvent, Parser};
use mochi_input::tty::{event_queue, FdSource, InputReader, RawMode};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Byte that ends the session
const CTRL_D: u8 = 0x04;

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let args = CliArgs::parse();

    // Load configuration with precedence: CLI > env > file > defaults
    let config = match InputConfig::load_with_args(&args) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Configuration error: {}", e);
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if args.dump_config {
        return match toml::to_string_pretty(&config) {
            Ok(text) => {
                print!("{}", text);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("Failed to serialize config: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    match run(&args, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("mochi-keys: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &CliArgs, config: &InputConfig) -> Result<(), Box<dyn std::error::Error>> {
    let table = Arc::new(config.build_table()?);
    let parser = Parser::new(table, config.parser.clone());

    let stdin = io::stdin();
    let input = std::fs::File::from(stdin.as_fd().try_clone_to_owned()?);
    let raw = RawMode::enable(stdin.as_fd())?;

    let mut stdout = io::stdout().lock();
    stdout.write_all(mouse_sequence(config.parser.mouse_mode, true).as_bytes())?;
    writeln!(stdout, "Reading input; press Ctrl-D to quit.")?;
    stdout.flush()?;

    let (tx, rx) = event_queue(config.reader.queue_capacity);
    let reader = InputReader::new(FdSource::new(input), parser, tx, config.reader.reader_config());
    let handle = reader.spawn()?;

    let mut seen = 0u64;
    for event in rx.iter() {
        if is_quit(&event) {
            break;
        }
        print_event(&mut stdout, &event, args.json)?;
        seen += 1;
        if args.count.is_some_and(|limit| seen >= limit) {
            break;
        }
    }
    drop(rx);

    let exit = handle.shutdown()?;
    tracing::info!(
        "{} bytes read, {} events, {} recovered errors",
        exit.stats.bytes_processed,
        exit.stats.events_emitted,
        exit.stats.errors()
    );

    stdout.write_all(mouse_sequence(config.parser.mouse_mode, false).as_bytes())?;
    stdout.flush()?;
    drop(raw);
    Ok(())
}

fn is_quit(event: &ParsedInputEvent) -> bool {
    matches!(event, ParsedInputEvent::KeyPress { raw_bytes, .. } if raw_bytes.as_slice() == [CTRL_D])
}

fn print_event(out: &mut impl Write, event: &ParsedInputEvent, json: bool) -> io::Result<()> {
    if json {
        let line = serde_json::to_string(event).map_err(io::Error::other)?;
        writeln!(out, "{}", line)?;
    } else {
        writeln!(out, "{:?}", event)?;
    }
    out.flush()
}

/// DEC private modes that make the terminal report the mouse
fn mouse_sequence(mode: MouseTrackingMode, enable: bool) -> String {
    let encoding = match mode {
        MouseTrackingMode::None => return String::new(),
        MouseTrackingMode::X10 => None,
        MouseTrackingMode::Utf8Extended => Some(1005),
        MouseTrackingMode::Sgr => Some(1006),
        MouseTrackingMode::Urxvt => Some(1015),
    };
    let suffix = if enable { 'h' } else { 'l' };
    let mut seq = format!("\x1b[?1000{}", suffix);
    if let Some(encoding) = encoding {
        seq.push_str(&format!("\x1b[?{}{}", encoding, suffix));
    }
    seq
}
