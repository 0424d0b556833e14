#![no_main]

use std::sync::Arc;
use std::time::Duration;

use libfuzzer_sys::fuzz_target;
use mochi_input_parser::{
    KeySequenceTable, ManualClock, ParsedInputEvent, Parser, ParserConfig,
};

fuzz_target!(|data: &[u8]| {
    let clock = ManualClock::new();
    let config = ParserConfig {
        max_sequence_len: 64,
        ..Default::default()
    };
    let mut parser = Parser::with_clock(Arc::new(KeySequenceTable::xterm()), config, clock.clone());

    // A zero byte splits the input: everything before it arrives, then the
    // clock jumps past every deadline
    for chunk in data.split(|&b| b == 0) {
        parser.parse(chunk, |event| check(&event));
        clock.advance(Duration::from_secs(1));
        parser.poll_timeout(|event| check(&event));
    }
    parser.flush(|event| check(&event));

    // Nothing may stay pending after a flush
    assert!(parser.is_idle());
    assert_eq!(parser.next_deadline(), None);
});

fn check(event: &ParsedInputEvent) {
    match event {
        ParsedInputEvent::TextCodepoint { byte_length, .. } => {
            assert!((1..=4).contains(byte_length));
        }
        ParsedInputEvent::KeyPress { raw_bytes, .. } => {
            assert!(!raw_bytes.is_empty());
            assert!(raw_bytes.len() <= 64 + 4);
        }
        ParsedInputEvent::Diagnostic { detail, .. } => {
            assert!(detail.len() <= 64);
        }
        ParsedInputEvent::MouseEvent(_) => {}
    }
}
