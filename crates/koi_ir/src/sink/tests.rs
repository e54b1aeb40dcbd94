#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_buffer_sink_records_indent() {
    let mut sink = BufferSink::new();
    let opts = FormatterOptions::default();

    sink.write_command(&Command::bare("section"), &opts).unwrap();
    sink.inc_indent();
    sink.write_command(&Command::text("body"), &opts).unwrap();
    sink.dec_indent();
    sink.write_command(&Command::bare("end"), &opts).unwrap();

    assert_eq!(
        sink.outline(),
        vec![
            ("section".to_owned(), 0),
            ("@text".to_owned(), 1),
            ("end".to_owned(), 0),
        ]
    );
}

#[test]
fn test_dec_indent_saturates() {
    let mut sink = BufferSink::new();
    sink.dec_indent();
    assert_eq!(sink.indent_level(), 0);
}

#[test]
fn test_clear() {
    let mut sink = BufferSink::new();
    sink.inc_indent();
    sink.write_command(&Command::bare("x"), &FormatterOptions::default())
        .unwrap();
    sink.clear();
    assert!(sink.written().is_empty());
    assert_eq!(sink.indent_level(), 0);
}
