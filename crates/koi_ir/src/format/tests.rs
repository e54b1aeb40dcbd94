#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use super::*;
use pretty_assertions::assert_eq;

#[test]
fn test_default_options() {
    let opts = FormatterOptions::default();
    assert_eq!(opts.indent, INDENT_WIDTH);
    assert!(!opts.use_tabs);
    assert_eq!(opts.number_format, NumberFormat::Unknown);
    assert_eq!(WriterConfig::default().command_threshold, 1);
}

#[test]
fn test_options_for_falls_back_to_global() {
    let config = WriterConfig::default()
        .with_command_options("title", FormatterOptions::with_indent(2));
    assert_eq!(config.options_for("title").indent, 2);
    assert_eq!(config.options_for("other").indent, INDENT_WIDTH);
}

#[test]
fn test_param_override_by_name_and_position() {
    let hex = FormatterOptions {
        number_format: NumberFormat::Hex,
        ..Default::default()
    };
    let bin = FormatterOptions {
        number_format: NumberFormat::Binary,
        ..Default::default()
    };
    let opts = FormatterOptions::default()
        .with_param_override(ParamFormatSelector::Name("color".into()), hex)
        .with_param_override(ParamFormatSelector::Position(0), bin);

    let color = Parameter::named("color", 255);
    let first = Parameter::positional(1);
    let other = Parameter::positional(2);

    assert_eq!(opts.for_param(1, &color).number_format, NumberFormat::Hex);
    assert_eq!(opts.for_param(0, &first).number_format, NumberFormat::Binary);
    assert_eq!(opts.for_param(3, &other).number_format, NumberFormat::Unknown);
}

#[test]
fn test_indentation() {
    assert_eq!(FormatterOptions::with_indent(2).indentation(3), "      ");
    assert_eq!(FormatterOptions::with_tabs().indentation(2), "\t\t");
    assert_eq!(FormatterOptions::default().indentation(0), "");
}

#[test]
fn test_radix() {
    assert_eq!(NumberFormat::Hex.radix(), Some(16));
    assert_eq!(NumberFormat::Unknown.radix(), None);
}

#[test]
fn test_config_deserializes_with_defaults() {
    let config: WriterConfig = serde_json::from_str(
        r#"{
            "command_options": { "title": { "newline_after": true } },
            "command_threshold": 2
        }"#,
    )
    .unwrap();

    assert_eq!(config.command_threshold, 2);
    assert_eq!(config.global_options, FormatterOptions::default());
    let title = config.options_for("title");
    assert!(title.newline_after);
    assert_eq!(title.indent, INDENT_WIDTH);
}
