use super::*;
use crate::value::Scalar;
use pretty_assertions::assert_eq;

#[test]
fn test_event_detection() {
    assert!(Command::text("hello").is_event());
    assert!(!Command::bare("cmd").is_event());
    assert_eq!(Command::annotation("note").event_name(), Some("annotation"));
    assert_eq!(Command::bare("cmd").event_name(), None);
}

#[test]
fn test_text_command_shape() {
    let cmd = Command::text("Hello");
    assert_eq!(cmd.name(), TEXT_COMMAND);
    assert_eq!(cmd.params(), &[Parameter::positional("Hello")]);
}

#[test]
fn test_number_puts_value_first() {
    let cmd = Command::number(42, [Parameter::positional("x"), Parameter::named("k", 1)]);
    assert_eq!(cmd.name(), NUMBER_COMMAND);
    let positional: Vec<&Value> = cmd.positional().collect();
    assert_eq!(positional, vec![&Value::Int(42), &Value::from("x")]);
    assert_eq!(cmd.get("k"), Some(&Value::Int(1)));
}

#[test]
fn test_positional_and_named_split() {
    let cmd = Command::new(
        "draw",
        [
            Parameter::positional(1),
            Parameter::named("color", "red"),
            Parameter::positional(2),
        ],
    );
    assert_eq!(cmd.positional().count(), 2);
    let named: Vec<(&str, &Value)> = cmd.named().collect();
    assert_eq!(named, vec![("color", &Value::from("red"))]);
    assert_eq!(cmd.get("missing"), None);
}

#[test]
fn test_display() {
    let cmd = Command::new(
        "image",
        [
            Parameter::positional("a.png"),
            Parameter::named("size", Value::list([Scalar::from(10), Scalar::from(20)])),
            Parameter::named("meta", Value::map([("alt", "cat")])),
            Parameter::named("scale", 1.5),
        ],
    );
    assert_eq!(
        cmd.to_string(),
        "#image \"a.png\" size(10, 20) meta(alt: \"cat\") scale(1.5)"
    );
}

#[test]
fn test_into_parts() {
    let (name, params) = Command::bare("end").into_parts();
    assert_eq!(name, "end");
    assert!(params.is_empty());
}
