use std::error::Error as _;
use std::fmt;

use super::*;
use pretty_assertions::assert_eq;

#[derive(Debug, PartialEq)]
struct Boom(u8);

impl fmt::Display for Boom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "boom {}", self.0)
    }
}

impl std::error::Error for Boom {}

#[test]
fn test_handler_error_is_transparent() {
    let err = RuntimeError::handler(Boom(3));
    assert_eq!(err.to_string(), "boom 3");
    assert_eq!(err.downcast_handler_ref::<Boom>(), Some(&Boom(3)));
}

#[test]
fn test_msg_builds_handler_error() {
    let err = RuntimeError::msg("bad state");
    assert!(matches!(err, RuntimeError::Handler(_)));
    assert_eq!(err.to_string(), "bad state");
    assert_eq!(err.downcast_handler_ref::<Boom>(), None);
}

#[test]
fn test_not_found_messages() {
    let at = RuntimeError::EnvironmentNotFound {
        type_name: "Section",
        index: Some(-2),
    };
    let anywhere = RuntimeError::EnvironmentNotFound {
        type_name: "Section",
        index: None,
    };
    assert_eq!(at.to_string(), "no environment of type `Section` at index -2");
    assert_eq!(
        anywhere.to_string(),
        "no environment of type `Section` on the stack"
    );
}

#[test]
fn test_argument_error_is_source() {
    let err = RuntimeError::arguments(
        "do_cmd",
        ArgumentError::Missing {
            name: "cnt".into(),
        },
    );
    assert_eq!(
        err.to_string(),
        "bad arguments for `do_cmd`: missing required argument `cnt`"
    );
    assert!(err.source().is_some());
}
