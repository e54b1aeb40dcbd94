//! Runtime errors.

use std::error::Error as StdError;

use koi_ir::Value;
use thiserror::Error;

/// Boxed error raised by a handler or a command source.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// Outcome of dispatching one command: the handler's return value, if any.
pub type DispatchResult = Result<Option<Value>, RuntimeError>;

#[derive(Debug, Error)]
pub enum RuntimeError {
    /// `env_exit` was given an environment that is not the removable top.
    #[error("cannot exit `{expected}`: top of the environment stack is `{top}`")]
    StackMismatch {
        expected: &'static str,
        top: &'static str,
    },

    #[error("{}", not_found_message(.type_name, .index))]
    EnvironmentNotFound {
        type_name: &'static str,
        index: Option<isize>,
    },

    #[error("no active execution context")]
    NoActiveContext,

    /// Error raised by a handler, passed through unchanged.
    #[error(transparent)]
    Handler(BoxError),

    #[error("command source failed: {0}")]
    Source(#[source] BoxError),

    #[error("bad arguments for `{method}`: {kind}")]
    Arguments {
        method: String,
        #[source]
        kind: ArgumentError,
    },

    /// Raised only with [`UnhandledPolicy::Error`](crate::UnhandledPolicy::Error).
    #[error("no handler for command `{name}`")]
    UnhandledCommand { name: String },

    #[error("`{type_name}` has no handler `{method}`")]
    NoSuchHandler {
        type_name: &'static str,
        method: String,
    },

    #[error("`{name}` is not a handler name (expected `do_*` or `on_*`)")]
    InvalidHandlerName { name: String },

    /// A handler re-entered an environment that is already executing.
    #[error("environment `{type_name}` is already executing a handler")]
    EnvironmentBusy { type_name: &'static str },

    #[error("command nesting exceeded the limit of {limit}")]
    NestingLimitExceeded { limit: usize },

    #[error("command sink failed: {0}")]
    Sink(#[from] std::io::Error),
}

fn not_found_message(type_name: &str, index: &Option<isize>) -> String {
    match index {
        Some(index) => format!("no environment of type `{type_name}` at index {index}"),
        None => format!("no environment of type `{type_name}` on the stack"),
    }
}

impl RuntimeError {
    /// Wrap an arbitrary error raised inside a handler.
    pub fn handler<E>(err: E) -> Self
    where
        E: StdError + Send + Sync + 'static,
    {
        RuntimeError::Handler(Box::new(err))
    }

    /// Handler error from a plain message.
    pub fn msg(message: impl Into<String>) -> Self {
        RuntimeError::Handler(message.into().into())
    }

    /// The handler error as `E`, if this is a handler error of that type.
    pub fn downcast_handler_ref<E: StdError + 'static>(&self) -> Option<&E> {
        match self {
            RuntimeError::Handler(err) => err.downcast_ref::<E>(),
            _ => None,
        }
    }

    pub(crate) fn arguments(method: &str, kind: ArgumentError) -> Self {
        RuntimeError::Arguments {
            method: method.to_owned(),
            kind,
        }
    }
}

/// Why a command's parameters could not be bound to a handler signature.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ArgumentError {
    #[error("expected at most {expected} positional arguments, got {got}")]
    TooManyPositional { expected: usize, got: usize },

    #[error("missing required argument `{name}`")]
    Missing { name: String },

    #[error("unexpected named argument `{name}`")]
    UnexpectedNamed { name: String },

    #[error("argument `{name}` given more than once")]
    Duplicate { name: String },

    #[error("argument `{name}` cannot be passed by name")]
    PositionalOnly { name: String },

    #[error("argument `{name}` expected {expected}, got {got}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        got: &'static str,
    },

    #[error("handler has no parameter `{name}`")]
    UnknownParameter { name: String },
}

#[cfg(test)]
mod tests;
