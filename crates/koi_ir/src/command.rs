//! Commands and parameters.
//!
//! A command name starting with [`EVENT_SENTINEL`] names an *event*
//! (`@text`, `@annotation`, `@number`, ...). Every other name is an ordinary
//! command. The runtime maps the two families onto different handler names.

use std::fmt;

use crate::value::Value;

/// Leading character that marks a command name as an event.
pub const EVENT_SENTINEL: char = '@';

/// Event emitted for a line of plain text.
pub const TEXT_COMMAND: &str = "@text";

/// Event emitted for an annotation line.
pub const ANNOTATION_COMMAND: &str = "@annotation";

/// Event emitted for a command whose name is an integer literal.
pub const NUMBER_COMMAND: &str = "@number";

/// One argument of a command.
#[derive(Clone, Debug, PartialEq)]
pub enum Parameter {
    Positional(Value),
    Named(String, Value),
}

impl Parameter {
    #[inline]
    pub fn positional(value: impl Into<Value>) -> Self {
        Parameter::Positional(value.into())
    }

    #[inline]
    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Parameter::Named(name.into(), value.into())
    }

    /// The parameter name, or `None` for positional parameters.
    pub fn name(&self) -> Option<&str> {
        match self {
            Parameter::Positional(_) => None,
            Parameter::Named(name, _) => Some(name),
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            Parameter::Positional(value) | Parameter::Named(_, value) => value,
        }
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::Positional(value) => write!(f, "{value}"),
            Parameter::Named(name, Value::List(items)) => {
                write!(f, "{name}(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Parameter::Named(name, Value::Map(entries)) => {
                write!(f, "{name}(")?;
                for (i, (key, item)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {item}")?;
                }
                f.write_str(")")
            }
            Parameter::Named(name, value) => write!(f, "{name}({value})"),
        }
    }
}

/// A named instruction with ordered parameters.
///
/// Commands are immutable once built; the runtime shares them between the
/// middleware chain and the handler that finally receives them.
#[derive(Clone, Debug, PartialEq)]
pub struct Command {
    name: String,
    params: Vec<Parameter>,
}

impl Command {
    pub fn new(name: impl Into<String>, params: impl IntoIterator<Item = Parameter>) -> Self {
        Command {
            name: name.into(),
            params: params.into_iter().collect(),
        }
    }

    /// A command without parameters.
    pub fn bare(name: impl Into<String>) -> Self {
        Command {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// `@text` event carrying one line of text.
    pub fn text(content: impl Into<String>) -> Self {
        Command::new(TEXT_COMMAND, [Parameter::positional(content.into())])
    }

    /// `@annotation` event carrying the annotation body.
    pub fn annotation(content: impl Into<String>) -> Self {
        Command::new(ANNOTATION_COMMAND, [Parameter::positional(content.into())])
    }

    /// `@number` event: the number comes first, followed by the remaining
    /// arguments of the original line.
    pub fn number(value: i64, args: impl IntoIterator<Item = Parameter>) -> Self {
        let mut params = vec![Parameter::positional(value)];
        params.extend(args);
        Command {
            name: NUMBER_COMMAND.to_owned(),
            params,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    /// Positional values in order.
    pub fn positional(&self) -> impl Iterator<Item = &Value> + '_ {
        self.params.iter().filter_map(|p| match p {
            Parameter::Positional(value) => Some(value),
            Parameter::Named(..) => None,
        })
    }

    /// Named values in order.
    pub fn named(&self) -> impl Iterator<Item = (&str, &Value)> + '_ {
        self.params.iter().filter_map(|p| match p {
            Parameter::Positional(_) => None,
            Parameter::Named(name, value) => Some((name.as_str(), value)),
        })
    }

    /// First named value called `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.named().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    #[inline]
    pub fn is_event(&self) -> bool {
        self.name.starts_with(EVENT_SENTINEL)
    }

    /// Event name without the sentinel, e.g. `text` for `@text`.
    pub fn event_name(&self) -> Option<&str> {
        self.name.strip_prefix(EVENT_SENTINEL)
    }

    pub fn into_parts(self) -> (String, Vec<Parameter>) {
        (self.name, self.params)
    }
}

/// Surface notation for logs: `#name arg name(value)`.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.name)?;
        for param in &self.params {
            write!(f, " {param}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
