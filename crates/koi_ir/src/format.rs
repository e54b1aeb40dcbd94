//! Writer configuration records.
//!
//! These describe how a KoiLang writer should render commands: indentation,
//! blank lines around commands, number bases and per-parameter overrides.
//! The records are plain data with serde support so they can be loaded from
//! a configuration file; rendering itself belongs to the writer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::command::Parameter;

/// Default indentation width in spaces.
pub const INDENT_WIDTH: usize = 4;

/// Default number of `#` characters that mark a command line.
pub const COMMAND_THRESHOLD: usize = 1;

/// Base used when rendering integers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NumberFormat {
    /// Natural representation, whatever the value was written with.
    #[default]
    Unknown,
    Decimal,
    Hex,
    Octal,
    Binary,
}

impl NumberFormat {
    /// Radix for the format, `None` for [`NumberFormat::Unknown`].
    pub fn radix(self) -> Option<u32> {
        match self {
            NumberFormat::Unknown => None,
            NumberFormat::Decimal => Some(10),
            NumberFormat::Hex => Some(16),
            NumberFormat::Octal => Some(8),
            NumberFormat::Binary => Some(2),
        }
    }
}

/// Addresses one parameter of a command for a format override.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParamFormatSelector {
    /// Zero-based index into the full parameter list.
    Position(usize),
    /// Name of a named parameter.
    Name(String),
}

impl ParamFormatSelector {
    pub fn matches(&self, position: usize, param: &Parameter) -> bool {
        match self {
            ParamFormatSelector::Position(p) => *p == position,
            ParamFormatSelector::Name(name) => param.name() == Some(name.as_str()),
        }
    }
}

/// Options used for one parameter matched by a selector.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParamOverride {
    pub selector: ParamFormatSelector,
    pub options: FormatterOptions,
}

/// How a single command is rendered.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormatterOptions {
    /// Spaces per indentation level (ignored when `use_tabs` is set).
    pub indent: usize,
    pub use_tabs: bool,
    /// Blank line before the command.
    pub newline_before: bool,
    /// Blank line after the command.
    pub newline_after: bool,
    /// Drop optional whitespace between parameters.
    pub compact: bool,
    /// Quote string values even when they are valid identifiers.
    pub force_quotes_for_vars: bool,
    pub number_format: NumberFormat,
    /// Line break before each parameter.
    pub newline_before_param: bool,
    /// Line break after each parameter.
    pub newline_after_param: bool,
    /// Per-parameter overrides; the first matching selector wins.
    pub param_overrides: Vec<ParamOverride>,
}

impl Default for FormatterOptions {
    fn default() -> Self {
        Self {
            indent: INDENT_WIDTH,
            use_tabs: false,
            newline_before: false,
            newline_after: false,
            compact: false,
            force_quotes_for_vars: false,
            number_format: NumberFormat::Unknown,
            newline_before_param: false,
            newline_after_param: false,
            param_overrides: Vec::new(),
        }
    }
}

impl FormatterOptions {
    /// Default options with the given indentation width.
    pub fn with_indent(indent: usize) -> Self {
        Self {
            indent,
            ..Default::default()
        }
    }

    /// Default options that indent with tabs.
    pub fn with_tabs() -> Self {
        Self {
            use_tabs: true,
            ..Default::default()
        }
    }

    /// Add a parameter override.
    #[must_use]
    pub fn with_param_override(
        mut self,
        selector: ParamFormatSelector,
        options: FormatterOptions,
    ) -> Self {
        self.param_overrides.push(ParamOverride { selector, options });
        self
    }

    /// Options for the parameter at `position`: the first matching override,
    /// otherwise `self`.
    pub fn for_param(&self, position: usize, param: &Parameter) -> &FormatterOptions {
        self.param_overrides
            .iter()
            .find(|o| o.selector.matches(position, param))
            .map_or(self, |o| &o.options)
    }

    /// Leading whitespace for the given nesting level.
    pub fn indentation(&self, level: usize) -> String {
        if self.use_tabs {
            "\t".repeat(level)
        } else {
            " ".repeat(level * self.indent)
        }
    }
}

/// Writer-wide configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Used for every command without its own entry.
    pub global_options: FormatterOptions,
    /// Per-command-name options.
    pub command_options: BTreeMap<String, FormatterOptions>,
    /// Number of `#` characters that mark a command line.
    pub command_threshold: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            global_options: FormatterOptions::default(),
            command_options: BTreeMap::new(),
            command_threshold: COMMAND_THRESHOLD,
        }
    }
}

impl WriterConfig {
    /// Options for a command name, falling back to the global options.
    pub fn options_for(&self, command_name: &str) -> &FormatterOptions {
        self.command_options
            .get(command_name)
            .unwrap_or(&self.global_options)
    }

    /// Register options for one command name.
    #[must_use]
    pub fn with_command_options(
        mut self,
        command_name: impl Into<String>,
        options: FormatterOptions,
    ) -> Self {
        self.command_options.insert(command_name.into(), options);
        self
    }
}

#[cfg(test)]
mod tests;
