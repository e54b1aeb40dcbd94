//! Output seam for command writers.
//!
//! A [`CommandSink`] receives commands together with the options they should
//! be rendered with, and tracks an indentation level. A text writer renders
//! to some `io::Write`; [`BufferSink`] keeps the commands in memory for
//! tests and for callers that post-process the stream.

use std::io;

use crate::command::Command;
use crate::format::FormatterOptions;

pub trait CommandSink {
    /// Emit one command at the current indentation level.
    fn write_command(&mut self, command: &Command, options: &FormatterOptions) -> io::Result<()>;

    fn inc_indent(&mut self);

    /// Decrease the indentation level. Saturates at zero.
    fn dec_indent(&mut self);

    fn indent_level(&self) -> usize;
}

/// A command captured by [`BufferSink`].
#[derive(Clone, Debug, PartialEq)]
pub struct WrittenCommand {
    pub command: Command,
    pub indent: usize,
    pub options: FormatterOptions,
}

/// Sink that records every command in memory.
#[derive(Clone, Debug, Default)]
pub struct BufferSink {
    written: Vec<WrittenCommand>,
    indent: usize,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> &[WrittenCommand] {
        &self.written
    }

    /// Command names paired with the level they were written at.
    pub fn outline(&self) -> Vec<(String, usize)> {
        self.written
            .iter()
            .map(|w| (w.command.name().to_owned(), w.indent))
            .collect()
    }

    pub fn clear(&mut self) {
        self.written.clear();
        self.indent = 0;
    }
}

impl CommandSink for BufferSink {
    fn write_command(&mut self, command: &Command, options: &FormatterOptions) -> io::Result<()> {
        self.written.push(WrittenCommand {
            command: command.clone(),
            indent: self.indent,
            options: options.clone(),
        });
        Ok(())
    }

    fn inc_indent(&mut self) {
        self.indent += 1;
    }

    fn dec_indent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    fn indent_level(&self) -> usize {
        self.indent
    }
}

#[cfg(test)]
mod tests;
