//! Data model shared by the KoiLang runtime and its producers.
//!
//! A KoiLang document is a flat stream of [`Command`]s. Each command has a
//! name and an ordered list of [`Parameter`]s, where every parameter is
//! either positional or named and carries a [`Value`].
//!
//! # Modules
//!
//! - [`value`]: parameter values (scalars, lists, ordered maps)
//! - [`command`]: commands, parameters and the event-name convention
//! - [`format`]: formatter and writer configuration records
//! - [`sink`]: the output seam a writer implements, plus an in-memory sink
//!
//! Parsing text into commands and rendering commands back to text live
//! outside this crate. The records in [`format`] only describe how a writer
//! should render; nothing here interprets them.

pub mod command;
pub mod format;
pub mod sink;
pub mod value;

pub use command::{Command, Parameter, ANNOTATION_COMMAND, EVENT_SENTINEL, NUMBER_COMMAND, TEXT_COMMAND};
pub use format::{FormatterOptions, NumberFormat, ParamFormatSelector, ParamOverride, WriterConfig};
pub use sink::{BufferSink, CommandSink, WrittenCommand};
pub use value::{Scalar, Value};
