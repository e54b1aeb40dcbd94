//! Middleware around command dispatch.
//!
//! Every dispatched command passes through the runtime's middleware in
//! registration order before reaching its handler. Each middleware receives
//! a [`Next`] continuation: running it invokes the rest of the chain and,
//! at the end, the resolved handler. A middleware may observe or replace the
//! result, or return without running `next` to short-circuit the command.
//!
//! The chain is fixed when the runtime is built.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use koi_ir::{Command, CommandSink, WriterConfig};

use crate::errors::DispatchResult;
use crate::runtime::{Runtime, Target};

pub trait Middleware {
    fn handle(&self, runtime: &Runtime, command: &Command, next: Next<'_>) -> DispatchResult;
}

/// The remainder of the chain for one command.
///
/// `Next` is `Copy`: a middleware may run the rest of the chain more than
/// once, for example to retry after a failure.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    runtime: &'a Runtime,
    command: &'a Rc<Command>,
    target: &'a Target,
    index: usize,
}

impl<'a> Next<'a> {
    pub(crate) fn new(runtime: &'a Runtime, command: &'a Rc<Command>, target: &'a Target) -> Self {
        Next {
            runtime,
            command,
            target,
            index: 0,
        }
    }

    /// Run the remaining middleware, then the handler.
    pub fn run(self) -> DispatchResult {
        match self.runtime.middleware().get(self.index) {
            Some(middleware) => middleware.handle(
                self.runtime,
                self.command,
                Next {
                    index: self.index + 1,
                    ..self
                },
            ),
            None => self.runtime.invoke_resolved(self.command, self.target),
        }
    }
}

impl fmt::Debug for Next<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Next")
            .field("command", &self.command.name())
            .field("index", &self.index)
            .finish_non_exhaustive()
    }
}

impl<F> Middleware for F
where
    F: Fn(&Runtime, &Command, Next<'_>) -> DispatchResult,
{
    fn handle(&self, runtime: &Runtime, command: &Command, next: Next<'_>) -> DispatchResult {
        self(runtime, command, next)
    }
}

/// Pin a closure to the middleware signature so its argument types are
/// inferred.
///
/// ```text
/// let log = from_fn(|_rt, cmd, next| {
///     tracing::info!(command = cmd.name());
///     next.run()
/// });
/// ```
pub fn from_fn<F>(f: F) -> F
where
    F: Fn(&Runtime, &Command, Next<'_>) -> DispatchResult,
{
    f
}

/// Opens a `koi.dispatch` span per command and logs failures at debug level.
#[derive(Clone, Copy, Debug, Default)]
pub struct TraceCommands;

impl Middleware for TraceCommands {
    fn handle(&self, runtime: &Runtime, command: &Command, next: Next<'_>) -> DispatchResult {
        let span = tracing::debug_span!(
            "koi.dispatch",
            command = %command.name(),
            params = command.params().len(),
            stack = runtime.stack_len(),
            depth = runtime.nesting_depth(),
        );
        let _entered = span.enter();

        let result = next.run();
        match &result {
            Ok(Some(value)) => tracing::debug!(%value, "handled"),
            Ok(None) => tracing::debug!("handled"),
            Err(err) => tracing::debug!(error = %err, "failed"),
        }
        result
    }
}

/// Forwards every successfully handled command to a [`CommandSink`].
///
/// The command is written with the options [`WriterConfig::options_for`]
/// selects for its name. Afterwards the sink's indentation follows the
/// change in stack depth the handler caused: one level in per environment
/// entered, one level out per environment exited. A command that enters an
/// environment is therefore written at the outer level and the commands
/// handled inside it one level deeper. A failed command is not written, but
/// the level still follows the stack.
pub struct Transcribe<S> {
    sink: Rc<RefCell<S>>,
    config: WriterConfig,
}

impl<S: CommandSink> Transcribe<S> {
    pub fn new(sink: Rc<RefCell<S>>) -> Self {
        Self::with_config(sink, WriterConfig::default())
    }

    pub fn with_config(sink: Rc<RefCell<S>>, config: WriterConfig) -> Self {
        Transcribe { sink, config }
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }
}

impl<S: CommandSink> Middleware for Transcribe<S> {
    fn handle(&self, runtime: &Runtime, command: &Command, next: Next<'_>) -> DispatchResult {
        let depth_before = runtime.stack_len();
        let level_before = self.sink.borrow().indent_level();
        let result = next.run();

        let mut sink = self.sink.borrow_mut();
        // Nested commands may have moved the level while this one ran.
        let level_now = sink.indent_level();
        for _ in level_before..level_now {
            sink.dec_indent();
        }
        for _ in level_now..level_before {
            sink.inc_indent();
        }
        if result.is_ok() {
            sink.write_command(command, self.config.options_for(command.name()))?;
        }

        let depth_after = runtime.stack_len();
        for _ in depth_before..depth_after {
            sink.inc_indent();
        }
        for _ in depth_after..depth_before {
            sink.dec_indent();
        }
        result
    }
}
