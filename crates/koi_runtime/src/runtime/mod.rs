//! The dispatch engine.
//!
//! A [`Runtime`] owns the environment stack and the middleware chain. It
//! consumes a stream of commands and routes each one through the chain to
//! the innermost environment that has a handler for it.
//!
//! # Architecture
//!
//! - **Resolution**: `name` maps to `do_name`, `@name` to `on_name`; the
//!   stack is searched top-down and the first table with the method wins.
//! - **Invocation**: the stack borrow is released before a handler runs, so
//!   handlers may push, pop and dispatch. The execution context is installed
//!   for exactly the duration of the call.
//! - **Nesting**: every dispatch, nested or not, counts against
//!   [`RuntimeConfig::max_nesting_depth`]. On native targets each dispatch
//!   first makes sure [`DISPATCH_RED_ZONE`] of stack is left, growing the
//!   stack with `stacker` otherwise, so deep handler recursion is bounded by
//!   the nesting limit rather than by the thread's stack size.
//!
//! `Runtime` is a cheap `Rc` handle. Clones share the same engine; it is
//! neither `Send` nor `Sync`.

mod builder;

pub use builder::{RuntimeBuilder, RuntimeConfig, UnhandledPolicy, DEFAULT_MAX_NESTING};

use std::any::TypeId;
use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;

use koi_ir::Command;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::context;
use crate::environment::{
    short_type_name, EnvHandle, EnvSlot, EnvStack, Environment, ErasedTable, HandlerTable,
};
use crate::errors::{DispatchResult, RuntimeError};
use crate::middleware::{Middleware, Next};
use crate::naming::{self, ON_END, ON_START};

/// Stack that must remain before a dispatch runs middleware and a handler,
/// both of which are user code with frames of unknown size.
pub const DISPATCH_RED_ZONE: usize = 256 * 1024;

/// Size of each stack segment allocated when the red zone is reached.
#[cfg(not(target_arch = "wasm32"))]
const DISPATCH_STACK_SEGMENT: usize = 2 * 1024 * 1024;

#[cfg(not(target_arch = "wasm32"))]
fn with_stack_headroom<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(DISPATCH_RED_ZONE, DISPATCH_STACK_SEGMENT, f)
}

// No stack switching on wasm; the nesting limit is the only bound.
#[cfg(target_arch = "wasm32")]
fn with_stack_headroom<R>(f: impl FnOnce() -> R) -> R {
    f()
}

/// Where a dispatched command is sent once the middleware chain is done.
pub(crate) enum Target {
    /// Innermost environment with a matching handler.
    Search,
    /// One specific instance.
    Slot(EnvSlot),
    /// A type without an instance; only static handlers can run.
    Type(Rc<dyn ErasedTable>),
}

struct RuntimeInner {
    stack: RefCell<EnvStack>,
    tables: RefCell<FxHashMap<TypeId, Rc<dyn ErasedTable>>>,
    middleware: Vec<Box<dyn Middleware>>,
    config: RuntimeConfig,
    depth: Cell<usize>,
}

#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    /// Runtime with default configuration and no middleware.
    pub fn new<E: Environment>(root: E) -> Self {
        RuntimeBuilder::new(root).build()
    }

    pub fn builder<E: Environment>(root: E) -> RuntimeBuilder<E> {
        RuntimeBuilder::new(root)
    }

    pub(crate) fn assemble<E: Environment>(
        root: E,
        middleware: Vec<Box<dyn Middleware>>,
        config: RuntimeConfig,
    ) -> Self {
        let table = Rc::new(HandlerTable::<E>::build()) as Rc<dyn ErasedTable>;
        let mut tables = FxHashMap::default();
        tables.insert(TypeId::of::<E>(), Rc::clone(&table));
        let (slot, _) = EnvSlot::new(root, table);

        Runtime {
            inner: Rc::new(RuntimeInner {
                stack: RefCell::new(EnvStack::new(slot)),
                tables: RefCell::new(tables),
                middleware,
                config,
                depth: Cell::new(0),
            }),
        }
    }

    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    /// Number of environments on the stack, root included.
    pub fn stack_len(&self) -> usize {
        self.inner.stack.borrow().len()
    }

    /// Type names on the stack, bottom to top.
    pub fn stack_type_names(&self) -> Vec<&'static str> {
        self.inner.stack.borrow().type_names()
    }

    /// Dispatches currently in progress.
    #[inline]
    pub fn nesting_depth(&self) -> usize {
        self.inner.depth.get()
    }

    /// Handle to the instance at stack position `index` if it is an `E`.
    pub fn handle_at<E: Environment>(&self, index: usize) -> Option<EnvHandle<E>> {
        self.inner.stack.borrow().get(index)?.handle()
    }

    pub fn root<E: Environment>(&self) -> Option<EnvHandle<E>> {
        self.handle_at(0)
    }

    /// Whether both handles refer to the same engine.
    #[inline]
    pub fn ptr_eq(&self, other: &Runtime) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Push `env` on top of the stack.
    pub fn env_enter<E: Environment>(&self, env: E) -> EnvHandle<E> {
        let table = self.table_for::<E>();
        let (slot, handle) = EnvSlot::new(env, table);
        let mut stack = self.inner.stack.borrow_mut();
        stack.push(slot);
        tracing::debug!(
            env = short_type_name::<E>(),
            stack = stack.len(),
            "entered environment"
        );
        handle
    }

    /// Pop `env`, which must be the top of the stack and not the root.
    pub fn env_exit<E: Environment>(&self, env: &E) -> Result<(), RuntimeError> {
        let popped = self.inner.stack.borrow_mut().pop(env)?;
        tracing::debug!(
            env = popped.type_name(),
            stack = self.stack_len(),
            "exited environment"
        );
        Ok(())
    }

    /// Run `method` on every environment that has it, bottom to top.
    ///
    /// Iterates over a snapshot, so hooks may change the stack. Stops at the
    /// first failing hook.
    pub fn notify_lifecycle(&self, method: &str) -> Result<(), RuntimeError> {
        let command_name =
            naming::command_name(method).ok_or_else(|| RuntimeError::InvalidHandlerName {
                name: method.to_owned(),
            })?;
        let hook = Command::bare(command_name);
        let slots = self.inner.stack.borrow().snapshot();

        tracing::debug!(method, stack = slots.len(), "notifying lifecycle");
        for slot in &slots {
            if let Some(result) = slot.table().invoke(Some(slot.instance()), method, &hook) {
                result?;
            }
        }
        Ok(())
    }

    /// Dispatch one command through the middleware chain.
    #[tracing::instrument(level = "debug", skip(self, command), fields(command = %command.name()))]
    pub fn dispatch(&self, command: Command) -> DispatchResult {
        self.dispatch_to(Rc::new(command), Target::Search)
    }

    /// Run every command from `source` in order.
    ///
    /// `on_start` runs before the first command. `on_end` runs once the
    /// source is exhausted or a command fails, and also when a handler
    /// panics. If `on_start` fails nothing else runs.
    ///
    /// Lifecycle hooks do not install an execution context; at the top level
    /// [`current_runtime`](crate::current_runtime) fails inside them. A
    /// nested `execute` started from a handler runs the hooks of every
    /// environment on the stack, including the one whose handler is still
    /// executing; if that environment has a hook, the hook fails with
    /// [`RuntimeError::EnvironmentBusy`].
    pub fn execute<I>(&self, source: I) -> Result<(), RuntimeError>
    where
        I: IntoIterator<Item = Command>,
    {
        self.execute_fallible(source.into_iter().map(Ok::<_, Infallible>))
    }

    /// [`Runtime::execute`] for sources that can fail. A source error stops
    /// the run as [`RuntimeError::Source`].
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn execute_fallible<I, E>(&self, source: I) -> Result<(), RuntimeError>
    where
        I: IntoIterator<Item = Result<Command, E>>,
        E: StdError + Send + Sync + 'static,
    {
        self.notify_lifecycle(ON_START)?;
        let guard = EndGuard {
            runtime: self,
            armed: true,
        };

        let outcome = self.dispatch_all(source);
        let ended = guard.finish();
        match (outcome, ended) {
            (Ok(()), ended) => ended,
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(end_err)) => {
                tracing::warn!(error = %end_err, "on_end failed after an aborted run");
                Err(err)
            }
        }
    }

    fn dispatch_all<I, E>(&self, source: I) -> Result<(), RuntimeError>
    where
        I: IntoIterator<Item = Result<Command, E>>,
        E: StdError + Send + Sync + 'static,
    {
        for item in source {
            let command = item.map_err(|err| RuntimeError::Source(Box::new(err)))?;
            self.dispatch(command)?;
        }
        Ok(())
    }

    pub(crate) fn middleware(&self) -> &[Box<dyn Middleware>] {
        &self.inner.middleware
    }

    pub(crate) fn table_for<E: Environment>(&self) -> Rc<dyn ErasedTable> {
        let key = TypeId::of::<E>();
        if let Some(table) = self.inner.tables.borrow().get(&key) {
            return Rc::clone(table);
        }
        // Built outside the borrow: `register` is user code.
        let table = Rc::new(HandlerTable::<E>::build()) as Rc<dyn ErasedTable>;
        self.inner.tables.borrow_mut().insert(key, Rc::clone(&table));
        table
    }

    /// Stack slots holding an `E`, bottom to top.
    pub(crate) fn slots_of<E: Environment>(&self) -> SmallVec<[EnvSlot; 4]> {
        self.inner.stack.borrow().matches::<E>()
    }

    pub(crate) fn dispatch_to(&self, command: Rc<Command>, target: Target) -> DispatchResult {
        let _nesting = self.enter_nesting()?;
        with_stack_headroom(|| Next::new(self, &command, &target).run())
    }

    /// End of the middleware chain: find the handler and call it.
    pub(crate) fn invoke_resolved(&self, command: &Rc<Command>, target: &Target) -> DispatchResult {
        let method = naming::method_name(command.name());
        let (table, slot) = match target {
            Target::Search => {
                let found = self.inner.stack.borrow().find(&method);
                let Some(slot) = found else {
                    return self.unhandled(command);
                };
                (Rc::clone(slot.table()), Some(slot))
            }
            Target::Slot(slot) => (Rc::clone(slot.table()), Some(slot.clone())),
            Target::Type(table) => (Rc::clone(table), None),
        };

        tracing::debug!(
            command = command.name(),
            env = table.type_name(),
            "resolved handler"
        );
        let _context = context::enter(self.clone(), Rc::clone(command));
        table
            .invoke(slot.as_ref().map(EnvSlot::instance), &method, command)
            .unwrap_or_else(|| {
                Err(RuntimeError::NoSuchHandler {
                    type_name: table.type_name(),
                    method,
                })
            })
    }

    fn unhandled(&self, command: &Command) -> DispatchResult {
        match self.inner.config.unhandled {
            UnhandledPolicy::Ignore => {
                tracing::trace!(command = command.name(), "no handler, ignored");
                Ok(None)
            }
            UnhandledPolicy::Warn => {
                tracing::warn!(
                    command = command.name(),
                    stack = ?self.stack_type_names(),
                    "no handler, ignored"
                );
                Ok(None)
            }
            UnhandledPolicy::Error => Err(RuntimeError::UnhandledCommand {
                name: command.name().to_owned(),
            }),
        }
    }

    fn enter_nesting(&self) -> Result<NestingGuard<'_>, RuntimeError> {
        let depth = self.inner.depth.get();
        if let Some(limit) = self.inner.config.max_nesting_depth {
            if depth >= limit {
                return Err(RuntimeError::NestingLimitExceeded { limit });
            }
        }
        self.inner.depth.set(depth + 1);
        Ok(NestingGuard {
            depth: &self.inner.depth,
        })
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stack = match self.inner.stack.try_borrow() {
            Ok(stack) => stack.type_names(),
            Err(_) => Vec::new(),
        };
        f.debug_struct("Runtime")
            .field("stack", &stack)
            .field("middleware", &self.inner.middleware.len())
            .field("depth", &self.inner.depth.get())
            .field("config", &self.inner.config)
            .finish()
    }
}

/// Decrements the nesting depth on drop.
struct NestingGuard<'a> {
    depth: &'a Cell<usize>,
}

impl Drop for NestingGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

/// Runs `on_end` if the run unwinds before [`EndGuard::finish`].
struct EndGuard<'a> {
    runtime: &'a Runtime,
    armed: bool,
}

impl EndGuard<'_> {
    fn finish(mut self) -> Result<(), RuntimeError> {
        self.armed = false;
        self.runtime.notify_lifecycle(ON_END)
    }
}

impl Drop for EndGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(err) = self.runtime.notify_lifecycle(ON_END) {
                tracing::warn!(error = %err, "on_end failed while unwinding");
            }
        }
    }
}
