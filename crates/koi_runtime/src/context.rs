//! Ambient execution context.
//!
//! While a handler runs, the runtime and the command being handled are
//! reachable from free functions ([`current_runtime`], [`current_command`],
//! [`env_enter`], [`env_exit`]). The context is per thread and scoped to one
//! handler invocation: entering saves the previous frame and the guard puts
//! it back when the invocation ends, so nested dispatches see their own
//! command and the outer handler sees its own again afterwards.

use std::cell::RefCell;
use std::rc::Rc;

use koi_ir::Command;

use crate::environment::{EnvHandle, Environment};
use crate::errors::RuntimeError;
use crate::runtime::Runtime;

#[derive(Clone)]
struct Frame {
    runtime: Runtime,
    command: Rc<Command>,
}

thread_local! {
    static CURRENT: RefCell<Option<Frame>> = const { RefCell::new(None) };
}

/// Restores the previous frame on drop, including during unwinding.
#[must_use = "the context is cleared as soon as the guard drops"]
pub(crate) struct ContextGuard {
    previous: Option<Frame>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        tracing::trace!(nested = previous.is_some(), "restoring execution context");
        // Thread-local storage may already be gone during thread teardown.
        let _ = CURRENT.try_with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Make `runtime` and `command` the ambient context until the guard drops.
pub(crate) fn enter(runtime: Runtime, command: Rc<Command>) -> ContextGuard {
    tracing::trace!(command = command.name(), "installing execution context");
    let previous = CURRENT.with(|slot| slot.replace(Some(Frame { runtime, command })));
    ContextGuard { previous }
}

fn with_frame<R>(f: impl FnOnce(&Frame) -> R) -> Result<R, RuntimeError> {
    CURRENT.with(|slot| slot.borrow().as_ref().map(f).ok_or(RuntimeError::NoActiveContext))
}

/// Whether a handler invocation is in progress on this thread.
pub fn is_active() -> bool {
    CURRENT.with(|slot| slot.borrow().is_some())
}

/// The runtime executing the current handler.
pub fn current_runtime() -> Result<Runtime, RuntimeError> {
    with_frame(|frame| frame.runtime.clone())
}

/// The command the current handler was invoked for.
pub fn current_command() -> Result<Rc<Command>, RuntimeError> {
    with_frame(|frame| Rc::clone(&frame.command))
}

/// Run `f` with the current runtime and command.
pub fn with_context<R>(f: impl FnOnce(&Runtime, &Command) -> R) -> Result<R, RuntimeError> {
    let (runtime, command) = with_frame(|frame| (frame.runtime.clone(), Rc::clone(&frame.command)))?;
    Ok(f(&runtime, &command))
}

/// Push `env` onto the current runtime's stack.
pub fn env_enter<E: Environment>(env: E) -> Result<EnvHandle<E>, RuntimeError> {
    Ok(current_runtime()?.env_enter(env))
}

/// Pop `env` from the current runtime's stack. `env` must be the top.
pub fn env_exit<E: Environment>(env: &E) -> Result<(), RuntimeError> {
    current_runtime()?.env_exit(env)
}
