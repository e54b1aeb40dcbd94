//! Method-call style invocation on top of the runtime.
//!
//! [`Executor::invoke`] turns a handler method name back into a command and
//! dispatches it normally, so `executor.invoke("do_cmd", ..)` behaves exactly
//! like the command `cmd` arriving from a source. [`Executor::env`] and
//! [`Executor::env_at`] address one environment on the stack directly and
//! skip the stack search, while still running the middleware chain.

use std::marker::PhantomData;
use std::ops::Deref;
use std::rc::Rc;

use koi_ir::{Command, Parameter};

use crate::environment::{short_type_name, EnvHandle, EnvSlot, Environment, ErasedTable};
use crate::errors::{DispatchResult, RuntimeError};
use crate::naming;
use crate::runtime::{Runtime, RuntimeBuilder, Target};

/// A [`Runtime`] with method-call helpers. Derefs to the runtime.
#[derive(Clone, Debug)]
pub struct Executor {
    runtime: Runtime,
}

impl Executor {
    pub fn new<E: Environment>(root: E) -> Self {
        Runtime::new(root).into()
    }

    /// Builder for the underlying runtime; convert the result with `.into()`.
    pub fn builder<E: Environment>(root: E) -> RuntimeBuilder<E> {
        RuntimeBuilder::new(root)
    }

    #[inline]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn into_runtime(self) -> Runtime {
        self.runtime
    }

    /// Dispatch the command a handler method name stands for.
    pub fn invoke(
        &self,
        method: &str,
        params: impl IntoIterator<Item = Parameter>,
    ) -> DispatchResult {
        let command = synthesize(method, params)?;
        self.runtime.dispatch(command)
    }

    /// Proxy for the top-most `E` on the stack, or for the type itself when
    /// there is none. A type-level proxy can only run static handlers.
    pub fn env<E: Environment>(&self) -> EnvProxy<E> {
        match self.runtime.slots_of::<E>().pop() {
            Some(slot) => EnvProxy::for_slot(self.runtime.clone(), slot),
            None => EnvProxy::for_type(self.runtime.clone()),
        }
    }

    /// Proxy for the `index`-th `E` on the stack, counting from the bottom.
    /// Negative indices count from the top: `-1` is the top-most `E`.
    pub fn env_at<E: Environment>(&self, index: isize) -> Result<EnvProxy<E>, RuntimeError> {
        let matches = self.runtime.slots_of::<E>();
        let slot = resolve_index(matches.len(), index)
            .and_then(|i| matches.get(i))
            .ok_or(RuntimeError::EnvironmentNotFound {
                type_name: short_type_name::<E>(),
                index: Some(index),
            })?;
        Ok(EnvProxy::for_slot(self.runtime.clone(), slot.clone()))
    }
}

impl Deref for Executor {
    type Target = Runtime;

    fn deref(&self) -> &Runtime {
        &self.runtime
    }
}

impl From<Runtime> for Executor {
    fn from(runtime: Runtime) -> Self {
        Executor { runtime }
    }
}

/// Calls addressed to one environment instance, or to an environment type.
pub struct EnvProxy<E> {
    runtime: Runtime,
    slot: Option<EnvSlot>,
    table: Rc<dyn ErasedTable>,
    _env: PhantomData<fn() -> E>,
}

impl<E: Environment> EnvProxy<E> {
    fn for_slot(runtime: Runtime, slot: EnvSlot) -> Self {
        let table = Rc::clone(slot.table());
        EnvProxy {
            runtime,
            slot: Some(slot),
            table,
            _env: PhantomData,
        }
    }

    fn for_type(runtime: Runtime) -> Self {
        let table = runtime.table_for::<E>();
        EnvProxy {
            runtime,
            slot: None,
            table,
            _env: PhantomData,
        }
    }

    /// Whether the proxy is bound to an instance rather than the type.
    #[inline]
    pub fn is_instance(&self) -> bool {
        self.slot.is_some()
    }

    /// Dispatch `method` to this target only, through the middleware chain.
    pub fn invoke(
        &self,
        method: &str,
        params: impl IntoIterator<Item = Parameter>,
    ) -> DispatchResult {
        let command = synthesize(method, params)?;
        if !self.table.contains(method) {
            return Err(RuntimeError::NoSuchHandler {
                type_name: self.table.type_name(),
                method: method.to_owned(),
            });
        }
        let target = match &self.slot {
            Some(slot) => Target::Slot(slot.clone()),
            None => Target::Type(Rc::clone(&self.table)),
        };
        self.runtime.dispatch_to(Rc::new(command), target)
    }

    /// Handle to the bound instance.
    pub fn handle(&self) -> Result<EnvHandle<E>, RuntimeError> {
        self.slot
            .as_ref()
            .and_then(EnvSlot::handle::<E>)
            .ok_or(RuntimeError::EnvironmentNotFound {
                type_name: self.table.type_name(),
                index: None,
            })
    }

    /// Read the bound instance.
    pub fn with<R>(&self, f: impl FnOnce(&E) -> R) -> Result<R, RuntimeError> {
        let handle = self.handle()?;
        let env = handle.try_borrow().map_err(|_| self.busy())?;
        Ok(f(&*env))
    }

    /// Mutate the bound instance outside any handler.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut E) -> R) -> Result<R, RuntimeError> {
        let handle = self.handle()?;
        let mut env = handle.try_borrow_mut().map_err(|_| self.busy())?;
        Ok(f(&mut *env))
    }

    fn busy(&self) -> RuntimeError {
        RuntimeError::EnvironmentBusy {
            type_name: self.table.type_name(),
        }
    }
}

/// Command for a handler method name: `do_x` -> `x`, `on_x` -> `@x`.
fn synthesize(
    method: &str,
    params: impl IntoIterator<Item = Parameter>,
) -> Result<Command, RuntimeError> {
    let name = naming::command_name(method).ok_or_else(|| RuntimeError::InvalidHandlerName {
        name: method.to_owned(),
    })?;
    Ok(Command::new(name, params))
}

/// Position in a list of `len` items; negative indices count from the end.
fn resolve_index(len: usize, index: isize) -> Option<usize> {
    if index >= 0 {
        usize::try_from(index).ok().filter(|&i| i < len)
    } else {
        len.checked_sub(index.unsigned_abs())
    }
}
