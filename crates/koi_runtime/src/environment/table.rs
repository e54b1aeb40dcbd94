//! Per-type handler tables.
//!
//! An environment type declares its handlers once, in
//! [`Environment::register`](super::Environment::register). The runtime
//! builds the table the first time it sees the type and shares it between
//! every instance of that type on the stack.
//!
//! Handlers come in three borrow modes:
//!
//! - **Exclusive** (`command`, `event`): `&mut E` for the whole call. A nested
//!   dispatch that lands on the same instance fails with `EnvironmentBusy`.
//! - **Shared** (`command_ref`, `event_ref`): `&E` for the whole call. Nested
//!   dispatches may reach other shared handlers of the same instance, so
//!   state they change lives in `Cell`/`RefCell` fields.
//! - **Static** (`static_command`, `static_event`): no instance at all.

use std::any::Any;
use std::cell::RefCell;

use koi_ir::{Command, Value};
use rustc_hash::FxHashMap;

use crate::errors::{DispatchResult, RuntimeError};
use crate::naming::{COMMAND_PREFIX, EVENT_PREFIX, ON_END, ON_START};
use crate::signature::{Arguments, Signature};

use super::{short_type_name, Environment};

/// Values a handler may return.
pub trait IntoOutput {
    fn into_output(self) -> Option<Value>;
}

impl IntoOutput for () {
    fn into_output(self) -> Option<Value> {
        None
    }
}

impl IntoOutput for Value {
    fn into_output(self) -> Option<Value> {
        Some(self)
    }
}

impl IntoOutput for Option<Value> {
    fn into_output(self) -> Option<Value> {
        self
    }
}

type InstanceFn<E> = Box<dyn Fn(&mut E, &Arguments) -> DispatchResult>;
type SharedFn<E> = Box<dyn Fn(&E, &Arguments) -> DispatchResult>;
type StaticFn = Box<dyn Fn(&Arguments) -> DispatchResult>;

enum HandlerFn<E> {
    /// Needs the live instance, borrowed mutably for the call.
    Instance(InstanceFn<E>),
    /// Needs the live instance, borrowed immutably for the call.
    Shared(SharedFn<E>),
    /// Callable without an instance.
    Static(StaticFn),
}

struct HandlerEntry<E> {
    signature: Signature,
    handler: HandlerFn<E>,
}

/// Handlers of one environment type, keyed by method name.
///
/// Registering a name twice keeps the later handler.
pub struct HandlerTable<E> {
    type_name: &'static str,
    entries: FxHashMap<String, HandlerEntry<E>>,
}

impl<E: Environment> HandlerTable<E> {
    pub(crate) fn build() -> Self {
        let mut table = HandlerTable {
            type_name: short_type_name::<E>(),
            entries: FxHashMap::default(),
        };
        E::register(&mut table);
        tracing::debug!(
            env = table.type_name,
            handlers = table.entries.len(),
            "built handler table"
        );
        table
    }

    /// Handle the command `name` as `do_<name>`.
    pub fn command<F, R>(&mut self, name: &str, signature: Signature, handler: F) -> &mut Self
    where
        F: Fn(&mut E, &Arguments) -> Result<R, RuntimeError> + 'static,
        R: IntoOutput,
    {
        self.insert_instance(format!("{COMMAND_PREFIX}{name}"), signature, handler)
    }

    /// Handle the event `@<name>` as `on_<name>`.
    pub fn event<F, R>(&mut self, name: &str, signature: Signature, handler: F) -> &mut Self
    where
        F: Fn(&mut E, &Arguments) -> Result<R, RuntimeError> + 'static,
        R: IntoOutput,
    {
        self.insert_instance(format!("{EVENT_PREFIX}{name}"), signature, handler)
    }

    /// Handle the command `name` as `do_<name>` through a shared borrow.
    ///
    /// The handler may dispatch commands that come back to this instance,
    /// as long as they also resolve to shared handlers.
    pub fn command_ref<F, R>(&mut self, name: &str, signature: Signature, handler: F) -> &mut Self
    where
        F: Fn(&E, &Arguments) -> Result<R, RuntimeError> + 'static,
        R: IntoOutput,
    {
        self.insert_shared(format!("{COMMAND_PREFIX}{name}"), signature, handler)
    }

    /// Shared-borrow counterpart of [`HandlerTable::event`].
    pub fn event_ref<F, R>(&mut self, name: &str, signature: Signature, handler: F) -> &mut Self
    where
        F: Fn(&E, &Arguments) -> Result<R, RuntimeError> + 'static,
        R: IntoOutput,
    {
        self.insert_shared(format!("{EVENT_PREFIX}{name}"), signature, handler)
    }

    /// A `do_<name>` handler that does not need an instance. It stays
    /// reachable through [`Executor::env`](crate::Executor::env) even when
    /// no instance of the type is on the stack.
    pub fn static_command<F, R>(
        &mut self,
        name: &str,
        signature: Signature,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(&Arguments) -> Result<R, RuntimeError> + 'static,
        R: IntoOutput,
    {
        self.entries.insert(
            format!("{COMMAND_PREFIX}{name}"),
            HandlerEntry {
                signature,
                handler: HandlerFn::Static(Box::new(move |args: &Arguments| {
                    handler(args).map(IntoOutput::into_output)
                })),
            },
        );
        self
    }

    /// Static counterpart of [`HandlerTable::event`].
    pub fn static_event<F, R>(&mut self, name: &str, signature: Signature, handler: F) -> &mut Self
    where
        F: Fn(&Arguments) -> Result<R, RuntimeError> + 'static,
        R: IntoOutput,
    {
        self.entries.insert(
            format!("{EVENT_PREFIX}{name}"),
            HandlerEntry {
                signature,
                handler: HandlerFn::Static(Box::new(move |args: &Arguments| {
                    handler(args).map(IntoOutput::into_output)
                })),
            },
        );
        self
    }

    /// Hook run before the first command of every execution.
    pub fn on_start<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut E) -> Result<(), RuntimeError> + 'static,
    {
        self.insert_instance(ON_START.to_owned(), Signature::new(), move |env, _| hook(env))
    }

    /// Hook run after every execution, including failed ones.
    pub fn on_end<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&mut E) -> Result<(), RuntimeError> + 'static,
    {
        self.insert_instance(ON_END.to_owned(), Signature::new(), move |env, _| hook(env))
    }

    fn insert_instance<F, R>(&mut self, method: String, signature: Signature, handler: F) -> &mut Self
    where
        F: Fn(&mut E, &Arguments) -> Result<R, RuntimeError> + 'static,
        R: IntoOutput,
    {
        self.entries.insert(
            method,
            HandlerEntry {
                signature,
                handler: HandlerFn::Instance(Box::new(move |env: &mut E, args: &Arguments| {
                    handler(env, args).map(IntoOutput::into_output)
                })),
            },
        );
        self
    }

    fn insert_shared<F, R>(&mut self, method: String, signature: Signature, handler: F) -> &mut Self
    where
        F: Fn(&E, &Arguments) -> Result<R, RuntimeError> + 'static,
        R: IntoOutput,
    {
        self.entries.insert(
            method,
            HandlerEntry {
                signature,
                handler: HandlerFn::Shared(Box::new(move |env: &E, args: &Arguments| {
                    handler(env, args).map(IntoOutput::into_output)
                })),
            },
        );
        self
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn call(
        &self,
        entry: &HandlerEntry<E>,
        instance: Option<&dyn Any>,
        method: &str,
        command: &Command,
    ) -> DispatchResult {
        let args = entry.signature.bind(method, command)?;
        match &entry.handler {
            HandlerFn::Static(handler) => handler(&args),
            HandlerFn::Instance(handler) => {
                let mut env = self
                    .cell(instance)?
                    .try_borrow_mut()
                    .map_err(|_| self.busy())?;
                handler(&mut *env, &args)
            }
            HandlerFn::Shared(handler) => {
                let env = self.cell(instance)?.try_borrow().map_err(|_| self.busy())?;
                handler(&*env, &args)
            }
        }
    }

    fn cell<'a>(&self, instance: Option<&'a dyn Any>) -> Result<&'a RefCell<E>, RuntimeError> {
        instance
            .and_then(|any| any.downcast_ref::<RefCell<E>>())
            .ok_or(RuntimeError::EnvironmentNotFound {
                type_name: self.type_name,
                index: None,
            })
    }

    fn busy(&self) -> RuntimeError {
        RuntimeError::EnvironmentBusy {
            type_name: self.type_name,
        }
    }
}

/// Type-erased view of a [`HandlerTable`], as stored on the stack.
pub(crate) trait ErasedTable {
    fn type_name(&self) -> &'static str;

    fn contains(&self, method: &str) -> bool;

    /// Bind and run `method`. `None` if the table has no such handler.
    fn invoke(
        &self,
        instance: Option<&dyn Any>,
        method: &str,
        command: &Command,
    ) -> Option<DispatchResult>;
}

impl<E: Environment> ErasedTable for HandlerTable<E> {
    fn type_name(&self) -> &'static str {
        self.type_name
    }

    fn contains(&self, method: &str) -> bool {
        self.entries.contains_key(method)
    }

    fn invoke(
        &self,
        instance: Option<&dyn Any>,
        method: &str,
        command: &Command,
    ) -> Option<DispatchResult> {
        let entry = self.entries.get(method)?;
        Some(self.call(entry, instance, method, command))
    }
}
