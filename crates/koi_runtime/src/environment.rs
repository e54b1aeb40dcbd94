//! Environments and the environment stack.
//!
//! An environment is a user type that owns handlers for some commands. The
//! runtime keeps a stack of live environment instances; the root sits at
//! the bottom and is never removed. Handlers push and pop nested
//! environments while they run, which changes how later commands resolve.
//!
//! # Architecture
//!
//! Each stack slot holds the instance behind `Rc<RefCell<_>>`, erased to
//! `dyn Any`, next to the shared [`HandlerTable`] of its type. Handlers borrow
//! their instance mutably only for the duration of the call, so a handler
//! can freely push, pop or dispatch while it runs. Removing a slot never
//! invalidates an instance that is mid-call: the caller holds its own clone
//! of the slot.

use std::any::{Any, TypeId};
use std::cell::{BorrowError, BorrowMutError, Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use crate::errors::RuntimeError;

mod table;

pub(crate) use table::ErasedTable;
pub use table::{HandlerTable, IntoOutput};

/// A type whose instances can live on the environment stack.
///
/// ```text
/// struct Section { lines: usize }
///
/// impl Environment for Section {
///     fn register(table: &mut HandlerTable<Self>) {
///         table
///             .event("text", Signature::with_params([Param::required("line")]), |env, _| {
///                 env.lines += 1;
///                 Ok(())
///             })
///             .command("end", Signature::new(), |env, _| env_exit(env));
///     }
/// }
/// ```
pub trait Environment: Sized + 'static {
    /// Declare this type's handlers.
    fn register(table: &mut HandlerTable<Self>);
}

/// Last path segment of the type name, for messages.
pub(crate) fn short_type_name<E: 'static>() -> &'static str {
    let full = std::any::type_name::<E>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// Shared handle to an environment instance.
///
/// Holding a handle keeps the instance alive after it leaves the stack.
/// Borrowing follows `RefCell` rules: do not hold a borrow across a dispatch
/// that may run one of the instance's handlers.
pub struct EnvHandle<E> {
    cell: Rc<RefCell<E>>,
}

impl<E> EnvHandle<E> {
    #[inline]
    pub fn borrow(&self) -> Ref<'_, E> {
        self.cell.borrow()
    }

    #[inline]
    pub fn borrow_mut(&self) -> RefMut<'_, E> {
        self.cell.borrow_mut()
    }

    pub fn try_borrow(&self) -> Result<Ref<'_, E>, BorrowError> {
        self.cell.try_borrow()
    }

    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, E>, BorrowMutError> {
        self.cell.try_borrow_mut()
    }

    /// Whether both handles refer to the same instance.
    #[inline]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }
}

impl<E> Clone for EnvHandle<E> {
    fn clone(&self) -> Self {
        EnvHandle {
            cell: Rc::clone(&self.cell),
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for EnvHandle<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.try_borrow() {
            Ok(env) => f.debug_tuple("EnvHandle").field(&*env).finish(),
            Err(_) => f.write_str("EnvHandle(<borrowed>)"),
        }
    }
}

/// One entry of the stack: an erased instance and its handler table.
#[derive(Clone)]
pub(crate) struct EnvSlot {
    instance: Rc<dyn Any>,
    table: Rc<dyn ErasedTable>,
    type_id: TypeId,
    /// Address of the instance inside its cell, for identity checks.
    data: *const (),
}

impl EnvSlot {
    pub(crate) fn new<E: Environment>(env: E, table: Rc<dyn ErasedTable>) -> (Self, EnvHandle<E>) {
        let cell = Rc::new(RefCell::new(env));
        let data = cell.as_ptr().cast_const().cast::<()>();
        let instance: Rc<dyn Any> = Rc::clone(&cell) as Rc<dyn Any>;
        let slot = EnvSlot {
            instance,
            table,
            type_id: TypeId::of::<E>(),
            data,
        };
        (slot, EnvHandle { cell })
    }

    #[inline]
    pub(crate) fn type_name(&self) -> &'static str {
        self.table.type_name()
    }

    #[inline]
    pub(crate) fn table(&self) -> &Rc<dyn ErasedTable> {
        &self.table
    }

    #[inline]
    pub(crate) fn instance(&self) -> &dyn Any {
        &*self.instance
    }

    #[inline]
    pub(crate) fn is<E: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<E>()
    }

    /// Whether `env` is this slot's instance.
    pub(crate) fn holds<E: 'static>(&self, env: &E) -> bool {
        self.is::<E>() && std::ptr::eq(self.data, std::ptr::from_ref(env).cast::<()>())
    }

    pub(crate) fn handle<E: 'static>(&self) -> Option<EnvHandle<E>> {
        Rc::clone(&self.instance)
            .downcast::<RefCell<E>>()
            .ok()
            .map(|cell| EnvHandle { cell })
    }
}

impl fmt::Debug for EnvSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("EnvSlot").field(&self.type_name()).finish()
    }
}

/// Stack of live environments, innermost last.
///
/// Never empty: index 0 is the root for the whole lifetime of the runtime.
#[derive(Debug)]
pub(crate) struct EnvStack {
    slots: Vec<EnvSlot>,
}

impl EnvStack {
    pub(crate) fn new(root: EnvSlot) -> Self {
        EnvStack { slots: vec![root] }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn push(&mut self, slot: EnvSlot) {
        self.slots.push(slot);
    }

    /// Remove `env`, which must be the top instance and not the root.
    ///
    /// On mismatch the stack is left untouched.
    pub(crate) fn pop<E: Environment>(&mut self, env: &E) -> Result<EnvSlot, RuntimeError> {
        let removable = self.slots.len() > 1 && self.slots.last().is_some_and(|top| top.holds(env));
        if removable {
            if let Some(slot) = self.slots.pop() {
                return Ok(slot);
            }
        }
        Err(RuntimeError::StackMismatch {
            expected: short_type_name::<E>(),
            top: self.slots.last().map_or("<empty>", EnvSlot::type_name),
        })
    }

    /// Innermost slot whose table has `method`.
    pub(crate) fn find(&self, method: &str) -> Option<EnvSlot> {
        self.slots
            .iter()
            .rev()
            .find(|slot| slot.table.contains(method))
            .cloned()
    }

    /// Slots holding an `E`, bottom to top.
    pub(crate) fn matches<E: 'static>(&self) -> SmallVec<[EnvSlot; 4]> {
        self.slots.iter().filter(|s| s.is::<E>()).cloned().collect()
    }

    /// Copy of the stack, bottom to top.
    pub(crate) fn snapshot(&self) -> Vec<EnvSlot> {
        self.slots.clone()
    }

    pub(crate) fn get(&self, index: usize) -> Option<&EnvSlot> {
        self.slots.get(index)
    }

    pub(crate) fn type_names(&self) -> Vec<&'static str> {
        self.slots.iter().map(EnvSlot::type_name).collect()
    }
}

#[cfg(test)]
mod tests;
