#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use super::*;
use crate::signature::{Param, Signature};
use koi_ir::{Command, Parameter, Value};
use pretty_assertions::assert_eq;

#[derive(Debug, Default)]
struct Root {
    seen: i64,
}

impl Environment for Root {
    fn register(table: &mut HandlerTable<Self>) {
        table
            .command("cmd", Signature::with_params([Param::optional("cnt", 1)]), |env, args| {
                env.seen += args.int("cnt")?;
                Ok(())
            })
            .static_command("ping", Signature::new(), |_| Ok(Value::from("pong")));
    }
}

#[derive(Debug, Default)]
struct Child {
    depth: usize,
}

impl Environment for Child {
    fn register(table: &mut HandlerTable<Self>) {
        table.command("cmd", Signature::new(), |env, _| {
            env.depth += 1;
            Ok(())
        });
    }
}

fn slot<E: Environment>(env: E) -> (EnvSlot, EnvHandle<E>) {
    let table: Rc<dyn ErasedTable> = Rc::new(HandlerTable::<E>::build());
    EnvSlot::new(env, table)
}

#[test]
fn test_short_type_name() {
    assert_eq!(short_type_name::<Root>(), "Root");
    assert_eq!(short_type_name::<Vec<Root>>(), "Vec");
}

#[test]
fn test_table_method_names() {
    let table = HandlerTable::<Root>::build();
    assert_eq!(table.method_names(), vec!["do_cmd", "do_ping"]);
    assert!(table.contains("do_cmd"));
    assert!(!table.contains("on_text"));
}

#[test]
fn test_invoke_binds_and_mutates() {
    let (root, handle) = slot(Root::default());
    let cmd = Command::new("cmd", [Parameter::positional(5)]);
    let result = root.table().invoke(Some(root.instance()), "do_cmd", &cmd);
    assert!(matches!(result, Some(Ok(None))));
    assert_eq!(handle.borrow().seen, 5);
}

#[test]
fn test_invoke_missing_handler() {
    let (root, _) = slot(Root::default());
    assert!(root
        .table()
        .invoke(Some(root.instance()), "do_nothing", &Command::bare("nothing"))
        .is_none());
}

#[test]
fn test_static_handler_needs_no_instance() {
    let table = HandlerTable::<Root>::build();
    let result = table.invoke(None, "do_ping", &Command::bare("ping"));
    assert_eq!(result.unwrap().unwrap(), Some(Value::from("pong")));
}

#[test]
fn test_instance_handler_without_instance() {
    let table = HandlerTable::<Root>::build();
    let result = table.invoke(None, "do_cmd", &Command::bare("cmd")).unwrap();
    assert!(matches!(
        result,
        Err(RuntimeError::EnvironmentNotFound {
            type_name: "Root",
            index: None
        })
    ));
}

#[test]
fn test_busy_instance() {
    let (root, handle) = slot(Root::default());
    let _guard = handle.borrow_mut();
    let result = root
        .table()
        .invoke(Some(root.instance()), "do_cmd", &Command::bare("cmd"))
        .unwrap();
    assert!(matches!(
        result,
        Err(RuntimeError::EnvironmentBusy { type_name: "Root" })
    ));
}

#[test]
fn test_stack_find_prefers_top() {
    let (root, _) = slot(Root::default());
    let (child, _) = slot(Child::default());
    let mut stack = EnvStack::new(root);
    stack.push(child);

    assert_eq!(stack.find("do_cmd").unwrap().type_name(), "Child");
    assert_eq!(stack.find("do_ping").unwrap().type_name(), "Root");
    assert!(stack.find("on_text").is_none());
}

#[test]
fn test_pop_by_identity() {
    let (root, _) = slot(Root::default());
    let (child, child_handle) = slot(Child::default());
    let mut stack = EnvStack::new(root);
    stack.push(child);

    let popped = stack.pop(&*child_handle.borrow()).unwrap();
    assert!(popped.is::<Child>());
    assert_eq!(stack.len(), 1);
}

#[test]
fn test_pop_wrong_instance_leaves_stack() {
    let (root, _) = slot(Root::default());
    let (child, _) = slot(Child::default());
    let (_, stranger) = slot(Child::default());
    let mut stack = EnvStack::new(root);
    stack.push(child);

    let err = stack.pop(&*stranger.borrow()).unwrap_err();
    assert!(matches!(
        err,
        RuntimeError::StackMismatch {
            expected: "Child",
            top: "Child"
        }
    ));
    assert_eq!(stack.type_names(), vec!["Root", "Child"]);
}

#[test]
fn test_root_cannot_be_popped() {
    let (root, root_handle) = slot(Root::default());
    let mut stack = EnvStack::new(root);
    assert!(stack.pop(&*root_handle.borrow()).is_err());
    assert_eq!(stack.len(), 1);
}

#[test]
fn test_matches_and_handles() {
    let (root, _) = slot(Root::default());
    let (a, a_handle) = slot(Child::default());
    let (b, _) = slot(Child::default());
    let mut stack = EnvStack::new(root);
    stack.push(a);
    stack.push(b);

    let matches = stack.matches::<Child>();
    assert_eq!(matches.len(), 2);
    assert!(matches[0].handle::<Child>().unwrap().ptr_eq(&a_handle));
    assert!(matches[0].handle::<Root>().is_none());
    assert!(stack.get(0).unwrap().is::<Root>());
}
