//! End-to-end dispatch scenarios against the public API.

#![allow(clippy::unwrap_used, clippy::expect_used, reason = "Tests can panic")]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use koi_runtime::{
    current_command, current_runtime, env_enter, env_exit, Command, Environment, Executor,
    HandlerTable, Param, Parameter, Runtime, RuntimeError, Signature, Value,
};
use pretty_assertions::assert_eq;

/// Root environment: counts `cmd` and opens `E` scopes.
#[derive(Default)]
struct R {
    counter: i64,
    checked: Option<String>,
}

impl Environment for R {
    fn register(table: &mut HandlerTable<Self>) {
        table
            .command(
                "cmd",
                Signature::with_params([Param::optional("cnt", 1)]),
                |env, args| {
                    env.counter += args.int("cnt")?;
                    Ok(())
                },
            )
            .static_command("enter", Signature::new(), |_| {
                env_enter(E::default())?;
                Ok(())
            })
            .command("check", Signature::new(), |env, _| {
                env.checked = Some(current_command()?.name().to_owned());
                Ok(())
            });
    }
}

/// Scope that swallows `cmd` until it is exited.
#[derive(Default)]
struct E {
    swallowed: usize,
}

impl Environment for E {
    fn register(table: &mut HandlerTable<Self>) {
        table
            .command("cmd", Signature::variadic(), |env, _| {
                env.swallowed += 1;
                Ok(())
            })
            .command("exit", Signature::new(), |env, _| env_exit(env));
    }
}

fn counter(runtime: &Runtime) -> i64 {
    runtime.root::<R>().unwrap().borrow().counter
}

#[test]
fn test_counter_accumulates() {
    let runtime = Runtime::new(R::default());
    runtime
        .execute([
            Command::bare("cmd"),
            Command::new("cmd", [Parameter::named("cnt", 2)]),
        ])
        .unwrap();
    assert_eq!(counter(&runtime), 3);
}

#[test]
fn test_entered_scope_shadows_root() {
    let runtime = Runtime::new(R::default());
    runtime
        .execute([Command::bare("cmd"), Command::bare("enter"), Command::bare("cmd")])
        .unwrap();

    assert_eq!(runtime.stack_type_names(), vec!["R", "E"]);
    assert_eq!(counter(&runtime), 1);
    assert_eq!(runtime.handle_at::<E>(1).unwrap().borrow().swallowed, 1);
}

#[test]
fn test_exit_restores_root() {
    let runtime = Runtime::new(R::default());
    runtime
        .execute([
            Command::bare("cmd"),
            Command::bare("enter"),
            Command::bare("cmd"),
            Command::bare("exit"),
            Command::bare("cmd"),
        ])
        .unwrap();

    assert_eq!(runtime.stack_type_names(), vec!["R"]);
    assert_eq!(counter(&runtime), 2);
}

#[test]
fn test_addressed_exit_by_ordinal() {
    let executor = Executor::new(R::default());
    executor
        .execute([Command::bare("enter"), Command::bare("enter")])
        .unwrap();
    let first = executor.handle_at::<E>(1).unwrap();
    let last = executor.handle_at::<E>(2).unwrap();

    let proxy = executor.env_at::<E>(-1).unwrap();
    assert!(proxy.handle().unwrap().ptr_eq(&last));
    assert!(executor.env_at::<E>(0).unwrap().handle().unwrap().ptr_eq(&first));

    // The first E is not on top, so it cannot leave yet.
    let err = executor
        .env_at::<E>(0)
        .unwrap()
        .invoke("do_exit", [])
        .unwrap_err();
    assert!(matches!(err, RuntimeError::StackMismatch { .. }));
    assert_eq!(executor.stack_len(), 3);

    proxy.invoke("do_exit", []).unwrap();
    executor.env_at::<E>(0).unwrap().invoke("do_exit", []).unwrap();
    assert_eq!(executor.stack_type_names(), vec!["R"]);
}

#[test]
fn test_current_command_inside_handler() {
    let runtime = Runtime::new(R::default());
    runtime.dispatch(Command::bare("check")).unwrap();
    assert_eq!(
        runtime.root::<R>().unwrap().borrow().checked.as_deref(),
        Some("check")
    );
}

#[test]
fn test_lifecycle_brackets_handlers() {
    type Log = Rc<RefCell<Vec<&'static str>>>;

    struct Hooked {
        log: Log,
    }

    impl Environment for Hooked {
        fn register(table: &mut HandlerTable<Self>) {
            table
                .on_start(|env| {
                    env.log.borrow_mut().push("start");
                    Ok(())
                })
                .on_end(|env| {
                    env.log.borrow_mut().push("end");
                    Ok(())
                })
                .command("boom", Signature::new(), |env, _| -> Result<(), RuntimeError> {
                    env.log.borrow_mut().push("boom");
                    Err(RuntimeError::msg("boom"))
                });
        }
    }

    let log = Log::default();
    let runtime = Runtime::new(Hooked {
        log: Rc::clone(&log),
    });
    let err = runtime
        .execute([Command::bare("boom"), Command::bare("boom")])
        .unwrap_err();

    assert_eq!(err.to_string(), "boom");
    assert_eq!(*log.borrow(), vec!["start", "boom", "end"]);
}

#[test]
fn test_text_and_annotation_events() {
    #[derive(Default)]
    struct Doc {
        lines: Vec<String>,
    }

    impl Environment for Doc {
        fn register(table: &mut HandlerTable<Self>) {
            table
                .event("text", Signature::with_params([Param::required("body")]), |env, args| {
                    env.lines.push(args.str("body")?.to_owned());
                    Ok(())
                })
                .event("annotation", Signature::variadic(), |env, args| {
                    let body = args.rest().first().and_then(Value::as_str).unwrap_or("");
                    env.lines.push(format!("# {body}"));
                    Ok(())
                });
        }
    }

    let runtime = Runtime::new(Doc::default());
    runtime
        .execute([
            Command::text("hello"),
            Command::annotation("note"),
            Command::text("world"),
        ])
        .unwrap();

    assert_eq!(
        runtime.root::<Doc>().unwrap().borrow().lines,
        vec!["hello", "# note", "world"]
    );
}

#[test]
fn test_handler_reuses_own_commands() {
    #[derive(Default)]
    struct Macro {
        counter: Cell<i64>,
    }

    impl Environment for Macro {
        fn register(table: &mut HandlerTable<Self>) {
            table
                .command_ref(
                    "cmd",
                    Signature::with_params([Param::optional("cnt", 1)]),
                    |env, args| {
                        env.counter.set(env.counter.get() + args.int("cnt")?);
                        Ok(())
                    },
                )
                .command_ref("twice", Signature::new(), |_, _| {
                    let runtime = current_runtime()?;
                    runtime.dispatch(Command::bare("cmd"))?;
                    runtime.dispatch(Command::new("cmd", [Parameter::named("cnt", 5)]))
                });
        }
    }

    let runtime = Runtime::new(Macro::default());
    runtime
        .execute([Command::bare("twice"), Command::bare("cmd")])
        .unwrap();
    assert_eq!(runtime.root::<Macro>().unwrap().borrow().counter.get(), 7);
}
