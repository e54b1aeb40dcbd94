//! Command dispatch runtime for KoiLang.
//!
//! A KoiLang document is a flat stream of commands; this crate gives the
//! stream meaning. User types implement [`Environment`] and declare handlers
//! for the commands they understand. A [`Runtime`] keeps a stack of live
//! environments and routes every command to the innermost environment that
//! handles it, so pushing an environment scopes the commands that follow.
//!
//! # Modules
//!
//! - [`environment`]: the `Environment` trait, handler tables, handles
//! - [`signature`]: handler signatures and argument binding
//! - [`runtime`]: the dispatch engine, its builder and configuration
//! - [`middleware`]: the chain every command passes through
//! - [`context`]: ambient access to the active runtime and command
//! - [`executor`]: method-call style and addressed invocation
//!
//! # Example
//!
//! ```text
//! struct Counter { count: i64 }
//!
//! impl Environment for Counter {
//!     fn register(table: &mut HandlerTable<Self>) {
//!         table.command("cmd", Signature::with_params([Param::optional("cnt", 1)]), |env, args| {
//!             env.count += args.int("cnt")?;
//!             Ok(())
//!         });
//!     }
//! }
//!
//! let runtime = Runtime::new(Counter { count: 0 });
//! runtime.execute([Command::bare("cmd"), Command::new("cmd", [Parameter::named("cnt", 2)])])?;
//! assert_eq!(runtime.root::<Counter>().unwrap().borrow().count, 3);
//! ```

use std::sync::Once;

pub mod context;
pub mod environment;
pub mod errors;
pub mod executor;
pub mod middleware;
pub mod naming;
pub mod runtime;
pub mod signature;

pub use context::{current_command, current_runtime, env_enter, env_exit, is_active, with_context};
pub use environment::{EnvHandle, Environment, HandlerTable, IntoOutput};
pub use errors::{ArgumentError, BoxError, DispatchResult, RuntimeError};
pub use executor::{EnvProxy, Executor};
pub use middleware::{from_fn, Middleware, Next, TraceCommands, Transcribe};
pub use runtime::{Runtime, RuntimeBuilder, RuntimeConfig, UnhandledPolicy, DEFAULT_MAX_NESTING};
pub use signature::{Arguments, Param, ParamKind, Signature};

pub use koi_ir::{Command, Parameter, Scalar, Value};

static TRACING_INIT: Once = Once::new();

/// Install a tracing subscriber filtered by `RUST_LOG`.
///
/// Does nothing unless `RUST_LOG` is set. With `KOI_LOG_TREE` set as well,
/// spans render as an indented tree, which follows nested dispatch more
/// easily than flat lines. Safe to call more than once.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        if std::env::var("RUST_LOG").is_err() {
            return;
        }
        let filter = EnvFilter::from_default_env();
        let registry = tracing_subscriber::registry().with(filter);
        // Another subscriber may already be installed; keep it.
        let _ = if std::env::var_os("KOI_LOG_TREE").is_some() {
            registry
                .with(tracing_tree::HierarchicalLayer::new(2).with_targets(true))
                .try_init()
        } else {
            registry
                .with(fmt::layer().with_target(true).with_level(true))
                .try_init()
        };
    });
}
