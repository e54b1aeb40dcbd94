//! Mapping between command names and handler method names.
//!
//! Event commands (`@name`) resolve to `on_name`; every other command
//! resolves to `do_name`. The reverse mapping is used by the executor to
//! turn a method call back into a command.

use koi_ir::EVENT_SENTINEL;

pub const COMMAND_PREFIX: &str = "do_";
pub const EVENT_PREFIX: &str = "on_";

/// Lifecycle hook run before the first command of an execution.
pub const ON_START: &str = "on_start";
/// Lifecycle hook run after an execution, whatever its outcome.
pub const ON_END: &str = "on_end";

/// Handler method name for a command name.
pub fn method_name(command_name: &str) -> String {
    match command_name.strip_prefix(EVENT_SENTINEL) {
        Some(event) => format!("{EVENT_PREFIX}{event}"),
        None => format!("{COMMAND_PREFIX}{command_name}"),
    }
}

/// Command name for a handler method name, or `None` if the name has
/// neither prefix.
pub fn command_name(method_name: &str) -> Option<String> {
    if let Some(event) = method_name.strip_prefix(EVENT_PREFIX) {
        Some(format!("{EVENT_SENTINEL}{event}"))
    } else {
        method_name
            .strip_prefix(COMMAND_PREFIX)
            .map(ToOwned::to_owned)
    }
}
