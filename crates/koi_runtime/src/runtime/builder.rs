//! `RuntimeBuilder` and runtime configuration.

use super::Runtime;
use crate::environment::Environment;
use crate::middleware::Middleware;

/// Default bound on nested dispatches.
pub const DEFAULT_MAX_NESTING: usize = 256;

/// What to do with a command no environment handles.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnhandledPolicy {
    /// Skip it and return `Ok(None)`.
    #[default]
    Ignore,
    /// Skip it, logging a warning.
    Warn,
    /// Fail with `RuntimeError::UnhandledCommand`.
    Error,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub unhandled: UnhandledPolicy,
    /// Maximum number of dispatches in progress at once. `None` removes the
    /// bound; stack growth still applies.
    pub max_nesting_depth: Option<usize>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            unhandled: UnhandledPolicy::Ignore,
            max_nesting_depth: Some(DEFAULT_MAX_NESTING),
        }
    }
}

/// Builder for [`Runtime`].
///
/// Middleware runs in the order it is added: the first one added sees each
/// command first and its result last.
pub struct RuntimeBuilder<E> {
    root: E,
    middleware: Vec<Box<dyn Middleware>>,
    config: RuntimeConfig,
}

impl<E: Environment> RuntimeBuilder<E> {
    pub fn new(root: E) -> Self {
        Self {
            root,
            middleware: Vec::new(),
            config: RuntimeConfig::default(),
        }
    }

    #[must_use]
    pub fn middleware(mut self, middleware: impl Middleware + 'static) -> Self {
        self.middleware.push(Box::new(middleware));
        self
    }

    #[must_use]
    pub fn unhandled(mut self, policy: UnhandledPolicy) -> Self {
        self.config.unhandled = policy;
        self
    }

    #[must_use]
    pub fn max_nesting_depth(mut self, limit: Option<usize>) -> Self {
        self.config.max_nesting_depth = limit;
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Runtime {
        tracing::debug!(
            middleware = self.middleware.len(),
            config = ?self.config,
            "building runtime"
        );
        Runtime::assemble(self.root, self.middleware, self.config)
    }
}
