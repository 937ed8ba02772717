use std::fmt::Display;
use std::sync::Arc;

/// Leveled logging handle passed to every task invocation.
///
/// Events go through `tracing` with a `scope` field, so the subscriber the
/// binary installs decides where they end up.
#[derive(Debug, Clone)]
pub struct Logger {
    scope: Arc<str>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new("chapipe")
    }
}

impl Logger {
    pub fn new(scope: impl AsRef<str>) -> Self {
        Self {
            scope: Arc::from(scope.as_ref()),
        }
    }

    /// A child logger whose scope is `parent/name`.
    pub fn scoped(&self, name: &str) -> Self {
        Self::new(format!("{}/{}", self.scope, name))
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn debug(&self, msg: impl Display) {
        tracing::debug!(scope = %self.scope, "{}", msg);
    }

    pub fn info(&self, msg: impl Display) {
        tracing::info!(scope = %self.scope, "{}", msg);
    }

    pub fn warn(&self, msg: impl Display) {
        tracing::warn!(scope = %self.scope, "{}", msg);
    }

    pub fn error(&self, msg: impl Display) {
        tracing::error!(scope = %self.scope, "{}", msg);
    }
}
