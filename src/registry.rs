use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::task::{Records, Run, Task};
use crate::transforms::Builtin;
use regex::Regex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

static TASK_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]+$").expect("task name pattern compiles"));

/// Name -> task table.
///
/// Empty when created, grows through [`Registry::register`], never shrinks.
/// Pipelines take an immutable [`Registry::snapshot`] when they start, so
/// registering afterwards never changes a pipeline already in flight.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    tasks: HashMap<String, Task>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `task` under `name`, replacing any previous entry.
    ///
    /// Names must be addressable by an expression: ASCII letters, digits
    /// and `_`. Any other name could never be dispatched, so it is refused
    /// with [`Error::InvalidTaskRegistration`] instead of being stored. A
    /// name that collides with a builtin transform is accepted but only
    /// reachable through [`crate::Chain::task`] in chains.
    pub fn register(&mut self, name: impl Into<String>, task: Task) -> Result<&mut Self> {
        let name = name.into();
        if !TASK_NAME.is_match(&name) {
            return Err(Error::InvalidTaskRegistration(name));
        }
        if Builtin::from_name(&name).is_some() {
            warn!(task = %name, "task name is shadowed by a builtin transform in chains");
        }
        debug!(task = %name, kind = task.kind(), "registering task");
        self.tasks.insert(name, task);
        Ok(self)
    }

    pub fn register_fn<F, Fut>(&mut self, name: impl Into<String>, f: F) -> Result<&mut Self>
    where
        F: Fn(Option<Records>, String, Logger) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Records>> + Send + 'static,
    {
        self.register(name, Task::from_fn(f))
    }

    pub fn register_shared<R: Run + 'static>(
        &mut self,
        name: impl Into<String>,
        runner: R,
    ) -> Result<&mut Self> {
        self.register(name, Task::shared(runner))
    }

    pub fn register_factory<R, F>(&mut self, name: impl Into<String>, make: F) -> Result<&mut Self>
    where
        R: Run + 'static,
        F: Fn() -> R + Send + Sync + 'static,
    {
        self.register(name, Task::factory(make))
    }

    pub fn lookup(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Freeze the current table for one pipeline run.
    pub fn snapshot(&self) -> Arc<Registry> {
        Arc::new(self.clone())
    }
}
