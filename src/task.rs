use crate::error::{Error, Result};
use crate::logger::Logger;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// One opaque application value flowing through a pipeline.
pub type Record = serde_json::Value;
pub type Records = Vec<Record>;

/// Future returned by a plain task function.
pub type TaskFuture = BoxFuture<'static, anyhow::Result<Records>>;

type TaskFn = dyn Fn(Option<Records>, String, Logger) -> TaskFuture + Send + Sync;
type TaskFactory = dyn Fn() -> Box<dyn Run> + Send + Sync;

/// A task object. `records` is `None` for top-level dispatch and the
/// previous step's output when chained; `options` is the raw text after the
/// colon, left for the task to interpret.
#[async_trait]
pub trait Run: Send + Sync {
    async fn run(
        &self,
        records: Option<Records>,
        options: &str,
        logger: &Logger,
    ) -> anyhow::Result<Records>;
}

/// The three accepted task shapes.
#[derive(Clone)]
pub enum Task {
    /// A plain async function.
    Func(Arc<TaskFn>),
    /// One object shared by every invocation; any state it keeps is the
    /// task's own business.
    Shared(Arc<dyn Run>),
    /// A constructor; every invocation runs on a fresh instance.
    Factory(Arc<TaskFactory>),
}

impl Task {
    pub fn from_fn<F, Fut>(f: F) -> Self
    where
        F: Fn(Option<Records>, String, Logger) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Records>> + Send + 'static,
    {
        Task::Func(Arc::new(move |records, options, logger| {
            f(records, options, logger).boxed()
        }))
    }

    pub fn shared<R: Run + 'static>(runner: R) -> Self {
        Task::Shared(Arc::new(runner))
    }

    pub fn factory<R, F>(make: F) -> Self
    where
        R: Run + 'static,
        F: Fn() -> R + Send + Sync + 'static,
    {
        Task::Factory(Arc::new(move || Box::new(make()) as Box<dyn Run>))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Task::Func(_) => "function",
            Task::Shared(_) => "shared",
            Task::Factory(_) => "factory",
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Task::{}", self.kind())
    }
}

/// Normalize `task` into a single call and start it.
///
/// A factory is instantiated here, synchronously, so each call owns its
/// instance. Failures come back tagged with `name`.
pub fn invoke(
    name: &str,
    task: &Task,
    records: Option<Records>,
    options: impl Into<String>,
    logger: Option<&Logger>,
) -> BoxFuture<'static, Result<Records>> {
    let options = options.into();
    let logger = logger.cloned().unwrap_or_default().scoped(name);

    let fut: TaskFuture = match task {
        Task::Factory(make) => {
            let instance = make();
            async move { instance.run(records, &options, &logger).await }.boxed()
        }
        Task::Shared(runner) => {
            let runner = Arc::clone(runner);
            async move { runner.run(records, &options, &logger).await }.boxed()
        }
        Task::Func(f) => f(records, options, logger),
    };

    let name = name.to_string();
    async move { fut.await.map_err(|e| Error::task(name, e)) }.boxed()
}
