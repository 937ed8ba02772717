use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::registry::Registry;
use crate::task::{invoke, Records};
use crate::transforms::{self, Builtin, Iteratee};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::sync::Arc;
use tracing::debug;

/// Handle on a pending set of records.
///
/// Every step consumes the handle and returns a new one that waits for the
/// current records before running. Task verbs are resolved against the
/// registry snapshot the handle was created with, never the live registry.
/// Await the handle to get the records.
pub struct Chain {
    registry: Arc<Registry>,
    logger: Logger,
    records: BoxFuture<'static, Result<Records>>,
}

impl Chain {
    pub fn new<F>(registry: Arc<Registry>, records: F) -> Self
    where
        F: Future<Output = Result<Records>> + Send + 'static,
    {
        Self {
            registry,
            logger: Logger::default(),
            records: records.boxed(),
        }
    }

    pub fn from_records(registry: Arc<Registry>, records: Records) -> Self {
        Self::new(registry, futures::future::ready(Ok(records)))
    }

    /// Logger handed to every task invoked further down this chain.
    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    fn then<F, Fut>(self, step: F) -> Self
    where
        F: FnOnce(Records, Arc<Registry>, Logger) -> Fut + Send + 'static,
        Fut: Future<Output = Result<Records>> + Send + 'static,
    {
        let Chain {
            registry,
            logger,
            records,
        } = self;
        let next = {
            let registry = Arc::clone(&registry);
            let logger = logger.clone();
            async move {
                let records = records.await?;
                step(records, registry, logger).await
            }
        };
        Chain {
            registry,
            logger,
            records: next.boxed(),
        }
    }

    fn transform<F>(self, f: F) -> Self
    where
        F: FnOnce(Records) -> Records + Send + 'static,
    {
        self.then(|records, _, _| async move { Ok(f(records)) })
    }

    /// Run the step named `name` on the current records.
    ///
    /// Builtin transform names take precedence; `options` is then read as
    /// an iteratee shorthand (or an index list for `at`). Any other name is
    /// a registered task.
    pub fn call(self, name: &str, options: impl Into<String>) -> Self {
        match Builtin::from_name(name) {
            Some(builtin) => {
                let options = options.into();
                self.then(move |records, _, _| async move {
                    debug!(builtin = %builtin, "applying builtin transform");
                    builtin.apply(records, &options)
                })
            }
            None => self.task(name, options),
        }
    }

    /// Run the registered task `name`, skipping builtin resolution.
    pub fn task(self, name: &str, options: impl Into<String>) -> Self {
        let name = name.to_string();
        let options = options.into();
        self.then(move |records, registry, logger| async move {
            let task = registry
                .lookup(&name)
                .ok_or_else(|| Error::UnregisteredTask(name.clone()))?;
            debug!(task = %name, records = records.len(), "chaining task");
            invoke(&name, task, Some(records), options, Some(&logger)).await
        })
    }

    pub fn filter(self, it: impl Into<Iteratee>) -> Self {
        let it = it.into();
        self.transform(move |records| transforms::filter(records, &it))
    }

    pub fn reject(self, it: impl Into<Iteratee>) -> Self {
        let it = it.into();
        self.transform(move |records| transforms::reject(records, &it))
    }

    pub fn find(self, it: impl Into<Iteratee>) -> Self {
        let it = it.into();
        self.transform(move |records| transforms::into_records(transforms::find(records, &it)))
    }

    pub fn find_last(self, it: impl Into<Iteratee>) -> Self {
        let it = it.into();
        self.transform(move |records| transforms::into_records(transforms::find_last(records, &it)))
    }

    pub fn map(self, it: impl Into<Iteratee>) -> Self {
        let it = it.into();
        self.transform(move |records| transforms::map(records, &it))
    }

    pub fn uniq(self) -> Self {
        self.transform(transforms::uniq)
    }

    pub fn first(self) -> Self {
        self.transform(|records| transforms::into_records(transforms::first(records)))
    }

    pub fn last(self) -> Self {
        self.transform(|records| transforms::into_records(transforms::last(records)))
    }

    pub fn at(self, indices: &[usize]) -> Self {
        let indices = indices.to_vec();
        self.transform(move |records| transforms::at(&records, &indices))
    }

    pub fn sample(self) -> Self {
        self.transform(|records| transforms::into_records(transforms::sample(&records)))
    }

    pub fn shuffle(self) -> Self {
        self.transform(transforms::shuffle)
    }
}

impl IntoFuture for Chain {
    type Output = Result<Records>;
    type IntoFuture = BoxFuture<'static, Result<Records>>;

    fn into_future(self) -> Self::IntoFuture {
        self.records
    }
}

impl fmt::Debug for Chain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Chain")
            .field("tasks", &self.registry.names())
            .field("logger", &self.logger)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    fn nums(xs: &[i64]) -> Records {
        xs.iter().map(|x| json!(x)).collect()
    }

    fn registry() -> Registry {
        let mut reg = Registry::new();
        reg.register_fn("double", |records, _, _| async move {
            Ok(records
                .unwrap_or_default()
                .iter()
                .map(|v| json!(v.as_i64().unwrap_or(0) * 2))
                .collect())
        })
        .unwrap();
        reg
    }

    #[tokio::test]
    async fn chained_task_preserves_order() {
        let out = Chain::from_records(registry().snapshot(), nums(&[1, 2, 3]))
            .call("double", "{}")
            .await
            .unwrap();
        assert_eq!(out, nums(&[2, 4, 6]));
    }

    #[tokio::test]
    async fn builtin_filter_matches_standalone_transform() {
        let even = Iteratee::predicate(|v| v.as_i64().is_some_and(|n| n % 2 == 0));
        let standalone = transforms::filter(nums(&[1, 2, 3, 4]), &even);
        let chained = Chain::from_records(registry().snapshot(), nums(&[1, 2, 3, 4]))
            .filter(even)
            .await
            .unwrap();
        assert_eq!(chained, nums(&[2, 4]));
        assert_eq!(chained, standalone);
    }

    #[tokio::test]
    async fn steps_run_strictly_in_sequence() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut reg = Registry::new();
        for name in ["one", "two", "three"] {
            let log = Arc::clone(&log);
            reg.register_fn(name, move |records, _, _| {
                let log = Arc::clone(&log);
                async move {
                    tokio::task::yield_now().await;
                    log.lock().unwrap().push(name);
                    Ok(records.unwrap_or_default())
                }
            })
            .unwrap();
        }
        Chain::from_records(reg.snapshot(), vec![])
            .call("one", "")
            .call("two", "")
            .call("three", "")
            .await
            .unwrap();
        assert_eq!(*log.lock().unwrap(), vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn builtin_names_win_over_tasks_in_call() {
        let mut reg = registry();
        reg.register(
            "first",
            Task::from_fn(|_, _, _| async { Ok(vec![json!("task")]) }),
        )
        .unwrap();
        let snap = reg.snapshot();

        let builtin = Chain::from_records(Arc::clone(&snap), nums(&[5, 6]))
            .call("first", "")
            .await
            .unwrap();
        assert_eq!(builtin, nums(&[5]));

        let task = Chain::from_records(snap, nums(&[5, 6]))
            .task("first", "")
            .await
            .unwrap();
        assert_eq!(task, vec![json!("task")]);
    }

    #[tokio::test]
    async fn textual_builtins_use_shorthand_options() {
        let records = vec![
            json!({"id": 1, "ok": true}),
            json!({"id": 2, "ok": false}),
            json!({"id": 3, "ok": true}),
        ];
        let out = Chain::from_records(registry().snapshot(), records)
            .call("filter", "ok")
            .call("map", "id")
            .call("at", "1")
            .await
            .unwrap();
        assert_eq!(out, nums(&[3]));
    }

    #[tokio::test]
    async fn unknown_verbs_reject_when_awaited() {
        let err = Chain::from_records(registry().snapshot(), nums(&[1]))
            .call("missing", "")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UnregisteredTask(ref n) if n == "missing"));
    }

    #[tokio::test]
    async fn handles_ignore_later_registrations() {
        let mut reg = Registry::new();
        let chain = Chain::from_records(reg.snapshot(), nums(&[1])).call("late", "");
        reg.register_fn("late", |records, _, _| async move { Ok(records.unwrap_or_default()) })
            .unwrap();
        assert!(matches!(chain.await, Err(Error::UnregisteredTask(_))));
    }

    #[tokio::test]
    async fn empty_records_through_single_value_builtins() {
        let out = Chain::from_records(registry().snapshot(), vec![])
            .first()
            .await
            .unwrap();
        assert_eq!(out, vec![Value::Null]);

        let missing = Chain::from_records(registry().snapshot(), nums(&[1, 3]))
            .call("find", "x")
            .await
            .unwrap();
        assert_eq!(missing, vec![Value::Null]);
    }

    #[tokio::test]
    async fn single_array_values_are_spliced() {
        let nested = vec![json!([1, 2]), json!([3])];
        let typed = Chain::from_records(registry().snapshot(), nested.clone())
            .first()
            .await
            .unwrap();
        assert_eq!(typed, nums(&[1, 2]));
        let textual = Chain::from_records(registry().snapshot(), nested)
            .call("findLast", "")
            .await
            .unwrap();
        assert_eq!(textual, nums(&[3]));
    }
}
