use async_trait::async_trait;
use chapipe::{Error, Iteratee, Logger, Pipeline, Records, Registry, Run, Task};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

fn nums(xs: &[i64]) -> Records {
    xs.iter().map(|x| json!(x)).collect()
}

fn registry() -> Registry {
    let mut reg = Registry::new();
    reg.register_fn("a", |_, _, _| async { Ok(nums(&[1, 2])) })
        .unwrap()
        .register_fn("b", |_, _, _| async { Ok(nums(&[3])) })
        .unwrap()
        .register_fn("double", |records, _, _| async move {
            Ok(records
                .unwrap_or_default()
                .iter()
                .filter_map(|v| v.as_i64())
                .map(|n| json!(n * 2))
                .collect())
        })
        .unwrap();
    reg
}

/// Remembers the last options it saw on the instance.
#[derive(Default)]
struct Remember {
    last: Mutex<Option<String>>,
    calls: AtomicUsize,
}

#[async_trait]
impl Run for Remember {
    async fn run(&self, _: Option<Records>, options: &str, _: &Logger) -> anyhow::Result<Records> {
        let previous = self.last.lock().unwrap().replace(options.to_string());
        let calls = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(vec![json!({ "previous": previous, "calls": calls })])
    }
}

#[tokio::test]
async fn run_without_expressions_is_empty() {
    let out = Pipeline::new(&registry()).run(None::<&str>).unwrap().await.unwrap();
    assert!(out.is_empty());
}

#[tokio::test]
async fn top_level_results_are_concatenated() {
    let mut out = Pipeline::new(&registry())
        .run(["a: 1", "b: 2"])
        .unwrap()
        .await
        .unwrap();
    let one = out.iter().position(|v| *v == json!(1)).unwrap();
    let two = out.iter().position(|v| *v == json!(2)).unwrap();
    assert!(one < two);
    out.sort_by_key(|v| v.as_i64());
    assert_eq!(out, nums(&[1, 2, 3]));
}

#[tokio::test]
async fn chained_double() {
    let pipeline = Pipeline::new(&registry());
    let out = pipeline.chain(nums(&[1, 2, 3])).call("double", "{}").await.unwrap();
    assert_eq!(out, nums(&[2, 4, 6]));
}

#[tokio::test]
async fn builtin_filter_selects_even_values() {
    let even = Iteratee::predicate(|v| v.as_i64().is_some_and(|n| n % 2 == 0));
    let out = Pipeline::new(&registry())
        .chain(nums(&[1, 2, 3, 4]))
        .filter(even.clone())
        .await
        .unwrap();
    assert_eq!(out, nums(&[2, 4]));
    assert_eq!(out, chapipe::transforms::filter(nums(&[1, 2, 3, 4]), &even));
}

#[tokio::test]
async fn top_level_output_feeds_a_chain() {
    let mut out = Pipeline::new(&registry())
        .run(["a:", "b:"])
        .unwrap()
        .call("double", "")
        .reject(Iteratee::predicate(|v| v == &json!(4)))
        .await
        .unwrap();
    out.sort_by_key(|v| v.as_i64());
    assert_eq!(out, nums(&[2, 6]));
}

#[tokio::test]
async fn factory_tasks_get_fresh_instances() {
    let mut reg = registry();
    reg.register_factory("remember", Remember::default).unwrap();
    let pipeline = Pipeline::new(&reg);

    let first = pipeline.run("remember: one").unwrap().await.unwrap();
    let second = pipeline.run("remember: two").unwrap().await.unwrap();
    assert_eq!(first, vec![json!({"previous": null, "calls": 1})]);
    assert_eq!(second, vec![json!({"previous": null, "calls": 1})]);
}

#[tokio::test]
async fn shared_tasks_keep_their_state() {
    let mut reg = registry();
    reg.register_shared("remember", Remember::default()).unwrap();
    let pipeline = Pipeline::new(&reg);

    pipeline.run("remember: one").unwrap().await.unwrap();
    let second = pipeline.run("remember: two").unwrap().await.unwrap();
    assert_eq!(second, vec![json!({"previous": "one", "calls": 2})]);
}

#[tokio::test]
async fn closure_state_outside_the_instance_is_shared() {
    let total = Arc::new(AtomicUsize::new(0));
    let mut reg = Registry::new();
    let counter = Arc::clone(&total);
    reg.register(
        "tick",
        Task::from_fn(move |_, _, _| {
            let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
            async move { Ok(vec![json!(n)]) }
        }),
    )
    .unwrap();
    let pipeline = Pipeline::new(&reg);
    let out = pipeline.run(["tick:", "tick:"]).unwrap().await.unwrap();
    assert_eq!(out.len(), 2);
    assert_eq!(total.load(Ordering::SeqCst), 2);
}

#[test]
fn synchronous_failures() {
    let pipeline = Pipeline::new(&registry());
    assert!(matches!(
        pipeline.run(["a: 1", "no colon"]),
        Err(Error::MalformedExpression(ref e)) if e == "no colon"
    ));
    assert!(matches!(
        pipeline.run("missing: x"),
        Err(Error::UnregisteredTask(ref t)) if t == "missing"
    ));

    let mut reg = Registry::new();
    assert!(matches!(
        reg.register("not a name", Task::from_fn(|_, _, _| async { Ok(vec![]) })),
        Err(Error::InvalidTaskRegistration(_))
    ));
}

#[tokio::test]
async fn task_failures_surface_on_await() {
    let mut reg = registry();
    reg.register_fn("boom", |_, options, _| async move {
        Err::<Records, _>(anyhow::anyhow!("bad options {options:?}"))
    })
    .unwrap();
    let chain = Pipeline::new(&reg).run(["a:", "boom: x"]).unwrap();
    let err = chain.await.unwrap_err();
    assert!(err.to_string().contains("boom"));
    assert!(err.to_string().contains("bad options"));
}

#[tokio::test]
async fn defaults_compose() {
    let mut reg = Registry::new();
    chapipe::plugins::register_defaults(&mut reg).unwrap();
    let out = Pipeline::new(&reg)
        .run(["seq: 1..=4", "json: [2, 3]"])
        .unwrap()
        .uniq()
        .call("count", "")
        .await
        .unwrap();
    assert_eq!(out, vec![json!(4)]);
}

#[tokio::test]
async fn pipeline_files_run_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pipeline.yaml");
    std::fs::write(
        &path,
        "name: evens\nexpressions:\n  - \"seq: 1..7\"\nthen:\n  - \"filter: \"\n  - \"last:\"\n",
    )
    .unwrap();

    let mut reg = Registry::new();
    chapipe::plugins::register_defaults(&mut reg).unwrap();
    let out = chapipe::pipeline::run_pipeline(&path, &reg).await.unwrap();
    assert_eq!(out, vec![json!(6)]);

    let missing = dir.path().join("absent.yaml");
    let err = chapipe::pipeline::run_pipeline(&missing, &reg).await.unwrap_err();
    assert!(matches!(err, Error::Read { .. }));
}
