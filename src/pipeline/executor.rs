use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::pipeline::chain::Chain;
use crate::pipeline::parser::{
    load_pipeline, parse_all, validate_pipeline, IntoExpressions, PipelineFile,
};
use crate::registry::Registry;
use crate::task::{invoke, Records};
use futures::future::try_join_all;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Top-level driver: dispatch expressions concurrently, join, flatten.
#[derive(Debug, Clone)]
pub struct Pipeline {
    registry: Arc<Registry>,
    logger: Logger,
}

impl Pipeline {
    /// Build a pipeline over a frozen copy of `registry`.
    pub fn new(registry: &Registry) -> Self {
        Self {
            registry: registry.snapshot(),
            logger: Logger::default(),
        }
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = logger;
        self
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Start every expression and return a handle on the combined records.
    ///
    /// Malformed expressions and unregistered tasks fail here, before any
    /// task runs. Task failures surface when the handle is awaited; the
    /// first one aborts the whole join.
    pub fn run(&self, exprs: impl IntoExpressions) -> Result<Chain> {
        let raw = exprs.into_expressions();
        if raw.is_empty() {
            return Ok(self.chain(Vec::new()));
        }

        debug!(count = raw.len(), "parsing expressions");
        let exprs = parse_all(raw)?;

        let tasks = exprs
            .iter()
            .map(|e| {
                self.registry
                    .lookup(&e.task)
                    .map(|task| (e, task))
                    .ok_or_else(|| Error::UnregisteredTask(e.task.clone()))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(count = tasks.len(), "dispatching tasks");
        let pending: Vec<_> = tasks
            .into_iter()
            .map(|(e, task)| invoke(&e.task, task, None, e.options.clone(), Some(&self.logger)))
            .collect();

        let joined = async move {
            debug!("awaiting all tasks");
            let groups = try_join_all(pending).await?;
            debug!(groups = groups.len(), "flattening results");
            let records: Records = groups.into_iter().flatten().collect();
            debug!(records = records.len(), "pipeline settled");
            Ok::<_, Error>(records)
        };
        Ok(Chain::new(Arc::clone(&self.registry), joined).with_logger(self.logger.clone()))
    }

    /// A handle on records that are already available.
    pub fn chain(&self, records: Records) -> Chain {
        Chain::from_records(Arc::clone(&self.registry), records).with_logger(self.logger.clone())
    }

    /// Run `exprs`, then apply each chain step in order.
    pub async fn run_with_steps(
        &self,
        exprs: impl IntoExpressions,
        steps: impl IntoExpressions,
    ) -> Result<Records> {
        let steps = parse_all(steps)?;
        let chain = steps
            .iter()
            .fold(self.run(exprs)?, |chain, step| chain.call(&step.task, step.options.as_str()));
        chain.await
    }
}

/// Load, validate and execute a pipeline file.
pub async fn run_pipeline(path: &Path, registry: &Registry) -> Result<Records> {
    let file = load_pipeline(path)?;
    run_pipeline_file(&file, registry).await
}

/// Validate and execute an already loaded pipeline.
pub async fn run_pipeline_file(file: &PipelineFile, registry: &Registry) -> Result<Records> {
    validate_pipeline(file, registry)?;

    let name = file.name.as_deref().unwrap_or("<unnamed>");
    info!(pipeline = name, "starting pipeline");
    let records = Pipeline::new(registry)
        .with_logger(Logger::new(name))
        .run_with_steps(file.expressions.as_slice(), file.then.as_slice())
        .await?;
    info!(pipeline = name, records = records.len(), "pipeline finished");
    Ok(records)
}

/// Validate-only helper for the CLI.
pub fn validate_pipeline_file(path: &Path, registry: &Registry) -> Result<()> {
    let file = load_pipeline(path)?;
    validate_pipeline(&file, registry)?;
    info!(
        pipeline = file.name.as_deref().unwrap_or("<unnamed>"),
        "pipeline validated"
    );
    Ok(())
}
