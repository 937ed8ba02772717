use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the pipeline engine.
///
/// Parsing, registration and dispatch lookups fail synchronously from
/// [`crate::Pipeline::run`]; `Task` failures only surface once the returned
/// chain is awaited.
#[derive(Error, Debug)]
pub enum Error {
    /// An input string does not match `name: options`
    #[error("unrecognized expression: {0:?}")]
    MalformedExpression(String),

    /// A task name was dispatched or chained without being registered
    #[error("unregistered task: {0}")]
    UnregisteredTask(String),

    /// A registration that can never be dispatched
    #[error("unrecognized task registration: {0:?}")]
    InvalidTaskRegistration(String),

    /// A task ran and failed
    #[error("task '{task}' failed: {source:#}")]
    Task {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    /// A pipeline file is structurally invalid
    #[error("invalid pipeline: {0}")]
    Config(String),

    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    pub(crate) fn task(task: impl Into<String>, source: anyhow::Error) -> Self {
        Error::Task {
            task: task.into(),
            source,
        }
    }
}
