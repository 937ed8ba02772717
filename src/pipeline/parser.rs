use crate::error::{Error, Result};
use crate::registry::Registry;
use crate::transforms::Builtin;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::LazyLock;

static EXPRESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([A-Za-z0-9_]+)\s*:\s*(.*)$").expect("expression pattern compiles")
});

/// One parsed `name: options` line.
///
/// `options` is everything after the first colon following the name, kept
/// verbatim; tasks interpret it themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expression {
    pub task: String,
    pub options: String,
}

impl Expression {
    pub fn parse(expr: &str) -> Result<Self> {
        let caps = EXPRESSION
            .captures(expr)
            .ok_or_else(|| Error::MalformedExpression(expr.to_string()))?;
        Ok(Expression {
            task: caps[1].to_string(),
            options: caps[2].to_string(),
        })
    }
}

impl FromStr for Expression {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Expression::parse(s)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.task, self.options)
    }
}

/// Anything accepted as pipeline input: one expression, several, or none.
pub trait IntoExpressions {
    fn into_expressions(self) -> Vec<String>;
}

impl IntoExpressions for &str {
    fn into_expressions(self) -> Vec<String> {
        vec![self.to_string()]
    }
}

impl IntoExpressions for String {
    fn into_expressions(self) -> Vec<String> {
        vec![self]
    }
}

impl<S: AsRef<str>> IntoExpressions for Vec<S> {
    fn into_expressions(self) -> Vec<String> {
        self.iter().map(|s| s.as_ref().to_string()).collect()
    }
}

impl<S: AsRef<str>> IntoExpressions for &[S] {
    fn into_expressions(self) -> Vec<String> {
        self.iter().map(|s| s.as_ref().to_string()).collect()
    }
}

impl<S: AsRef<str>, const N: usize> IntoExpressions for [S; N] {
    fn into_expressions(self) -> Vec<String> {
        self.iter().map(|s| s.as_ref().to_string()).collect()
    }
}

impl<T: IntoExpressions> IntoExpressions for Option<T> {
    fn into_expressions(self) -> Vec<String> {
        self.map(IntoExpressions::into_expressions).unwrap_or_default()
    }
}

/// Parse every input; the first malformed one fails the whole batch.
pub fn parse_all(input: impl IntoExpressions) -> Result<Vec<Expression>> {
    input
        .into_expressions()
        .iter()
        .map(|e| Expression::parse(e))
        .collect()
}

/// A pipeline file: top-level expressions plus optional chain steps.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PipelineFile {
    #[serde(default)]
    pub name: Option<String>,
    pub expressions: Vec<String>,
    /// Steps applied in order to the combined output, same grammar.
    #[serde(default)]
    pub then: Vec<String>,
}

/// Load a YAML pipeline file.
pub fn load_pipeline(path: &Path) -> Result<PipelineFile> {
    let content = std::fs::read_to_string(path).map_err(|source| Error::Read {
        path: path.to_path_buf(),
        source,
    })?;
    serde_yaml::from_str(&content).map_err(|source| Error::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Check the file parses and every verb it uses resolves.
pub fn validate_pipeline(p: &PipelineFile, registry: &Registry) -> Result<()> {
    if p.expressions.is_empty() {
        return Err(Error::Config("no expressions".to_string()));
    }
    for expr in parse_all(p.expressions.as_slice())? {
        if !registry.contains(&expr.task) {
            return Err(Error::UnregisteredTask(expr.task));
        }
    }
    for step in parse_all(p.then.as_slice())? {
        if Builtin::from_name(&step.task).is_none() && !registry.contains(&step.task) {
            return Err(Error::UnregisteredTask(step.task));
        }
    }
    Ok(())
}
