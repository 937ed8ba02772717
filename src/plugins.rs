//! Task plugins bundled with the binary.
//!
//! Every one of them is an ordinary registry entry; embedders can register
//! their own tasks the same way.

use crate::backends::{Backend, LocalBackend};
use crate::error::Result;
use crate::logger::Logger;
use crate::registry::Registry;
use crate::task::{Record, Records, Run};
use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Register `seq`, `json`, `echo`, `lines`, `sh` and `count`.
pub fn register_defaults(registry: &mut Registry) -> Result<&mut Registry> {
    registry
        .register_fn("seq", seq)?
        .register_fn("json", json)?
        .register_fn("echo", echo)?
        .register_fn("lines", lines)?
        .register_shared("sh", Shell::new(LocalBackend::new()))?
        .register_factory("count", Count::default)
}

/// Largest number of records a single `seq` may yield.
pub const MAX_SEQ_LEN: i64 = 1_000_000;

/// `a..b` or `a..=b`, integers.
pub fn parse_range(options: &str) -> anyhow::Result<(i64, i64)> {
    let options = options.trim();
    let (start, end, inclusive) = if let Some((a, b)) = options.split_once("..=") {
        (a, b, true)
    } else if let Some((a, b)) = options.split_once("..") {
        (a, b, false)
    } else {
        bail!("expected a range like 1..10, got {options:?}");
    };
    let start: i64 = start.trim().parse().with_context(|| format!("bad range start {start:?}"))?;
    let end: i64 = end.trim().parse().with_context(|| format!("bad range end {end:?}"))?;
    if inclusive {
        let end = end.checked_add(1).context("range end overflows")?;
        return Ok((start, end));
    }
    Ok((start, end))
}

async fn seq(_records: Option<Records>, options: String, logger: Logger) -> anyhow::Result<Records> {
    let (start, end) = parse_range(&options)?;
    if end.saturating_sub(start) > MAX_SEQ_LEN {
        bail!("range {start}..{end} is longer than {MAX_SEQ_LEN} records");
    }
    logger.debug(format!("yielding {}..{}", start, end));
    Ok((start..end).map(Value::from).collect())
}

async fn json(records: Option<Records>, options: String, _logger: Logger) -> anyhow::Result<Records> {
    let parsed: Value = serde_json::from_str(&options)
        .with_context(|| format!("options are not valid JSON: {options:?}"))?;
    let mut out = records.unwrap_or_default();
    match parsed {
        Value::Array(items) => out.extend(items),
        other => out.push(other),
    }
    Ok(out)
}

async fn echo(records: Option<Records>, options: String, logger: Logger) -> anyhow::Result<Records> {
    let out = records.unwrap_or_else(|| vec![Value::String(options)]);
    logger.info(format!("{} record(s)", out.len()));
    Ok(out)
}

async fn lines(_records: Option<Records>, options: String, logger: Logger) -> anyhow::Result<Records> {
    let path = options.trim();
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {path:?}"))?;
    let out: Records = content.lines().map(|l| Value::String(l.to_string())).collect();
    logger.debug(format!("read {} line(s) from {}", out.len(), path));
    Ok(out)
}

/// A stdout line as a record: JSON when it parses, a string otherwise.
fn line_record(line: &str) -> Record {
    serde_json::from_str(line).unwrap_or_else(|_| Value::String(line.to_string()))
}

/// Runs a shell command per invocation.
///
/// Options are the command, optionally prefixed with `timeout=SECS;`.
/// Incoming records are written to stdin as JSON lines and each stdout line
/// becomes a record.
pub struct Shell {
    backend: Arc<dyn Backend>,
}

impl Shell {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }
}

fn split_timeout(options: &str) -> anyhow::Result<(Option<Duration>, &str)> {
    let trimmed = options.trim_start();
    let Some(rest) = trimmed.strip_prefix("timeout=") else {
        return Ok((None, options));
    };
    let (secs, cmd) = rest
        .split_once(';')
        .context("expected `timeout=SECS; command`")?;
    let secs: f64 = secs.trim().parse().with_context(|| format!("bad timeout {secs:?}"))?;
    let limit = Duration::try_from_secs_f64(secs).with_context(|| format!("bad timeout {secs}"))?;
    Ok((Some(limit), cmd))
}

#[async_trait]
impl Run for Shell {
    async fn run(&self, records: Option<Records>, options: &str, logger: &Logger) -> anyhow::Result<Records> {
        let (timeout, cmd) = split_timeout(options)?;
        let cmd = cmd.trim();
        if cmd.is_empty() {
            bail!("no command given");
        }
        let stdin = records.map(|records| {
            records
                .iter()
                .map(|r| format!("{r}\n"))
                .collect::<String>()
        });

        logger.debug(format!("running `{}`", cmd));
        let out = self.backend.run(cmd, stdin, timeout).await?;
        if !out.stderr.trim().is_empty() {
            logger.warn(out.stderr.trim());
        }
        if !out.status.success() {
            bail!("`{}` exited with {:?}", cmd, out.status.code());
        }
        Ok(out.stdout.lines().map(line_record).collect())
    }
}

/// Yields the number of incoming records.
#[derive(Default)]
pub struct Count {
    seen: AtomicUsize,
}

#[async_trait]
impl Run for Count {
    async fn run(&self, records: Option<Records>, _options: &str, _logger: &Logger) -> anyhow::Result<Records> {
        let n = records.map_or(0, |r| r.len());
        self.seen.fetch_add(n, Ordering::Relaxed);
        Ok(vec![Value::from(self.seen.load(Ordering::Relaxed))])
    }
}
