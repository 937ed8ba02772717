use anyhow::Context;
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Captured result of one shell command.
#[derive(Debug)]
pub struct ShellOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: ExitStatus,
}

/// Backend trait: run a command, optionally feeding stdin
#[async_trait]
pub trait Backend: Send + Sync {
    async fn run(
        &self,
        cmd: &str,
        stdin: Option<String>,
        timeout: Option<Duration>,
    ) -> anyhow::Result<ShellOutput>;
}

/// Local backend: runs in host shell (PowerShell on Windows, sh on Unix)
#[derive(Debug, Default)]
pub struct LocalBackend {
    cwd: Option<PathBuf>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    fn command(&self, cmd: &str) -> Command {
        let mut c = if cfg!(windows) {
            let mut c = Command::new("powershell.exe");
            c.arg("-NoLogo").arg("-NoProfile").arg("-Command").arg(cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(cmd);
            c
        };
        if let Some(dir) = &self.cwd {
            c.current_dir(dir);
        }
        c
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn run(
        &self,
        cmd: &str,
        stdin: Option<String>,
        timeout: Option<Duration>,
    ) -> anyhow::Result<ShellOutput> {
        let mut child = self
            .command(cmd)
            .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .context("local backend failed to spawn process")?;

        // Feed stdin from its own task so a chatty child can't block on a full stdout pipe.
        let feeder = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => Some(tokio::spawn(async move {
                let res = pipe.write_all(input.as_bytes()).await;
                drop(pipe);
                res
            })),
            _ => None,
        };

        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| anyhow::anyhow!("local backend timed out after {}s", limit.as_secs_f64()))?
                .context("waiting for child failed")?,
            None => child
                .wait_with_output()
                .await
                .context("waiting for child failed")?,
        };

        if let Some(feeder) = feeder {
            // A child that exits without reading stdin closes the pipe early; that's not an error.
            if let Ok(Err(e)) = feeder.await {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e).context("writing child stdin failed");
                }
            }
        }

        Ok(ShellOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status,
        })
    }
}
