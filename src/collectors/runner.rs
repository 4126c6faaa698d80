use crate::collectors::{ExecutionResult, LOCALHOST};
use crate::config::Config;
use async_trait::async_trait;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tokio::time;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },
    #[error("failed to wait for `{command}`: {source}")]
    Wait {
        command: String,
        source: std::io::Error,
    },
    #[error("`{command}` did not finish within {}", format_timeout(.timeout))]
    TimedOut { command: String, timeout: Duration },
}

fn format_timeout(timeout: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*timeout)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

/// Turns a command line into a finished process, locally when `host` is
/// `None` and through some remote mechanism otherwise.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn execute(&self, command: &str, host: Option<&str>)
        -> Result<ProcessOutput, RunError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteShell {
    pub program: String,
    pub args: Vec<String>,
}

/// Runs `<shell> -c <command>` locally and `<program> <args..> <host> <command>`
/// for remote hosts. Output size is bounded only by memory.
#[derive(Debug, Clone)]
pub struct ShellTransport {
    shell: String,
    remote: RemoteShell,
    timeout: Option<Duration>,
}

impl ShellTransport {
    pub fn new(shell: impl Into<String>, remote: RemoteShell) -> Self {
        Self {
            shell: shell.into(),
            remote,
            timeout: None,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.shell.clone(),
            RemoteShell {
                program: cfg.remote_shell.program.clone(),
                args: cfg.remote_shell.args.clone(),
            },
        )
        .with_timeout(cfg.timeout)
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn build_command(&self, command: &str, host: Option<&str>) -> Command {
        let mut cmd = match host {
            Some(host) => {
                let mut cmd = Command::new(&self.remote.program);
                cmd.args(&self.remote.args).arg(host).arg(command);
                cmd
            }
            None => {
                let mut cmd = Command::new(&self.shell);
                cmd.arg("-c").arg(command);
                cmd
            }
        };
        // stdin may be carrying the command list itself
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Transport for ShellTransport {
    async fn execute(
        &self,
        command: &str,
        host: Option<&str>,
    ) -> Result<ProcessOutput, RunError> {
        let child = self
            .build_command(command, host)
            .spawn()
            .map_err(|source| RunError::Spawn {
                command: command.to_string(),
                source,
            })?;

        // wait_with_output drains stdout and stderr concurrently
        let waiting = child.wait_with_output();
        let finished = match self.timeout {
            Some(limit) => match time::timeout(limit, waiting).await {
                Ok(res) => res,
                Err(_elapsed) => {
                    return Err(RunError::TimedOut {
                        command: command.to_string(),
                        timeout: limit,
                    })
                }
            },
            None => waiting.await,
        };
        let output = finished.map_err(|source| RunError::Wait {
            command: command.to_string(),
            source,
        })?;

        Ok(ProcessOutput {
            exit_code: exit_code(output.status),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

#[derive(Clone)]
pub struct CommandRunner {
    transport: Arc<dyn Transport>,
}

impl CommandRunner {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::with_transport(Arc::new(transport))
    }

    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub async fn run(
        &self,
        command: &str,
        hostname: Option<&str>,
    ) -> Result<ExecutionResult, RunError> {
        if command.is_empty() {
            return Err(RunError::InvalidArgument(
                "command must not be empty".to_string(),
            ));
        }
        if matches!(hostname, Some(h) if h.trim().is_empty()) {
            return Err(RunError::InvalidArgument(
                "hostname must not be blank".to_string(),
            ));
        }

        let start = Instant::now();
        let output = self.transport.execute(command, hostname).await?;
        debug!(
            host = hostname.unwrap_or(LOCALHOST),
            command,
            exit_code = output.exit_code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "command finished"
        );

        Ok(ExecutionResult {
            command: command.to_string(),
            hostname: hostname.map(str::to_string),
            exit_code: output.exit_code,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
