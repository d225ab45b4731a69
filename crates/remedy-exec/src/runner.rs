//! Process execution behind the [`ProcessGateway`] seam.

use crate::command::{CommandOutput, CommandSpec};
use crate::error::{ExecError, ExecResult};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

/// Runs external commands and captures their output.
///
/// Stages talk to git and the analysis tool only through this trait so
/// tests can substitute a scripted gateway.
#[async_trait]
pub trait ProcessGateway: Send + Sync {
    /// Run a command to completion. A non-zero exit is *not* an error here.
    async fn run(&self, spec: &CommandSpec) -> ExecResult<CommandOutput>;

    /// Run a command and fail with [`ExecError::NonZeroExit`] unless it exits 0.
    async fn run_checked(&self, spec: &CommandSpec) -> ExecResult<CommandOutput> {
        let output = self.run(spec).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(ExecError::NonZeroExit {
                command: spec.display_line(),
                exit_code: output.exit_code,
                diagnostics: output.diagnostics(),
            })
        }
    }
}

/// Gateway backed by `tokio::process`.
///
/// Children are spawned with `kill_on_drop`, so a timed-out or cancelled
/// call never leaves a process behind.
#[derive(Debug, Clone, Default)]
pub struct TokioProcessGateway {
    base_env: Vec<(String, String)>,
}

impl TokioProcessGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Environment applied to every command before its own `env` entries.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.base_env.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl ProcessGateway for TokioProcessGateway {
    async fn run(&self, spec: &CommandSpec) -> ExecResult<CommandOutput> {
        if spec.program.is_empty() {
            return Err(ExecError::EmptyCommand);
        }

        let start = Instant::now();
        let command_line = spec.display_line();
        debug!(command = %command_line, cwd = ?spec.working_dir, "Spawning process");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.working_dir {
            command.current_dir(dir);
        }
        for (key, value) in self.base_env.iter().chain(spec.env.iter()) {
            command.env(key, value);
        }

        let child = command.spawn().map_err(|source| ExecError::Spawn {
            program: spec.program.clone(),
            source,
        })?;

        let output = if spec.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(spec.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| ExecError::Timeout {
                command: command_line.clone(),
                timeout_secs: spec.timeout_secs,
            })?
        } else {
            child.wait_with_output().await
        }
        .map_err(|source| ExecError::Io {
            command: command_line.clone(),
            source,
        })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        let exit_code = output.status.code().unwrap_or(-1);
        let stdout = spec.mask(&String::from_utf8_lossy(&output.stdout));
        let stderr = spec.mask(&String::from_utf8_lossy(&output.stderr));

        debug!(command = %command_line, exit_code, duration_ms, "Process finished");

        Ok(CommandOutput {
            exit_code,
            stdout,
            stderr,
            duration_ms,
        })
    }
}
