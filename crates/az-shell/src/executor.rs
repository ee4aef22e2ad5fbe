//! Process-backed az execution.

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::command::AzCommand;
use crate::error::AzError;
use crate::Result;

/// Runs az commands and returns their stdout.
#[async_trait]
pub trait AzExecutor: Send + Sync {
    /// Execute `command` to completion.
    ///
    /// Returns captured stdout on exit code 0, `AzError::CommandFailed`
    /// otherwise. No timeout is applied.
    async fn execute(&self, command: &AzCommand) -> Result<String>;
}

/// Executor that spawns the az binary.
#[derive(Debug, Clone)]
pub struct ProcessAzExecutor {
    program: String,
}

impl Default for ProcessAzExecutor {
    fn default() -> Self {
        // az ships as a batch wrapper on Windows
        let program = if cfg!(windows) { "az.cmd" } else { "az" };
        Self::new(program)
    }
}

impl ProcessAzExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl AzExecutor for ProcessAzExecutor {
    async fn execute(&self, command: &AzCommand) -> Result<String> {
        if command.is_empty() {
            return Err(AzError::EmptyCommand);
        }

        debug!(command = %command, "running az command");
        let start = Instant::now();

        let output = Command::new(&self.program)
            .args(command.args())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // an interrupted operation drops this future; the az child goes with it
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|source| AzError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let duration_ms = start.elapsed().as_millis() as u64;
        debug!(duration_ms, status = ?output.status.code(), "az command finished");

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AzError::CommandFailed {
                command: command.to_string(),
                exit_code: output.status.code(),
                stderr: command.redact(stderr.trim()),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
