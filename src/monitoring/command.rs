//! Child processes with a deadline.
//!
//! Children run on tokio's process driver, so stdout and stderr are read
//! while the child is still running and a chatty child cannot stall on a
//! full pipe. Synchronous callers go through [`run_with_timeout`]: on a
//! runtime thread (e.g. inside `spawn_blocking`) the current handle drives
//! the child, otherwise a current-thread runtime is built for the call.

use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;
use tokio::runtime::{Builder, Handle};

#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed waiting on {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} timed out after {}s", .timeout.as_secs_f64())]
    TimedOut { program: String, timeout: Duration },
    #[error("no async runtime available for child process: {source}")]
    Runtime {
        #[source]
        source: std::io::Error,
    },
}

/// Exit state and captured output of a finished child.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status.success()
    }
}

/// Blocking form of [`run`]. Must not be called from async code.
pub fn run_with_timeout(cmd: Command, timeout: Duration) -> Result<CommandOutput, CommandError> {
    match Handle::try_current() {
        Ok(handle) => handle.block_on(run(cmd, timeout)),
        Err(_) => Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| CommandError::Runtime { source })?
            .block_on(run(cmd, timeout)),
    }
}

/// Run `cmd` to completion, killing it if it outlives `timeout`.
pub async fn run(mut cmd: Command, timeout: Duration) -> Result<CommandOutput, CommandError> {
    let program = cmd.as_std().get_program().to_string_lossy().into_owned();
    let child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| CommandError::Spawn {
            program: program.clone(),
            source,
        })?;

    // Dropping the wait future on timeout drops the child, which kills it
    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(Ok(output)) => Ok(CommandOutput {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }),
        Ok(Err(source)) => Err(CommandError::Wait { program, source }),
        Err(_) => {
            tracing::debug!(program = %program, "Child killed after timeout");
            Err(CommandError::TimedOut { program, timeout })
        }
    }
}
