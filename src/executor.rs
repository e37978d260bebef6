//! Execution controller for suggested commands.
//!
//! Commands run through `sh -c` with the operator's terminal inherited, so
//! interactive programs (editors, pagers, prompts) behave normally. Every run
//! is bracketed in the history: `COMMAND` before the process starts, `RESULT`
//! after it exits.

use crate::error::HearthError;
use crate::history::{EntryKind, HistoryStore};
use async_trait::async_trait;
use std::fmt;
use std::process::ExitStatus;
use tokio::process::Command;
use tracing::{info, warn};

/// Exit code recorded when the shell itself cannot be started.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStatus {
    Success,
    Failure,
}

/// What happened when a command ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub status: ExecutionStatus,
    pub exit_code: i32,
}

impl ExecutionOutcome {
    pub fn from_exit_code(exit_code: i32) -> Self {
        let status = if exit_code == 0 {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Failure
        };
        Self { status, exit_code }
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Failure => write!(f, "failure (exit {})", self.exit_code),
        }
    }
}

// =============================================================================
// Traits for Dependency Injection
// =============================================================================

/// Trait for running a command line in a shell.
///
/// This abstraction enables testing without spawning real processes.
#[async_trait]
pub trait ShellRunner: Send + Sync {
    /// Runs `command_line` to completion and returns its exit code.
    async fn run(&self, command_line: &str) -> std::io::Result<i32>;
}

/// Default runner: `sh -c <command_line>` with inherited stdio.
pub struct SystemShell;

#[async_trait]
impl ShellRunner for SystemShell {
    async fn run(&self, command_line: &str) -> std::io::Result<i32> {
        let status = Command::new("sh").arg("-c").arg(command_line).status().await?;
        Ok(exit_code_of(status))
    }
}

/// Maps an exit status to a shell-style exit code.
///
/// Processes killed by a signal report `128 + signal`, as shells do.
pub fn exit_code_of(status: ExitStatus) -> i32 {
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
    1
}

// =============================================================================
// Executor Implementation
// =============================================================================

/// Runs or skips candidate commands and records the outcome.
pub struct Executor {
    runner: Box<dyn ShellRunner>,
}

impl Executor {
    pub fn new() -> Self {
        Self::with_runner(Box::new(SystemShell))
    }

    /// Creates an executor with a custom runner (for testing).
    pub fn with_runner(runner: Box<dyn ShellRunner>) -> Self {
        Self { runner }
    }

    /// Runs `command_line` and appends `COMMAND` and `RESULT` entries.
    ///
    /// A non-zero exit is returned as a failed [`ExecutionOutcome`], not as an
    /// error. Errors are reserved for history storage failures.
    pub async fn execute(
        &self,
        history: &HistoryStore,
        command_line: &str,
    ) -> Result<ExecutionOutcome, HearthError> {
        history.append(EntryKind::Command, command_line)?;

        info!("Executing command: {}", command_line);
        let outcome = match self.runner.run(command_line).await {
            Ok(code) => ExecutionOutcome::from_exit_code(code),
            Err(e) => {
                warn!("Could not start shell for '{}': {}", command_line, e);
                ExecutionOutcome::from_exit_code(SPAWN_FAILURE_EXIT_CODE)
            }
        };

        if !outcome.is_success() {
            warn!("Command failed with exit code {}", outcome.exit_code);
        }
        history.append(EntryKind::Result, &outcome.to_string())?;
        Ok(outcome)
    }

    /// Records that the operator declined `command_line`.
    pub fn skip(&self, history: &HistoryStore, command_line: &str) -> Result<(), HearthError> {
        info!("Skipping command: {}", command_line);
        history.append(EntryKind::Skip, command_line)?;
        Ok(())
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}
