//! Runner module - Execution abstraction layer
//!
//! A runner starts the program described by an [`ExecutableUnit`], bounds its
//! wall-clock time and captured output, and reports what happened.
//!
//! The runner module does NOT:
//! - Compare outputs or determine verdicts
//! - Know about languages or harnesses
//! - Treat a non-zero exit as an error

pub mod output;
pub mod process;
mod supervisor;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::RunError;
use crate::languages::ExecutableUnit;

/// Raw result of one execution (no verdict interpretation)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawOutcome {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; absent on timeout or death by signal
    pub exit_status: Option<i32>,
    /// Terminating signal, if any
    pub signal: Option<i32>,
    pub timed_out: bool,
    pub wall_time_ms: u64,
    pub stdout_truncated: bool,
    pub stderr_truncated: bool,
}

impl RawOutcome {
    /// Outcome of a run killed at its deadline
    pub fn timed_out(wall_time_ms: u64) -> Self {
        Self {
            timed_out: true,
            wall_time_ms,
            ..Self::default()
        }
    }

    /// Outcome of a run that exited on its own
    pub fn exited(code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_status: Some(code),
            ..Self::default()
        }
    }

    pub fn with_wall_time(mut self, wall_time_ms: u64) -> Self {
        self.wall_time_ms = wall_time_ms;
        self
    }

    /// Exited with code 0 before the deadline
    pub fn is_success(&self) -> bool {
        !self.timed_out && self.exit_status == Some(0)
    }
}

/// Runner trait for executing programs
#[async_trait]
pub trait Runner: Send + Sync {
    /// Run a unit, killing it (and its descendants) once `deadline` elapses
    async fn run(&self, unit: &ExecutableUnit, deadline: Duration) -> Result<RawOutcome, RunError>;
}

pub use process::ProcessRunner;
