//! Error types
//!
//! Request-level failures abort a whole execution and are returned to the
//! caller. Runner failures are infrastructure faults for a single test case;
//! the orchestrator converts them into failing outcomes.

use std::io;
use thiserror::Error;

/// Failure of a whole execution request
#[derive(Debug, Error)]
pub enum EngineError {
    /// No adapter exists for the requested language
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    /// The caller aborted the request before it completed
    #[error("execution cancelled")]
    Cancelled,

    /// The request was rejected before anything ran
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// A worker task panicked or the worker pool was shut down
    #[error("internal error: {0}")]
    Internal(String),
}

/// Infrastructure failure while running one executable unit
#[derive(Debug, Error)]
pub enum RunError {
    /// The temporary working directory could not be prepared
    #[error("failed to prepare workspace: {0}")]
    Workspace(#[source] io::Error),

    /// The program could not be started (missing binary, permission denied)
    #[error("failed to spawn `{program}`: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The unit carried no command
    #[error("no command specified for execution")]
    EmptyCommand,

    /// Waiting on the child process failed
    #[error("failed to wait for process: {0}")]
    Wait(#[source] io::Error),
}
