use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a single test case failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    TimeoutExceeded,
    RuntimeError,
    WrongAnswer,
    /// The program could not be started at all
    SpawnFailure,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::TimeoutExceeded => "timeout_exceeded",
            ErrorKind::RuntimeError => "runtime_error",
            ErrorKind::WrongAnswer => "wrong_answer",
            ErrorKind::SpawnFailure => "spawn_failure",
        };
        write!(f, "{}", s)
    }
}

/// Submission-level status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Accepted,
    WrongAnswer,
    TimeLimitExceeded,
    RuntimeError,
    SystemError,
}

impl OverallStatus {
    pub fn is_accepted(&self) -> bool {
        matches!(self, OverallStatus::Accepted)
    }
}

impl fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OverallStatus::Accepted => "Accepted",
            OverallStatus::WrongAnswer => "Wrong Answer",
            OverallStatus::TimeLimitExceeded => "Time Limit Exceeded",
            OverallStatus::RuntimeError => "Runtime Error",
            OverallStatus::SystemError => "System Error",
        };
        write!(f, "{}", s)
    }
}

/// Judged result of one test case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub input: String,
    pub expected_output: String,
    pub actual_output: String,
    pub passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Wall time in milliseconds, measured for every outcome kind
    pub runtime_ms: u64,
}

/// Final result of a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    pub overall_status: OverallStatus,
    pub outcomes: Vec<TestOutcome>,
    pub total_runtime_ms: u64,
    pub passed_count: usize,
    pub total_count: usize,
}

impl Verdict {
    /// First failing outcome, in test-case order
    pub fn first_failure(&self) -> Option<(usize, &TestOutcome)> {
        self.outcomes.iter().enumerate().find(|(_, o)| !o.passed)
    }
}
