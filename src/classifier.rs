//! Result classifier
//!
//! Turns a runner's raw outcome into a judged test outcome. Rules apply in
//! priority order: timeout, runtime fault, then output comparison.

use tracing::debug;

use crate::core::{ErrorKind, TestCase, TestOutcome};
use crate::error::RunError;
use crate::runner::RawOutcome;

pub const TIME_LIMIT_MESSAGE: &str = "Time Limit Exceeded";

/// Judge one raw outcome against its test case
pub fn classify(raw: &RawOutcome, case: &TestCase) -> TestOutcome {
    let expected = case.expected_output.trim().to_string();

    let (actual_output, error_kind) = if raw.timed_out {
        (
            TIME_LIMIT_MESSAGE.to_string(),
            Some(ErrorKind::TimeoutExceeded),
        )
    } else if is_runtime_error(raw) {
        (runtime_message(raw), Some(ErrorKind::RuntimeError))
    } else {
        let actual = raw.stdout.trim().to_string();
        let kind = (!compare_output(&actual, &expected)).then_some(ErrorKind::WrongAnswer);
        (actual, kind)
    };

    debug!(
        runtime_ms = raw.wall_time_ms,
        error_kind = ?error_kind,
        "Classified test case"
    );

    TestOutcome {
        input: case.input.clone(),
        expected_output: expected,
        actual_output,
        passed: error_kind.is_none(),
        error_kind,
        runtime_ms: raw.wall_time_ms,
    }
}

/// Outcome for a test case whose program never ran
pub fn classify_failure(err: &RunError, case: &TestCase, runtime_ms: u64) -> TestOutcome {
    TestOutcome {
        input: case.input.clone(),
        expected_output: case.expected_output.trim().to_string(),
        actual_output: err.to_string(),
        passed: false,
        error_kind: Some(ErrorKind::SpawnFailure),
        runtime_ms,
    }
}

fn is_runtime_error(raw: &RawOutcome) -> bool {
    raw.exit_status != Some(0) || !raw.stderr.trim().is_empty()
}

fn runtime_message(raw: &RawOutcome) -> String {
    let stderr = raw.stderr.trim();
    if !stderr.is_empty() {
        return stderr.to_string();
    }

    match (raw.exit_status, raw.signal) {
        (_, Some(signal)) => format!("Process terminated by signal {}", signal),
        (Some(code), None) => format!("Process exited with code {}", code),
        (None, None) => "Process exited abnormally".to_string(),
    }
}

/// Exact comparison after trimming surrounding whitespace
fn compare_output(actual: &str, expected: &str) -> bool {
    actual.trim() == expected.trim()
}
