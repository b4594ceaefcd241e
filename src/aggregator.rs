use crate::core::{ErrorKind, OverallStatus, TestOutcome, Verdict};

/// Reduce ordered test outcomes into a submission verdict
///
/// Status priority: time limit, runtime error, system error, wrong answer.
pub fn aggregate(outcomes: Vec<TestOutcome>) -> Verdict {
    let has = |kind: ErrorKind| outcomes.iter().any(|o| o.error_kind == Some(kind));

    let overall_status = if has(ErrorKind::TimeoutExceeded) {
        OverallStatus::TimeLimitExceeded
    } else if has(ErrorKind::RuntimeError) {
        OverallStatus::RuntimeError
    } else if has(ErrorKind::SpawnFailure) {
        OverallStatus::SystemError
    } else if outcomes.iter().any(|o| !o.passed) {
        OverallStatus::WrongAnswer
    } else {
        OverallStatus::Accepted
    };

    Verdict {
        overall_status,
        total_runtime_ms: outcomes.iter().map(|o| o.runtime_ms).sum(),
        passed_count: outcomes.iter().filter(|o| o.passed).count(),
        total_count: outcomes.len(),
        outcomes,
    }
}
