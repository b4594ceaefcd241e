//! Execution orchestrator
//!
//! Fans a request's test cases out to the runner under a shared concurrency
//! bound and reassembles the judged outcomes in their original order.

use std::future::{self, Future};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::aggregator::aggregate;
use crate::classifier::{classify, classify_failure};
use crate::config::EngineConfig;
use crate::core::{ExecutionRequest, TestOutcome, Verdict};
use crate::error::EngineError;
use crate::languages::LanguageTable;
use crate::runner::{ProcessRunner, Runner};

type TaskResult = Result<(usize, TestOutcome), EngineError>;

/// The judging engine
///
/// One engine can serve many requests at once; the concurrency bound applies
/// across all of them.
pub struct Engine {
    config: EngineConfig,
    languages: LanguageTable,
    runner: Arc<dyn Runner>,
    permits: Arc<Semaphore>,
}

impl Engine {
    /// Create an engine that runs programs as local processes
    pub fn new(config: EngineConfig) -> anyhow::Result<Self> {
        let languages = match &config.languages_path {
            Some(path) => LanguageTable::load(path)?,
            None => LanguageTable::builtin()?,
        };
        let runner = Arc::new(ProcessRunner::new(config.output_limit_bytes));
        Ok(Self::with_runner(config, languages, runner))
    }

    /// Create an engine with a custom runner
    pub fn with_runner(
        config: EngineConfig,
        languages: LanguageTable,
        runner: Arc<dyn Runner>,
    ) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_concurrency.max(1)));
        Self {
            config,
            languages,
            runner,
            permits,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn languages(&self) -> &LanguageTable {
        &self.languages
    }

    /// Judge a request and return its verdict
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<Verdict, EngineError> {
        self.execute_with_cancel(request, future::pending::<()>())
            .await
    }

    /// Judge a request, giving up as soon as `cancel` completes
    ///
    /// On cancellation every in-flight process is killed and completed
    /// outcomes are discarded.
    pub async fn execute_with_cancel<F>(
        &self,
        request: &ExecutionRequest,
        cancel: F,
    ) -> Result<Verdict, EngineError>
    where
        F: Future<Output = ()>,
    {
        let outcomes = self.run_tests(request, cancel).await?;
        let verdict = aggregate(outcomes);

        info!(
            language = %request.language,
            status = %verdict.overall_status,
            passed = verdict.passed_count,
            total = verdict.total_count,
            runtime_ms = verdict.total_runtime_ms,
            "Judged submission"
        );

        Ok(verdict)
    }

    /// Run every test case and return the outcomes in request order
    pub async fn run_tests<F>(
        &self,
        request: &ExecutionRequest,
        cancel: F,
    ) -> Result<Vec<TestOutcome>, EngineError>
    where
        F: Future<Output = ()>,
    {
        if request.source_code.len() > self.config.max_source_bytes {
            return Err(EngineError::InvalidRequest(format!(
                "source code is {} bytes, limit is {}",
                request.source_code.len(),
                self.config.max_source_bytes
            )));
        }

        // Fails before any process is spawned
        let program = self
            .languages
            .prepare(&request.language, &request.source_code)?;

        let total = request.test_cases.len();
        info!(
            language = %program.language,
            tests = total,
            "Executing submission"
        );

        let mut tasks: JoinSet<TaskResult> = JoinSet::new();
        for (index, case) in request.test_cases.iter().enumerate() {
            let unit = program.unit_for(&case.input);
            let case = case.clone();
            let runner = Arc::clone(&self.runner);
            let permits = Arc::clone(&self.permits);
            let deadline = self.config.deadline;

            tasks.spawn(async move {
                let _permit = permits
                    .acquire_owned()
                    .await
                    .map_err(|_| EngineError::Internal("worker pool is closed".to_string()))?;

                let start = Instant::now();
                let outcome = match runner.run(&unit, deadline).await {
                    Ok(raw) => classify(&raw, &case),
                    Err(e) => {
                        error!(test = index, "Failed to run test case: {}", e);
                        classify_failure(&e, &case, start.elapsed().as_millis() as u64)
                    }
                };

                Ok((index, outcome))
            });
        }

        let result = tokio::select! {
            result = collect_outcomes(&mut tasks, total) => result,
            _ = cancel => {
                warn!(language = %program.language, "Execution cancelled");
                Err(EngineError::Cancelled)
            }
        };

        if result.is_err() {
            // Wait for aborted tasks so their processes are gone on return
            tasks.shutdown().await;
        }

        result
    }
}

async fn collect_outcomes(
    tasks: &mut JoinSet<TaskResult>,
    total: usize,
) -> Result<Vec<TestOutcome>, EngineError> {
    let mut slots: Vec<Option<TestOutcome>> = vec![None; total];

    while let Some(joined) = tasks.join_next().await {
        let (index, outcome) =
            joined.map_err(|e| EngineError::Internal(format!("test task failed: {}", e)))??;
        slots[index] = Some(outcome);
    }

    slots
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or_else(|| EngineError::Internal("missing test outcome".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ErrorKind, OverallStatus, TestCase};
    use crate::error::RunError;
    use crate::languages::ExecutableUnit;
    use crate::runner::RawOutcome;
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Echoes its stdin after a delay encoded in the input (`"<ms>:<text>"`)
    #[derive(Default)]
    struct FakeRunner {
        calls: AtomicUsize,
        active: AtomicUsize,
        peak: AtomicUsize,
        /// Runs dropped before they finished
        dropped: AtomicUsize,
        fail_spawn: bool,
    }

    struct Unfinished<'a> {
        dropped: &'a AtomicUsize,
        done: bool,
    }

    impl Drop for Unfinished<'_> {
        fn drop(&mut self) {
            if !self.done {
                self.dropped.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[async_trait]
    impl Runner for FakeRunner {
        async fn run(
            &self,
            unit: &ExecutableUnit,
            deadline: Duration,
        ) -> Result<RawOutcome, RunError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_spawn {
                return Err(RunError::Spawn {
                    program: unit.program().to_string(),
                    source: io::Error::new(io::ErrorKind::NotFound, "not found"),
                });
            }

            let mut unfinished = Unfinished {
                dropped: &self.dropped,
                done: false,
            };
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);

            let input = unit.stdin.clone().unwrap_or_default();
            let (delay, text) = input.split_once(':').unwrap_or(("0", input.as_str()));
            let delay = Duration::from_millis(delay.parse().unwrap_or(0));

            let outcome = if delay > deadline {
                tokio::time::sleep(deadline).await;
                RawOutcome::timed_out(deadline.as_millis() as u64)
            } else {
                tokio::time::sleep(delay).await;
                RawOutcome::exited(0, text, "").with_wall_time(delay.as_millis() as u64)
            };

            self.active.fetch_sub(1, Ordering::SeqCst);
            unfinished.done = true;
            Ok(outcome)
        }
    }

    fn engine(runner: Arc<FakeRunner>, config: EngineConfig) -> Engine {
        let languages = LanguageTable::builtin().unwrap();
        Engine::with_runner(config, languages, runner)
    }

    fn request(cases: Vec<TestCase>) -> ExecutionRequest {
        ExecutionRequest::new("python", "def twoSum(a, b):\n    pass\n", cases)
    }

    #[tokio::test]
    async fn test_outcomes_keep_request_order() {
        let runner = Arc::new(FakeRunner::default());
        let engine = engine(runner.clone(), EngineConfig::default().with_max_concurrency(8));

        // Later cases finish first
        let cases: Vec<TestCase> = (0..8)
            .map(|i| TestCase::new(format!("{}:out{}", (8 - i) * 10, i), format!("out{}", i)))
            .collect();
        let verdict = engine.execute(&request(cases.clone())).await.unwrap();

        assert_eq!(verdict.overall_status, OverallStatus::Accepted);
        assert_eq!(verdict.outcomes.len(), cases.len());
        for (case, outcome) in cases.iter().zip(&verdict.outcomes) {
            assert_eq!(outcome.input, case.input);
        }
        assert_eq!(verdict.total_runtime_ms, (1..=8).map(|i| i * 10).sum::<u64>());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let runner = Arc::new(FakeRunner::default());
        let engine = engine(runner.clone(), EngineConfig::default().with_max_concurrency(2));

        let cases = (0..6).map(|i| TestCase::new(format!("30:{}", i), i.to_string())).collect();
        let verdict = engine.execute(&request(cases)).await.unwrap();

        assert_eq!(verdict.passed_count, 6);
        assert_eq!(runner.calls.load(Ordering::SeqCst), 6);
        assert!(runner.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_timeout_marks_whole_submission() {
        let runner = Arc::new(FakeRunner::default());
        let config = EngineConfig::default().with_deadline(Duration::from_millis(50));
        let engine = engine(runner, config);

        let cases = vec![TestCase::new("0:ok", "ok"), TestCase::new("5000:late", "late")];
        let verdict = engine.execute(&request(cases)).await.unwrap();

        assert_eq!(verdict.overall_status, OverallStatus::TimeLimitExceeded);
        assert_eq!(verdict.outcomes[1].error_kind, Some(ErrorKind::TimeoutExceeded));
        assert_eq!(verdict.passed_count, 1);
    }

    #[tokio::test]
    async fn test_unsupported_language_spawns_nothing() {
        let runner = Arc::new(FakeRunner::default());
        let engine = engine(runner.clone(), EngineConfig::default());

        let req = ExecutionRequest::new("ruby", "puts 1", vec![TestCase::new("1", "1")]);
        let err = engine.execute(&req).await.unwrap_err();

        assert!(matches!(err, EngineError::UnsupportedLanguage(ref l) if l == "ruby"));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_oversized_source_is_rejected() {
        let runner = Arc::new(FakeRunner::default());
        let mut config = EngineConfig::default();
        config.max_source_bytes = 8;
        let engine = engine(runner.clone(), config);

        let err = engine
            .execute(&request(vec![TestCase::new("1", "1")]))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::InvalidRequest(_)));
        assert_eq!(runner.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_spawn_failure_becomes_system_error() {
        let runner = Arc::new(FakeRunner {
            fail_spawn: true,
            ..FakeRunner::default()
        });
        let engine = engine(runner, EngineConfig::default());

        let verdict = engine
            .execute(&request(vec![TestCase::new("1", "1")]))
            .await
            .unwrap();

        assert_eq!(verdict.overall_status, OverallStatus::SystemError);
        assert_eq!(verdict.outcomes[0].error_kind, Some(ErrorKind::SpawnFailure));
        assert!(verdict.outcomes[0].actual_output.contains("python3"));
    }

    #[tokio::test]
    async fn test_cancellation_discards_outcomes() {
        let runner = Arc::new(FakeRunner::default());
        let engine = engine(runner.clone(), EngineConfig::default().with_max_concurrency(4));

        let cases = vec![TestCase::new("0:fast", "fast"), TestCase::new("4000:slow", "slow")];
        let start = Instant::now();
        let err = engine
            .execute_with_cancel(
                &request(cases),
                tokio::time::sleep(Duration::from_millis(50)),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::Cancelled));
        assert!(start.elapsed() < Duration::from_secs(2));
        // The slow run was dropped before the call returned
        assert_eq!(runner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(runner.dropped.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_empty_request_is_accepted() {
        let runner = Arc::new(FakeRunner::default());
        let engine = engine(runner, EngineConfig::default());

        let verdict = engine.execute(&request(Vec::new())).await.unwrap();
        assert_eq!(verdict.overall_status, OverallStatus::Accepted);
        assert_eq!(verdict.total_count, 0);
    }
}
