//! Local process runner
//!
//! Each unit runs in a fresh temporary directory with a cleared environment,
//! under its own supervisor (see [`super::supervisor`]). Every descendant of
//! the program is killed when the program exits, when the deadline passes, or
//! when the run is dropped.

use async_trait::async_trait;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::Pid;
use std::os::unix::process::ExitStatusExt;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use super::output::read_bounded;
use super::supervisor;
use super::{RawOutcome, Runner};
use crate::config::DEFAULT_OUTPUT_LIMIT_BYTES;
use crate::error::RunError;
use crate::languages::ExecutableUnit;

const FALLBACK_PATH: &str = "/usr/local/bin:/usr/bin:/bin";
const REAP_GRACE: Duration = Duration::from_secs(1);

/// Runner that spawns units as local child processes
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    /// Byte ceiling for each captured stream
    output_limit: usize,
}

impl ProcessRunner {
    pub fn new(output_limit: usize) -> Self {
        Self { output_limit }
    }

    /// Run a unit under a wall-clock deadline
    pub async fn execute(
        &self,
        unit: &ExecutableUnit,
        deadline: Duration,
    ) -> Result<RawOutcome, RunError> {
        let program = unit.command.first().ok_or(RunError::EmptyCommand)?;

        let workspace = tempfile::Builder::new()
            .prefix("judge-")
            .tempdir()
            .map_err(RunError::Workspace)?;
        for file in unit.files.iter() {
            tokio::fs::write(workspace.path().join(&file.name), &file.content)
                .await
                .map_err(RunError::Workspace)?;
        }

        let mut cmd = Command::new(program);
        cmd.args(&unit.command[1..])
            .current_dir(workspace.path())
            .env_clear()
            .env("PATH", host_path())
            .env("HOME", workspace.path())
            .envs(unit.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(if unit.stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0);
        // SAFETY: the hook only issues raw system calls
        unsafe {
            cmd.pre_exec(supervisor::contain);
        }

        debug!("Running {:?} in {}", unit.command, workspace.path().display());

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| RunError::Spawn {
            program: program.clone(),
            source,
        })?;
        let leader = Leader::new(child.id());

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let input = unit.stdin.as_deref();
        let limit = self.output_limit;

        let feed = async move {
            if let (Some(mut pipe), Some(data)) = (stdin, input) {
                // The program may exit without reading its input
                let _ = pipe.write_all(data.as_bytes()).await;
                let _ = pipe.shutdown().await;
            }
        };
        let wait = async {
            let status = child.wait().await;
            if status.is_ok() {
                leader.reaped();
            }
            status
        };
        let collect = async {
            let (_, out, err, status) = tokio::join!(
                feed,
                read_bounded(stdout, limit),
                read_bounded(stderr, limit),
                wait
            );
            (out, err, status)
        };

        let result = tokio::time::timeout(deadline, collect).await;
        let wall_time_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok((out, err, status)) => {
                let status = status.map_err(RunError::Wait)?;

                if out.truncated || err.truncated {
                    warn!(
                        stdout_truncated = out.truncated,
                        stderr_truncated = err.truncated,
                        limit_bytes = limit,
                        "Output exceeded capture limit"
                    );
                }

                Ok(RawOutcome {
                    stdout_truncated: out.truncated,
                    stderr_truncated: err.truncated,
                    stdout: out.into_string(),
                    stderr: err.into_string(),
                    exit_status: status.code(),
                    signal: status.signal(),
                    timed_out: false,
                    wall_time_ms,
                })
            }
            Err(_) => {
                warn!(
                    "Deadline of {}ms exceeded by {:?}, terminating",
                    deadline.as_millis(),
                    unit.command
                );
                leader.terminate();
                let mut reaped = matches!(
                    tokio::time::timeout(REAP_GRACE, child.wait()).await,
                    Ok(Ok(_))
                );
                if !reaped {
                    warn!("Supervisor did not stop in time, killing process group");
                    leader.kill();
                    reaped = matches!(
                        tokio::time::timeout(REAP_GRACE, child.wait()).await,
                        Ok(Ok(_))
                    );
                }
                if reaped {
                    leader.reaped();
                }

                Ok(RawOutcome::timed_out(wall_time_ms))
            }
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_LIMIT_BYTES)
    }
}

#[async_trait]
impl Runner for ProcessRunner {
    async fn run(&self, unit: &ExecutableUnit, deadline: Duration) -> Result<RawOutcome, RunError> {
        self.execute(unit, deadline).await
    }
}

/// The supervisor process of one run
///
/// Signals are only sent while the supervisor is unreaped, so its pid and
/// process group id cannot have been reused.
struct Leader {
    pid: Option<Pid>,
    reaped: AtomicBool,
}

impl Leader {
    fn new(pid: Option<u32>) -> Self {
        Self {
            pid: pid.map(|pid| Pid::from_raw(pid as i32)),
            reaped: AtomicBool::new(false),
        }
    }

    /// Ask the supervisor to kill every descendant and exit
    fn terminate(&self) {
        self.signal(|pid| kill(pid, Signal::SIGTERM));
    }

    /// Kill the supervisor's process group outright
    fn kill(&self) {
        self.signal(|pid| killpg(pid, Signal::SIGKILL));
    }

    fn reaped(&self) {
        self.reaped.store(true, Ordering::SeqCst);
    }

    fn signal(&self, send: impl FnOnce(Pid) -> nix::Result<()>) {
        if let Some(pid) = self.pid {
            if !self.reaped.load(Ordering::SeqCst) {
                // ESRCH just means everyone is already gone
                let _ = send(pid);
            }
        }
    }
}

impl Drop for Leader {
    fn drop(&mut self) {
        // A dropped run is reaped in the background once the supervisor exits
        self.terminate();
    }
}

fn host_path() -> String {
    std::env::var("PATH").unwrap_or_else(|_| FALLBACK_PATH.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::SourceFile;

    fn sh(script: &str) -> ExecutableUnit {
        ExecutableUnit::new(["sh", "-c", script])
    }

    fn on_path(name: &str) -> bool {
        host_path()
            .split(':')
            .any(|dir| std::path::Path::new(dir).join(name).is_file())
    }

    /// Wait for a script to record its pid as a full line
    async fn read_pid(path: &std::path::Path) -> i32 {
        for _ in 0..500 {
            if let Ok(content) = std::fs::read_to_string(path) {
                if content.ends_with('\n') {
                    return content.trim().parse().unwrap();
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("no pid written to {}", path.display());
    }

    /// Poll until the process is gone or left as a zombie
    async fn dies_soon(pid: i32) -> bool {
        for _ in 0..300 {
            match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
                Err(_) => return true,
                Ok(stat) => {
                    let state = stat.rsplit(')').next().unwrap_or("").trim_start();
                    if state.starts_with('Z') {
                        return true;
                    }
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_captures_stdout_and_exit_code() {
        let runner = ProcessRunner::default();
        let outcome = runner
            .execute(&sh("echo hello"), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(outcome.stdout, "hello\n");
        assert_eq!(outcome.exit_status, Some(0));
        assert!(!outcome.timed_out);
        assert!(outcome.is_success());
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_data() {
        let runner = ProcessRunner::default();
        let outcome = runner
            .execute(&sh("echo boom >&2; exit 3"), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(outcome.exit_status, Some(3));
        assert_eq!(outcome.stderr, "boom\n");
        assert!(!outcome.is_success());
    }

    #[tokio::test]
    async fn test_stdin_is_delivered() {
        let runner = ProcessRunner::default();
        let unit = ExecutableUnit::new(["cat"]).with_stdin("[2,7,11,15],9");
        let outcome = runner.execute(&unit, Duration::from_secs(5)).await.unwrap();
        assert_eq!(outcome.stdout, "[2,7,11,15],9");
    }

    #[tokio::test]
    async fn test_files_are_written_to_working_directory() {
        let runner = ProcessRunner::default();
        let unit = ExecutableUnit::new(["cat", "data.txt"])
            .with_files(vec![SourceFile::new("data.txt", "from file")]);
        let outcome = runner.execute(&unit, Duration::from_secs(5)).await.unwrap();
        assert_eq!(outcome.stdout, "from file");
    }

    #[tokio::test]
    async fn test_environment_is_cleared() {
        std::env::set_var("JUDGE_RUNNER_TEST_SECRET", "leaked");
        let runner = ProcessRunner::default();
        let unit = sh("echo \"${JUDGE_RUNNER_TEST_SECRET:-clean} $EXTRA\"").with_env("EXTRA", "set");
        let outcome = runner.execute(&unit, Duration::from_secs(5)).await.unwrap();
        assert_eq!(outcome.stdout.trim(), "clean set");
    }

    #[tokio::test]
    async fn test_deadline_kills_the_process() {
        let runner = ProcessRunner::default();
        let start = Instant::now();
        let outcome = runner
            .execute(&sh("while :; do :; done"), Duration::from_millis(200))
            .await
            .unwrap();

        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_status, None);
        assert!(outcome.wall_time_ms >= 200);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_deadline_kills_descendants_holding_pipes() {
        let runner = ProcessRunner::default();
        let start = Instant::now();
        let outcome = runner
            .execute(&sh("sleep 30 & sleep 30"), Duration::from_millis(200))
            .await
            .unwrap();

        assert!(outcome.timed_out);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_background_child_does_not_outlive_leader() {
        let runner = ProcessRunner::default();
        let start = Instant::now();
        let outcome = runner
            .execute(&sh("sleep 30 & echo done"), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!outcome.timed_out);
        assert_eq!(outcome.stdout, "done\n");
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_new_session_does_not_escape_the_run() {
        if !on_path("setsid") {
            eprintln!("skipping: setsid not found on PATH");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("pid");
        let script = format!(
            "setsid sh -c 'echo $$ > {pid}; exec sleep 30' & \
             while [ ! -s {pid} ]; do sleep 0.01; done; echo done",
            pid = pidfile.display()
        );

        let runner = ProcessRunner::default();
        let start = Instant::now();
        let outcome = runner
            .execute(&sh(&script), Duration::from_secs(5))
            .await
            .unwrap();

        assert!(!outcome.timed_out);
        assert_eq!(outcome.stdout, "done\n");
        assert_eq!(outcome.exit_status, Some(0));
        assert!(start.elapsed() < Duration::from_secs(3));
        let pid = read_pid(&pidfile).await;
        assert!(dies_soon(pid).await, "process {} outlived its run", pid);
    }

    #[tokio::test]
    async fn test_deadline_kills_new_session() {
        if !on_path("setsid") {
            eprintln!("skipping: setsid not found on PATH");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("pid");
        let script = format!(
            "setsid sh -c 'echo $$ > {}; exec sleep 30' & sleep 30",
            pidfile.display()
        );

        let runner = ProcessRunner::default();
        let outcome = runner
            .execute(&sh(&script), Duration::from_millis(500))
            .await
            .unwrap();

        assert!(outcome.timed_out);
        let pid = read_pid(&pidfile).await;
        assert!(dies_soon(pid).await, "process {} outlived its run", pid);
    }

    #[tokio::test]
    async fn test_dropped_run_kills_its_processes() {
        let dir = tempfile::tempdir().unwrap();
        let pidfile = dir.path().join("pid");
        let script = format!("echo $$ > {}; exec sleep 30", pidfile.display());

        let task = tokio::spawn(async move {
            ProcessRunner::default()
                .execute(&sh(&script), Duration::from_secs(60))
                .await
        });
        let pid = read_pid(&pidfile).await;
        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());

        assert!(dies_soon(pid).await, "process {} outlived its run", pid);
    }

    #[tokio::test]
    async fn test_output_is_bounded() {
        let runner = ProcessRunner::new(1024);
        let outcome = runner
            .execute(&sh("head -c 1000000 /dev/zero | tr '\\0' 'x'"), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(outcome.stdout.len(), 1024);
        assert!(outcome.stdout_truncated);
        assert_eq!(outcome.exit_status, Some(0));
    }

    #[tokio::test]
    async fn test_signal_is_reported() {
        let runner = ProcessRunner::default();
        let outcome = runner
            .execute(&sh("kill -SEGV $$"), Duration::from_secs(5))
            .await
            .unwrap();

        assert_eq!(outcome.exit_status, None);
        assert_eq!(outcome.signal, Some(11));
    }

    #[tokio::test]
    async fn test_missing_program_is_spawn_error() {
        let runner = ProcessRunner::default();
        let unit = ExecutableUnit::new(["/nonexistent/interpreter", "main.py"]);
        let err = runner.execute(&unit, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, RunError::Spawn { ref program, .. } if program == "/nonexistent/interpreter"));
    }

    #[tokio::test]
    async fn test_empty_command_is_rejected() {
        let runner = ProcessRunner::default();
        let unit = ExecutableUnit::new(Vec::<String>::new());
        let err = runner.execute(&unit, Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, RunError::EmptyCommand));
    }
}
