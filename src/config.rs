//! Engine configuration
//!
//! Every tunable is an explicit value handed to the engine at construction.
//! `from_env` reads overrides from `JUDGE_*` environment variables.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_DEADLINE_MS: u64 = 5_000;
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1024 * 1024;
pub const DEFAULT_MAX_SOURCE_BYTES: usize = 64 * 1024;

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Wall-clock deadline applied to every test case
    pub deadline: Duration,
    /// Maximum number of test-case processes alive at once
    pub max_concurrency: usize,
    /// Byte ceiling for each captured stream (stdout, stderr)
    pub output_limit_bytes: usize,
    /// Submissions larger than this are rejected up front
    pub max_source_bytes: usize,
    /// Optional override for the built-in language table
    pub languages_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            deadline: Duration::from_millis(DEFAULT_DEADLINE_MS),
            max_concurrency: default_concurrency(),
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            max_source_bytes: DEFAULT_MAX_SOURCE_BYTES,
            languages_path: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(ms) = parse_var::<u64>(&lookup, "JUDGE_DEADLINE_MS")? {
            if ms == 0 {
                anyhow::bail!("JUDGE_DEADLINE_MS must be greater than zero");
            }
            config.deadline = Duration::from_millis(ms);
        }
        if let Some(n) = parse_var::<usize>(&lookup, "JUDGE_MAX_CONCURRENCY")? {
            if n == 0 {
                anyhow::bail!("JUDGE_MAX_CONCURRENCY must be greater than zero");
            }
            config.max_concurrency = n;
        }
        if let Some(bytes) = parse_var::<usize>(&lookup, "JUDGE_OUTPUT_LIMIT_BYTES")? {
            config.output_limit_bytes = bytes;
        }
        if let Some(bytes) = parse_var::<usize>(&lookup, "JUDGE_MAX_SOURCE_BYTES")? {
            config.max_source_bytes = bytes;
        }
        config.languages_path = lookup("JUDGE_LANGUAGES_CONFIG").map(PathBuf::from);

        Ok(config)
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_output_limit(mut self, bytes: usize) -> Self {
        self.output_limit_bytes = bytes;
        self
    }
}

/// Twice the number of available cores
fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 2)
        .unwrap_or(2)
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => {
            let value = raw
                .trim()
                .parse::<T>()
                .with_context(|| format!("Invalid value for {}: {:?}", key, raw))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}
