//! Code execution and judging engine
//!
//! Runs a submitted program against an ordered list of test cases, each in
//! its own short-lived process, and reduces the results into one verdict.
//!
//! ```no_run
//! use judge_engine::{Engine, EngineConfig, ExecutionRequest, TestCase};
//!
//! # async fn judge() -> anyhow::Result<()> {
//! let engine = Engine::new(EngineConfig::default())?;
//! let request = ExecutionRequest::new(
//!     "python",
//!     "def twoSum(nums, target):\n    return [0, 1]\n",
//!     vec![TestCase::new("[2,7,11,15],9", "[0,1]")],
//! );
//! let verdict = engine.execute(&request).await?;
//! println!("{}", verdict.overall_status);
//! # Ok(())
//! # }
//! ```

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod core;
pub mod error;
pub mod languages;
pub mod orchestrator;
pub mod runner;

pub use crate::config::EngineConfig;
pub use crate::core::{
    ErrorKind, ExecutionRequest, OverallStatus, RunMode, TestCase, TestOutcome, Verdict,
};
pub use crate::error::{EngineError, RunError};
pub use crate::languages::{Language, LanguageTable};
pub use crate::orchestrator::Engine;
pub use crate::runner::{ProcessRunner, RawOutcome, Runner};
