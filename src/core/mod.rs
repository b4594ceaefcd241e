//! Core data model shared by every stage of the engine

pub mod testcase;
pub mod verdict;

pub use testcase::{ExecutionRequest, RunMode, TestCase};
pub use verdict::{ErrorKind, OverallStatus, TestOutcome, Verdict};
