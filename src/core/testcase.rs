use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One input/expected-output pair of a problem
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub input: String,
    pub expected_output: String,
    /// Hidden cases are only used by the submit flow
    #[serde(default)]
    pub hidden: bool,
}

impl TestCase {
    pub fn new(input: impl Into<String>, expected_output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            expected_output: expected_output.into(),
            hidden: false,
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// A program plus the ordered test cases to judge it against
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub language: String,
    pub source_code: String,
    pub test_cases: Vec<TestCase>,
}

impl ExecutionRequest {
    pub fn new(
        language: impl Into<String>,
        source_code: impl Into<String>,
        test_cases: Vec<TestCase>,
    ) -> Self {
        Self {
            language: language.into(),
            source_code: source_code.into(),
            test_cases,
        }
    }
}

/// Which test cases a caller hands to the engine
///
/// The engine itself never looks at `hidden`; filtering is the caller's job.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Visible (example) cases only
    Run,
    /// Every case, hidden ones included
    #[default]
    Submit,
}

impl RunMode {
    pub fn select(self, cases: &[TestCase]) -> Vec<TestCase> {
        match self {
            RunMode::Run => cases.iter().filter(|tc| !tc.hidden).cloned().collect(),
            RunMode::Submit => cases.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cases() -> Vec<TestCase> {
        vec![
            TestCase::new("1", "1"),
            TestCase::new("2", "2").hidden(),
            TestCase::new("3", "3"),
        ]
    }

    #[test]
    fn test_run_mode_keeps_only_visible_cases_in_order() {
        let selected = RunMode::Run.select(&cases());
        let inputs: Vec<&str> = selected.iter().map(|tc| tc.input.as_str()).collect();
        assert_eq!(inputs, vec!["1", "3"]);
    }

    #[test]
    fn test_submit_mode_keeps_everything() {
        assert_eq!(RunMode::Submit.select(&cases()), cases());
    }

    #[test]
    fn test_hidden_defaults_to_false_when_absent() {
        let tc: TestCase =
            serde_json::from_str(r#"{"input":"[1]","expected_output":"1"}"#).unwrap();
        assert!(!tc.hidden);
    }

    #[test]
    fn test_run_mode_values() {
        assert_eq!(RunMode::from_str("run", false), Ok(RunMode::Run));
        assert_eq!(RunMode::from_str("SUBMIT", true), Ok(RunMode::Submit));
        assert!(RunMode::from_str("grade", true).is_err());
    }
}
