use std::sync::Arc;

use super::go::GoAdapter;
use super::javascript::JavaScriptAdapter;
use super::python::PythonAdapter;
use super::Language;

/// Function names a harness looks for, in priority order
pub const ENTRY_POINTS: &[&str] = &[
    "twoSum",
    "isPalindrome",
    "maxProfit",
    "isValid",
    "reverseList",
];

/// A file written into the execution working directory
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub name: String,
    pub content: String,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// Everything the runner needs to execute one test case
#[derive(Debug, Clone)]
pub struct ExecutableUnit {
    /// Program followed by its arguments
    pub command: Vec<String>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
    /// Files placed in the working directory before the program starts
    pub files: Arc<Vec<SourceFile>>,
    /// Bytes fed to standard input
    pub stdin: Option<String>,
}

impl ExecutableUnit {
    pub fn new(command: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            command: command.into_iter().map(Into::into).collect(),
            env: Vec::new(),
            files: Arc::new(Vec::new()),
            stdin: None,
        }
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn with_files(mut self, files: Vec<SourceFile>) -> Self {
        self.files = Arc::new(files);
        self
    }

    pub fn with_stdin(mut self, stdin: impl Into<String>) -> Self {
        self.stdin = Some(stdin.into());
        self
    }

    pub fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or_default()
    }
}

/// Per-language translation of a submission into program files
///
/// The submitted source always lands in its own file, untouched. The harness
/// file locates the entry point, reads the argument list from stdin and
/// prints the return value as one line of JSON.
pub trait LanguageAdapter: Send + Sync {
    fn language(&self) -> Language;
    fn files(&self, source_code: &str) -> Vec<SourceFile>;
}

pub fn adapter_for(language: Language) -> Box<dyn LanguageAdapter> {
    match language {
        Language::JavaScript => Box::new(JavaScriptAdapter),
        Language::Python => Box::new(PythonAdapter),
        Language::Go => Box::new(GoAdapter),
    }
}

/// Entry point names as a comma separated list of double-quoted literals
pub(crate) fn quoted_entry_points() -> String {
    ENTRY_POINTS
        .iter()
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(", ")
}
