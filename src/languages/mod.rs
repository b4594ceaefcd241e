//! Language configuration and adapters
//!
//! The language table maps language identifiers (and their aliases) to a run
//! command and extra environment. Adapters turn a submission plus one raw test
//! input into an [`ExecutableUnit`] the runner can execute.

pub mod adapter;
pub mod go;
pub mod javascript;
pub mod python;

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use serde::Deserialize;

use crate::error::EngineError;
pub use adapter::{adapter_for, ExecutableUnit, LanguageAdapter, SourceFile, ENTRY_POINTS};

/// Languages the engine has an adapter for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    JavaScript,
    Python,
    Go,
}

impl Language {
    /// Canonical identifier as used in requests and the language table
    pub fn id(&self) -> &'static str {
        match self {
            Language::JavaScript => "javascript",
            Language::Python => "python",
            Language::Go => "go",
        }
    }

    fn from_id(id: &str) -> Option<Self> {
        match id {
            "javascript" => Some(Language::JavaScript),
            "python" => Some(Language::Python),
            "go" => Some(Language::Go),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Run configuration for one language
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// Run command (program followed by arguments)
    pub run_command: Vec<String>,
    /// Extra environment variables for the child process
    pub env: Vec<(String, String)>,
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    run_command: String,
    #[serde(default)]
    env: Vec<String>,
    #[serde(default)]
    aliases: Vec<String>,
}

/// Language identifiers and aliases resolved to their configuration
#[derive(Debug, Clone)]
pub struct LanguageTable {
    languages: HashMap<String, (Language, LanguageConfig)>,
}

impl LanguageTable {
    /// Load the table compiled into the binary
    pub fn builtin() -> anyhow::Result<Self> {
        let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));
        Self::parse(content)
    }

    /// Load a table from a TOML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read language table {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse language table {}", path.display()))
    }

    /// Parse a table from TOML source
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let raw_configs: HashMap<String, RawLanguageConfig> = toml::from_str(content)?;
        let mut languages = HashMap::new();

        for (name, raw) in raw_configs {
            let name = name.to_lowercase();
            let language = Language::from_id(&name)
                .ok_or_else(|| anyhow::anyhow!("No adapter available for language: {}", name))?;

            let run_command = into_command(&raw.run_command);
            if run_command.is_empty() {
                anyhow::bail!("Empty run command for {}", name);
            }

            let env = raw
                .env
                .iter()
                .map(|entry| {
                    entry
                        .split_once('=')
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .ok_or_else(|| {
                            anyhow::anyhow!("Invalid env entry for {}: {:?}", name, entry)
                        })
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            let config = LanguageConfig { run_command, env };

            for alias in &raw.aliases {
                languages.insert(alias.to_lowercase(), (language, config.clone()));
            }
            languages.insert(name, (language, config));
        }

        Ok(Self { languages })
    }

    /// Resolve a request's language identifier
    pub fn resolve(&self, name: &str) -> Result<(Language, &LanguageConfig), EngineError> {
        self.languages
            .get(&name.trim().to_lowercase())
            .map(|(language, config)| (*language, config))
            .ok_or_else(|| EngineError::UnsupportedLanguage(name.to_string()))
    }

    /// Generate the program files for a submission once, to be reused for
    /// every test case
    pub fn prepare(&self, name: &str, source_code: &str) -> Result<PreparedProgram, EngineError> {
        let (language, config) = self.resolve(name)?;
        let adapter = adapter_for(language);

        Ok(PreparedProgram {
            language,
            command: config.run_command.clone(),
            env: config.env.clone(),
            files: Arc::new(adapter.files(source_code)),
        })
    }

    /// Build the executable unit for one test input
    pub fn build(
        &self,
        name: &str,
        source_code: &str,
        input: &str,
    ) -> Result<ExecutableUnit, EngineError> {
        Ok(self.prepare(name, source_code)?.unit_for(input))
    }

    /// All identifiers the table accepts, sorted
    pub fn supported(&self) -> Vec<String> {
        let mut names: Vec<String> = self.languages.keys().cloned().collect();
        names.sort();
        names
    }
}

/// A submission already translated into harness and source files
#[derive(Debug, Clone)]
pub struct PreparedProgram {
    pub language: Language,
    command: Vec<String>,
    env: Vec<(String, String)>,
    files: Arc<Vec<SourceFile>>,
}

impl PreparedProgram {
    pub fn unit_for(&self, input: &str) -> ExecutableUnit {
        ExecutableUnit {
            command: self.command.clone(),
            env: self.env.clone(),
            files: Arc::clone(&self.files),
            stdin: Some(input.to_string()),
        }
    }
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}
