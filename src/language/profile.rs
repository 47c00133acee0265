//! Data-driven language handlers.
//!
//! A `LanguageProfile` names marker files (glob patterns relative to the
//! project root) and the shell commands that bootstrap tests or install
//! linters and formatters. The built-in ecosystems are profiles too; extra
//! ones come from `[[languages]]` in brownfield.toml.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use super::{Confidence, DetectionResult, InstallResult, LanguageHandler, TestSetupResult};
use crate::errors::Result;
use crate::tools::{ToolCommand, ToolRunner};
use crate::util::extract_json_object;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerRule {
    /// Glob relative to the project root, e.g. `Cargo.toml` or `src/*.py`
    pub pattern: String,
    #[serde(default)]
    pub confidence: Confidence,
}

impl MarkerRule {
    fn new(pattern: &str, confidence: Confidence) -> Self {
        Self {
            pattern: pattern.to_string(),
            confidence,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LanguageProfile {
    pub key: String,
    #[serde(default)]
    pub markers: Vec<MarkerRule>,
    /// Test framework reported on detection
    #[serde(default)]
    pub framework: Option<String>,
    /// Receives `BROWNFIELD_CORE_MODULES` and `BROWNFIELD_COVERAGE_TARGET`;
    /// may print a `TestSetupResult` JSON object
    #[serde(default)]
    pub test_command: Option<String>,
    #[serde(default)]
    pub linter_commands: Vec<String>,
    #[serde(default)]
    pub formatter_commands: Vec<String>,
}

pub fn builtin_profiles() -> Vec<LanguageProfile> {
    vec![
        LanguageProfile {
            key: "rust".to_string(),
            markers: vec![
                MarkerRule::new("Cargo.toml", Confidence::High),
                MarkerRule::new("src/*.rs", Confidence::Medium),
            ],
            framework: Some("cargo-test".to_string()),
            test_command: Some("cargo test --quiet --no-run".to_string()),
            linter_commands: vec!["rustup component add clippy".to_string()],
            formatter_commands: vec!["rustup component add rustfmt".to_string()],
        },
        LanguageProfile {
            key: "python".to_string(),
            markers: vec![
                MarkerRule::new("pyproject.toml", Confidence::High),
                MarkerRule::new("setup.py", Confidence::High),
                MarkerRule::new("requirements*.txt", Confidence::Medium),
                MarkerRule::new("*.py", Confidence::Low),
            ],
            framework: Some("pytest".to_string()),
            test_command: Some("python -m pip install --quiet pytest pytest-cov".to_string()),
            linter_commands: vec!["python -m pip install --quiet ruff".to_string()],
            formatter_commands: vec!["python -m pip install --quiet black".to_string()],
        },
        LanguageProfile {
            key: "javascript".to_string(),
            markers: vec![
                MarkerRule::new("package.json", Confidence::High),
                MarkerRule::new("*.js", Confidence::Low),
            ],
            framework: Some("jest".to_string()),
            test_command: Some("npm install --save-dev --silent jest".to_string()),
            linter_commands: vec!["npm install --save-dev --silent eslint".to_string()],
            formatter_commands: vec!["npm install --save-dev --silent prettier".to_string()],
        },
    ]
}

pub struct ProfileHandler {
    profile: LanguageProfile,
    runner: ToolRunner,
}

impl ProfileHandler {
    pub fn new(profile: LanguageProfile, runner: ToolRunner) -> Self {
        Self { profile, runner }
    }

    pub fn profile(&self) -> &LanguageProfile {
        &self.profile
    }

    fn marker_matches(root: &Path, pattern: &str) -> bool {
        let full = format!(
            "{}/{}",
            glob::Pattern::escape(&root.to_string_lossy()),
            pattern
        );
        match glob::glob(&full) {
            Ok(mut paths) => paths.any(|p| p.is_ok()),
            Err(e) => {
                warn!(pattern, error = %e, "invalid marker pattern");
                false
            }
        }
    }

    async fn run_all(&self, kind: &str, commands: &[String], root: &Path) -> Result<InstallResult> {
        let mut installed = Vec::new();
        for command in commands {
            let name = command
                .split_whitespace()
                .last()
                .unwrap_or(command.as_str())
                .to_string();
            let tool = ToolCommand::new(format!("{}-{}", self.profile.key, kind), command.as_str());
            self.runner.run(&tool, root).await?;
            info!(language = %self.profile.key, %kind, tool = %name, "installed");
            installed.push(name);
        }
        Ok(InstallResult { installed })
    }
}

#[async_trait]
impl LanguageHandler for ProfileHandler {
    fn key(&self) -> &str {
        &self.profile.key
    }

    async fn detect(&self, root: &Path) -> Result<Option<DetectionResult>> {
        let confidence = self
            .profile
            .markers
            .iter()
            .filter(|m| Self::marker_matches(root, &m.pattern))
            .map(|m| m.confidence)
            .max();
        Ok(confidence.map(|confidence| DetectionResult {
            language: self.profile.key.clone(),
            confidence,
            framework: self.profile.framework.clone(),
        }))
    }

    async fn bootstrap_tests(
        &self,
        root: &Path,
        core_modules: &[String],
        coverage_target: f64,
    ) -> Result<TestSetupResult> {
        let framework = self.profile.framework.clone().unwrap_or_default();
        let Some(command) = &self.profile.test_command else {
            return Ok(TestSetupResult {
                framework,
                coverage: None,
                tests_generated: 0,
            });
        };

        let tool = ToolCommand::new(format!("{}-tests", self.profile.key), command.as_str())
            .with_env("BROWNFIELD_CORE_MODULES", core_modules.join(","))
            .with_env("BROWNFIELD_COVERAGE_TARGET", coverage_target.to_string());
        let output = self.runner.run(&tool, root).await?;

        let reported = extract_json_object(&output.stdout)
            .and_then(|json| serde_json::from_str::<TestSetupResult>(&json).ok());
        let mut result = reported.unwrap_or(TestSetupResult {
            framework: String::new(),
            coverage: None,
            tests_generated: 0,
        });
        if result.framework.is_empty() {
            result.framework = framework;
        }
        Ok(result)
    }

    async fn install_linters(&self, root: &Path) -> Result<InstallResult> {
        self.run_all("linters", &self.profile.linter_commands, root).await
    }

    async fn install_formatters(&self, root: &Path) -> Result<InstallResult> {
        self.run_all("formatters", &self.profile.formatter_commands, root).await
    }
}
