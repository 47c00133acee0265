//! Configuration for brownfield projects.
//!
//! Settings are read from `.brownfield/brownfield.toml`, layered as
//! user file → project file → environment → CLI flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [project]
//! language = "python"
//! core_modules = ["src/billing", "src/api"]
//!
//! [tools]
//! timeout_secs = 300
//! retries = 1
//!
//! [metrics]
//! command = "./scripts/metrics.sh --json"
//!
//! [thresholds]
//! coverage_min = 60
//! complexity_max = 10
//! max_critical_vulnerabilities = 0
//!
//! [regression]
//! coverage_floor = 50
//! complexity_ceiling = 15
//!
//! [[gates]]
//! id = "unsafe"
//! name = "No unsafe blocks"
//! metric_path = "extra.rust.unsafe_blocks"
//! operator = "eq"
//! threshold = 0
//! severity = "recommended"
//! phase = "quality"
//!
//! [[languages]]
//! key = "go"
//! framework = "go-test"
//! markers = [{ pattern = "go.mod", confidence = "high" }]
//! linter_commands = ["go install honnef.co/go/tools/cmd/staticcheck@latest"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::gates::{Gate, GateSet, GateThresholds, evaluate_gate};
use crate::language::{LanguageProfile, builtin_profiles};
use crate::metrics::Metrics;
use crate::state::{RegressionRule, RegressionThresholds, default_rules};
use crate::tools::{DEFAULT_TOOL_TIMEOUT_SECS, ToolRunner};

/// Name of the project configuration file inside `.brownfield/`.
pub const CONFIG_FILE: &str = "brownfield.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectSection {
    /// Language key to use instead of detection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Modules the test bootstrap should focus on
    #[serde(default)]
    pub core_modules: Vec<String>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TOOL_TIMEOUT_SECS
}

fn default_retries() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Retries after a timed-out attempt
    #[serde(default = "default_retries")]
    pub retries: u32,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retries: default_retries(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsSection {
    /// Shell command printing a metrics JSON object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// Contents of `brownfield.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BrownfieldToml {
    #[serde(default)]
    pub project: ProjectSection,
    #[serde(default)]
    pub tools: ToolsSection,
    #[serde(default)]
    pub metrics: MetricsSection,
    #[serde(default)]
    pub thresholds: GateThresholds,
    #[serde(default)]
    pub regression: RegressionThresholds,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub gates: Vec<Gate>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<LanguageProfile>,
}

impl BrownfieldToml {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse brownfield.toml")
    }

    /// Load `.brownfield/brownfield.toml`, or defaults when it is absent.
    pub fn load_or_default(brownfield_dir: &Path) -> Result<Self> {
        let config_path = brownfield_dir.join(CONFIG_FILE);
        if config_path.exists() {
            Self::load(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Merge the user file and the project file; project keys win.
    pub fn load_layered(user_file: Option<&Path>, project_file: &Path) -> Result<Self> {
        let mut merged = toml::Table::new();
        for path in user_file.into_iter().chain(std::iter::once(project_file)) {
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let table: toml::Table = content
                .parse()
                .with_context(|| format!("Failed to parse {}", path.display()))?;
            merge_tables(&mut merged, table);
        }
        let content = toml::to_string(&merged).context("Failed to merge configuration")?;
        Self::parse(&content)
    }

    /// Save configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize brownfield.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }

    /// Validate the configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.tools.timeout_secs == 0 {
            warnings.push("[tools] timeout_secs is 0; every tool call would time out".to_string());
        }

        if !(0.0..=100.0).contains(&self.thresholds.coverage_min) {
            warnings.push(format!(
                "[thresholds] coverage_min {} is outside 0-100",
                self.thresholds.coverage_min
            ));
        }
        if self.regression.coverage_floor > self.thresholds.coverage_min {
            warnings.push(format!(
                "[regression] coverage_floor {} is above coverage_min {}; a passing coverage gate would count as a regression",
                self.regression.coverage_floor, self.thresholds.coverage_min
            ));
        }
        if self.regression.complexity_ceiling < self.thresholds.complexity_max {
            warnings.push(format!(
                "[regression] complexity_ceiling {} is below complexity_max {}; a passing complexity gate would count as a regression",
                self.regression.complexity_ceiling, self.thresholds.complexity_max
            ));
        }

        let mut seen = HashSet::new();
        let probe = Metrics::default();
        for gate in &self.gates {
            if !seen.insert(gate.id.as_str()) {
                warnings.push(format!("Duplicate custom gate id '{}'", gate.id));
            }
            // extra.* paths only exist once a tool reports them
            if gate.metric_path.starts_with("extra.") {
                continue;
            }
            if let Err(e) = evaluate_gate(gate, &probe) {
                warnings.push(e.to_string());
            }
        }

        let mut known: Vec<String> = builtin_profiles().into_iter().map(|p| p.key).collect();
        for profile in &self.languages {
            if profile.key.trim().is_empty() {
                warnings.push("[[languages]] entry with an empty key".to_string());
            }
            for marker in &profile.markers {
                if glob::Pattern::new(&marker.pattern).is_err() {
                    warnings.push(format!(
                        "Invalid marker pattern '{}' for language '{}'",
                        marker.pattern, profile.key
                    ));
                }
            }
            known.push(profile.key.clone());
        }
        if let Some(language) = &self.project.language
            && !known.contains(language)
        {
            warnings.push(format!(
                "[project] language '{}' has no handler (known: {})",
                language,
                known.join(", ")
            ));
        }

        warnings
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Location of the per-user configuration file.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("brownfield").join("config.toml"))
}

/// Effective configuration for one invocation.
///
/// Merges settings from:
/// 1. user config file
/// 2. `.brownfield/brownfield.toml`
/// 3. Environment variables
/// 4. CLI arguments
#[derive(Debug, Clone)]
pub struct BrownfieldConfig {
    pub project_dir: PathBuf,
    pub brownfield_dir: PathBuf,
    pub toml: BrownfieldToml,
    pub verbose: bool,
    /// CLI override for the tool timeout
    pub cli_timeout_secs: Option<u64>,
}

impl BrownfieldConfig {
    pub fn new(project_dir: PathBuf) -> Result<Self> {
        Self::with_user_file(project_dir, user_config_path().as_deref())
    }

    pub fn with_user_file(project_dir: PathBuf, user_file: Option<&Path>) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let brownfield_dir = crate::init::get_brownfield_dir(&project_dir);
        let toml = BrownfieldToml::load_layered(user_file, &brownfield_dir.join(CONFIG_FILE))?;

        Ok(Self {
            project_dir,
            brownfield_dir,
            toml,
            verbose: false,
            cli_timeout_secs: None,
        })
    }

    /// Create a BrownfieldConfig with CLI overrides.
    pub fn with_cli_args(project_dir: PathBuf, verbose: bool, timeout_secs: Option<u64>) -> Result<Self> {
        let mut config = Self::new(project_dir)?;
        config.verbose = verbose;
        config.cli_timeout_secs = timeout_secs;
        Ok(config)
    }

    /// Tool timeout in seconds (CLI → env → file).
    pub fn tool_timeout_secs(&self) -> u64 {
        self.cli_timeout_secs
            .or_else(|| {
                std::env::var("BROWNFIELD_TOOL_TIMEOUT")
                    .ok()
                    .and_then(|v| v.trim().parse().ok())
            })
            .unwrap_or(self.toml.tools.timeout_secs)
    }

    /// Metrics command (env → file).
    pub fn metrics_command(&self) -> Option<String> {
        std::env::var("BROWNFIELD_METRICS_CMD")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .or_else(|| self.toml.metrics.command.clone())
    }

    pub fn tool_runner(&self) -> ToolRunner {
        ToolRunner::new(
            Duration::from_secs(self.tool_timeout_secs()),
            self.toml.tools.retries,
        )
    }

    pub fn gate_set(&self) -> GateSet {
        GateSet::canonical(&self.toml.thresholds).with_custom(self.toml.gates.clone())
    }

    pub fn regression_rules(&self) -> Vec<RegressionRule> {
        default_rules(&self.toml.regression)
    }

    pub fn config_file(&self) -> PathBuf {
        self.brownfield_dir.join(CONFIG_FILE)
    }

    pub fn state_file(&self) -> PathBuf {
        self.brownfield_dir.join("state.json")
    }

    pub fn checkpoint_dir(&self) -> PathBuf {
        self.brownfield_dir.join("checkpoints")
    }

    /// Snapshot read when no metrics command is configured.
    pub fn metrics_file(&self) -> PathBuf {
        self.brownfield_dir.join("metrics.json")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.brownfield_dir.join("logs")
    }

    /// Validate configuration and return warnings.
    pub fn validate(&self) -> Vec<String> {
        self.toml.validate()
    }
}
